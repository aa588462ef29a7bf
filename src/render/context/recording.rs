//! In-memory [`GraphicsContext`] that records every command for tests.

use super::reflect::{self, UniformBlock, VertexInputField};
use super::{
    AttributeSlot, BufferId, BufferTarget, DataType, DrawMode, GraphicsContext, ProgramId,
    UniformSlot, Usage, Viewport,
};
use anyhow::{Result, bail};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBuffer {
    pub target: BufferTarget,
    pub usage: Option<Usage>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding {
    pub buffer: BufferId,
    pub components: u32,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub mode: DrawMode,
    pub first: u32,
    pub count: u32,
    pub indices: Option<BufferId>,
    pub program: Option<ProgramId>,
    pub bindings: BTreeMap<AttributeSlot, Binding>,
    pub uniforms: Vec<f32>,
}

#[derive(Debug)]
struct RecordedProgram {
    inputs: Vec<VertexInputField>,
    uniforms: UniformBlock,
    values: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct RecordingContext {
    pub unavailable: bool,
    pub fail_compilation: bool,
    pub buffers: Vec<Option<RecordedBuffer>>,
    pub draws: Vec<DrawRecord>,
    pub viewports: Vec<Viewport>,
    pub clears: Vec<[f32; 4]>,
    pub writes: Vec<(BufferId, u64, usize)>,
    programs: Vec<Option<RecordedProgram>>,
    current_program: Option<ProgramId>,
    bindings: BTreeMap<AttributeSlot, Binding>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self, id: BufferId) -> Option<&RecordedBuffer> {
        self.buffers.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.iter().flatten().count()
    }

    /// Value of a named uniform at the time of a recorded draw.
    pub fn uniform_at_draw(&self, draw: &DrawRecord, name: &str) -> Option<f32> {
        let program = self.program(draw.program?)?;
        let (_, field) = program.uniforms.field(name)?;
        draw.uniforms.get((field.offset / 4) as usize).copied()
    }

    /// Reads `count` floats from a buffer starting at `first_float`.
    pub fn floats(&self, id: BufferId, first_float: usize, count: usize) -> Vec<f32> {
        let Some(buffer) = self.buffer(id) else {
            return Vec::new();
        };
        buffer
            .data
            .chunks_exact(4)
            .skip(first_float)
            .take(count)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect()
    }

    fn program(&self, id: ProgramId) -> Option<&RecordedProgram> {
        self.programs.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn current_mut(&mut self) -> Option<&mut RecordedProgram> {
        let id = self.current_program?;
        self.programs.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    fn record_draw(&mut self, mode: DrawMode, first: u32, count: u32, indices: Option<BufferId>) {
        let uniforms = self
            .current_program
            .and_then(|id| self.program(id))
            .map(|program| program.values.clone())
            .unwrap_or_default();

        self.draws.push(DrawRecord {
            mode,
            first,
            count,
            indices,
            program: self.current_program,
            bindings: self.bindings.clone(),
            uniforms,
        });
    }

    fn write_uniform(&mut self, slot: UniformSlot, values: &[f32]) {
        let Some(program) = self.current_mut() else {
            panic!("uniform written without a program in use");
        };
        let Some(field) = program.uniforms.fields.get(slot.0 as usize) else {
            panic!("unknown uniform slot {slot:?}");
        };
        let start = (field.offset / 4) as usize;
        program.values[start..start + values.len()].copy_from_slice(values);
    }
}

impl GraphicsContext for RecordingContext {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId> {
        if self.unavailable {
            bail!("context unavailable");
        }
        self.buffers.push(Some(RecordedBuffer {
            target,
            usage: None,
            data: Vec::new(),
        }));
        Ok(BufferId(self.buffers.len() as u32 - 1))
    }

    fn reserve_buffer(&mut self, buffer: BufferId, size: u64, usage: Usage) -> Result<()> {
        let Some(Some(entry)) = self.buffers.get_mut(buffer.0 as usize) else {
            bail!("unknown buffer {buffer:?}");
        };
        entry.usage = Some(usage);
        entry.data = vec![0; size as usize];
        Ok(())
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(Some(entry)) = self.buffers.get_mut(buffer.0 as usize) else {
            panic!("write to unknown buffer {buffer:?}");
        };
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= entry.data.len(),
            "write of {} bytes at {start} past reserved storage of {}",
            data.len(),
            entry.data.len()
        );
        entry.data[start..end].copy_from_slice(data);
        self.writes.push((buffer, offset, data.len()));
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            *slot = None;
        }
    }

    fn bind_attribute(
        &mut self,
        slot: AttributeSlot,
        buffer: BufferId,
        components: u32,
        data_type: DataType,
    ) {
        self.bindings.insert(
            slot,
            Binding {
                buffer,
                components,
                data_type,
            },
        );
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.record_draw(mode, first, count, None);
    }

    fn draw_elements(&mut self, mode: DrawMode, indices: BufferId, first: u32, count: u32) {
        self.record_draw(mode, first, count, Some(indices));
    }

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId> {
        if self.fail_compilation || vertex.trim().is_empty() || fragment.trim().is_empty() {
            bail!("shader compilation failed");
        }
        let inputs = reflect::vertex_inputs(vertex)?;
        let uniforms = reflect::uniform_block(vertex)?.unwrap_or_default();
        let values = vec![0.0; (uniforms.size / 4) as usize];
        self.programs.push(Some(RecordedProgram {
            inputs,
            uniforms,
            values,
        }));
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0 as usize) {
            *slot = None;
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeSlot> {
        self.program(program)?
            .inputs
            .iter()
            .find(|input| input.name == name)
            .map(|input| AttributeSlot(input.location))
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformSlot> {
        let (index, _) = self.program(program)?.uniforms.field(name)?;
        Some(UniformSlot(index as u32))
    }

    fn set_uniform_matrix4(&mut self, slot: UniformSlot, value: &[f32; 16]) {
        self.write_uniform(slot, value);
    }

    fn set_uniform_float(&mut self, slot: UniformSlot, value: f32) {
        self.write_uniform(slot, &[value]);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewports.push(viewport);
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.clears.push(color);
    }
}
