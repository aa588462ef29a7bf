//! [`GraphicsContext`] implemented on wgpu for use inside an iced primitive.
//!
//! Commands are recorded while the primitive prepares and replayed into the
//! host's render pass afterwards. Uniform writes land in a per-program shadow
//! copy which is snapshotted into one dynamic-offset uniform buffer at every
//! draw, so each draw sees the values that were current when it was issued.

use super::reflect::{self, UniformBlock, VertexInputField};
use super::{
    AttributeSlot, BufferId, BufferTarget, DataType, DrawMode, GraphicsContext, ProgramId,
    UniformSlot, Usage, Viewport,
};
use anyhow::{Result, bail};
use iced::Rectangle;
use iced_wgpu::wgpu;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::mem;
use std::num::NonZeroU64;
use std::ops::Range;
use tracing::{debug, error, warn};

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";
/// Largest `Uniforms` struct a program may declare.
const MAX_UNIFORM_BLOCK: u64 = 256;
const INITIAL_UNIFORM_BYTES: u64 = 64 * MAX_UNIFORM_BLOCK;

struct GpuBuffer {
    target: BufferTarget,
    storage: Option<wgpu::Buffer>,
}

struct Program {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    inputs: Vec<VertexInputField>,
    uniforms: UniformBlock,
    shadow: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    buffer: BufferId,
    format: wgpu::VertexFormat,
    stride: wgpu::BufferAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    topology: wgpu::PrimitiveTopology,
    attributes: Vec<(u32, wgpu::VertexFormat, wgpu::BufferAddress)>,
}

#[derive(Debug)]
struct DrawCommand {
    pipeline: usize,
    viewport: Viewport,
    vertex_buffers: Range<usize>,
    indices: Option<BufferId>,
    vertices: Range<u32>,
    uniform_offset: u32,
}

#[derive(Debug)]
enum Command {
    Clear(wgpu::Color),
    Draw(DrawCommand),
}

/// Long-lived GPU state backing a [`WgpuContext`].
pub struct WgpuResources {
    format: wgpu::TextureFormat,
    uniform_stride: u64,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    clear_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,
    bind_group: wgpu::BindGroup,
    buffers: Vec<Option<GpuBuffer>>,
    programs: Vec<Option<Program>>,
    pipelines: Vec<Option<wgpu::RenderPipeline>>,
    pipeline_lookup: FxHashMap<PipelineKey, Option<usize>>,
    lookup_key: PipelineKey,
    current_program: Option<ProgramId>,
    bindings: BTreeMap<AttributeSlot, Binding>,
    viewport: Viewport,
    surface: Viewport,
    uniform_staging: Vec<u8>,
    bound_buffers: Vec<BufferId>,
    resolved: Vec<(u32, Binding)>,
    commands: Vec<Command>,
    line_loop_reported: bool,
}

impl WgpuResources {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let uniform_stride =
            uniform_stride(u64::from(device.limits().min_uniform_buffer_offset_alignment));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scope uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(MAX_UNIFORM_BLOCK),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scope pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let uniform_buffer = create_uniform_buffer(device, INITIAL_UNIFORM_BYTES);
        let bind_group = create_bind_group(device, &bind_group_layout, &uniform_buffer);

        Self {
            format,
            uniform_stride,
            clear_pipeline: create_clear_pipeline(device, format),
            bind_group_layout,
            pipeline_layout,
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_BYTES,
            bind_group,
            buffers: Vec::new(),
            programs: Vec::new(),
            pipelines: Vec::new(),
            pipeline_lookup: FxHashMap::default(),
            lookup_key: PipelineKey {
                program: ProgramId(0),
                topology: wgpu::PrimitiveTopology::PointList,
                attributes: Vec::new(),
            },
            current_program: None,
            bindings: BTreeMap::new(),
            viewport: Viewport::default(),
            surface: Viewport::default(),
            uniform_staging: Vec::new(),
            bound_buffers: Vec::new(),
            resolved: Vec::new(),
            commands: Vec::new(),
            line_loop_reported: false,
        }
    }

    /// Starts recording a frame for a widget occupying `surface` (physical
    /// pixels within the render target).
    pub fn begin_frame(&mut self, surface: Viewport) {
        self.surface = surface;
        self.commands.clear();
        self.bound_buffers.clear();
        self.uniform_staging.clear();
    }

    /// Uploads the uniform snapshots recorded since [`Self::begin_frame`].
    pub fn finish_frame(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.uniform_staging.is_empty() {
            return;
        }

        let required = self.uniform_staging.len() as u64;
        if required > self.uniform_capacity {
            let capacity = required.next_power_of_two();
            self.uniform_buffer = create_uniform_buffer(device, capacity);
            self.bind_group =
                create_bind_group(device, &self.bind_group_layout, &self.uniform_buffer);
            self.uniform_capacity = capacity;
            debug!("[gpu] uniform buffer grown to {capacity} bytes");
        }

        queue.write_buffer(&self.uniform_buffer, 0, &self.uniform_staging);
    }

    /// Replays the recorded frame into `target` without clearing it.
    pub fn replay(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        clip_bounds: &Rectangle<u32>,
    ) {
        if self.commands.is_empty() {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scope pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_scissor_rect(
            clip_bounds.x,
            clip_bounds.y,
            clip_bounds.width.max(1),
            clip_bounds.height.max(1),
        );

        for command in &self.commands {
            match command {
                Command::Clear(colour) => {
                    if !self.apply_viewport(&mut pass, clear_region(self.surface)) {
                        continue;
                    }
                    pass.set_pipeline(&self.clear_pipeline);
                    pass.set_blend_constant(*colour);
                    pass.draw(0..3, 0..1);
                }
                Command::Draw(draw) => self.replay_draw(&mut pass, draw),
            }
        }
    }

    fn replay_draw<'p>(&'p self, pass: &mut wgpu::RenderPass<'p>, draw: &DrawCommand) {
        let Some(Some(pipeline)) = self.pipelines.get(draw.pipeline) else {
            return;
        };
        if !self.apply_viewport(pass, draw.viewport) {
            return;
        }

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.bind_group, &[draw.uniform_offset]);

        for (slot, id) in self.bound_buffers[draw.vertex_buffers.clone()]
            .iter()
            .enumerate()
        {
            let Some(buffer) = self.storage(*id) else {
                return;
            };
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }

        match draw.indices {
            Some(id) => {
                let Some(indices) = self.storage(id) else {
                    return;
                };
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(draw.vertices.clone(), 0, 0..1);
            }
            None => pass.draw(draw.vertices.clone(), 0..1),
        }
    }

    fn apply_viewport(&self, pass: &mut wgpu::RenderPass<'_>, viewport: Viewport) -> bool {
        let Some([x, y, width, height]) = target_rect(self.surface, viewport) else {
            return false;
        };
        pass.set_viewport(x, y, width, height, 0.0, 1.0);
        true
    }

    fn storage(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .and_then(|buffer| buffer.storage.as_ref())
    }

    fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn pipeline_for(
        &mut self,
        device: &wgpu::Device,
        program_id: ProgramId,
        topology: wgpu::PrimitiveTopology,
        bindings: &[(u32, Binding)],
    ) -> Option<usize> {
        let key = &mut self.lookup_key;
        key.program = program_id;
        key.topology = topology;
        key.attributes.clear();
        key.attributes.extend(
            bindings
                .iter()
                .map(|(location, binding)| (*location, binding.format, binding.stride)),
        );

        if let Some(cached) = self.pipeline_lookup.get(&self.lookup_key) {
            return *cached;
        }

        let program = self.program(program_id)?;
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = self
            .lookup_key
            .attributes
            .iter()
            .map(|&(location, format, _)| {
                [wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: location,
                    format,
                }]
            })
            .collect();
        let layouts: Vec<wgpu::VertexBufferLayout<'_>> = self
            .lookup_key
            .attributes
            .iter()
            .zip(&attributes)
            .map(|(&(_, _, stride), attribute)| wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let strip_index_format = matches!(
            topology,
            wgpu::PrimitiveTopology::LineStrip | wgpu::PrimitiveTopology::TriangleStrip
        )
        .then_some(wgpu::IndexFormat::Uint32);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scope trace pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: VERTEX_ENTRY,
                buffers: &layouts,
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: FRAGMENT_ENTRY,
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let slot = match pollster::block_on(device.pop_error_scope()) {
            Some(err) => {
                error!("[gpu] pipeline creation failed for {topology:?}: {err}");
                None
            }
            None => {
                self.pipelines.push(Some(pipeline));
                Some(self.pipelines.len() - 1)
            }
        };
        self.pipeline_lookup.insert(self.lookup_key.clone(), slot);
        slot
    }

    fn record_draw(
        &mut self,
        device: &wgpu::Device,
        mode: DrawMode,
        vertices: Range<u32>,
        indices: Option<BufferId>,
    ) {
        let Some(program_id) = self.current_program else {
            warn!("[gpu] draw issued without a program in use");
            return;
        };
        let Some(Some(program)) = self.programs.get(program_id.0 as usize) else {
            return;
        };

        self.resolved.clear();
        for input in &program.inputs {
            let Some(binding) = self.bindings.get(&AttributeSlot(input.location)) else {
                warn!("[gpu] attribute `{}` has no buffer bound", input.name);
                return;
            };
            self.resolved.push((input.location, *binding));
        }

        let uniform_offset = push_uniform_snapshot(
            &mut self.uniform_staging,
            &program.shadow,
            self.uniform_stride as usize,
        );

        let topology = self.topology(mode);
        let resolved = mem::take(&mut self.resolved);
        let pipeline = self.pipeline_for(device, program_id, topology, &resolved);
        let start = self.bound_buffers.len();
        if pipeline.is_some() {
            self.bound_buffers
                .extend(resolved.iter().map(|(_, binding)| binding.buffer));
        }
        self.resolved = resolved;

        let Some(pipeline) = pipeline else {
            self.uniform_staging.truncate(uniform_offset);
            return;
        };

        self.commands.push(Command::Draw(DrawCommand {
            pipeline,
            viewport: self.viewport,
            vertex_buffers: start..self.bound_buffers.len(),
            indices,
            vertices,
            uniform_offset: uniform_offset as u32,
        }));
    }

    fn topology(&mut self, mode: DrawMode) -> wgpu::PrimitiveTopology {
        if mode == DrawMode::LineLoop && !self.line_loop_reported {
            self.line_loop_reported = true;
            warn!("[gpu] line loops are drawn as open strips");
        }
        primitive_topology(mode)
    }

    fn write_uniform(&mut self, slot: UniformSlot, bytes: &[u8]) {
        let Some(program) = self
            .current_program
            .and_then(|id| self.programs.get_mut(id.0 as usize))
            .and_then(Option::as_mut)
        else {
            warn!("[gpu] uniform written without a program in use");
            return;
        };
        let Some(field) = program.uniforms.fields.get(slot.0 as usize) else {
            warn!("[gpu] unknown uniform slot {slot:?}");
            return;
        };

        let start = field.offset as usize;
        let len = bytes.len().min(field.size as usize);
        program.shadow[start..start + len].copy_from_slice(&bytes[..len]);
    }
}

/// Borrowed view of [`WgpuResources`] for the duration of one prepare call.
pub struct WgpuContext<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    resources: &'a mut WgpuResources,
}

impl<'a> WgpuContext<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        resources: &'a mut WgpuResources,
    ) -> Self {
        Self {
            device,
            queue,
            resources,
        }
    }
}

impl GraphicsContext for WgpuContext<'_> {
    // Device loss is reported by the host renderer, not per context.
    fn is_available(&self) -> bool {
        true
    }

    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId> {
        let buffers = &mut self.resources.buffers;
        buffers.push(Some(GpuBuffer {
            target,
            storage: None,
        }));
        Ok(BufferId(buffers.len() as u32 - 1))
    }

    fn reserve_buffer(&mut self, buffer: BufferId, size: u64, usage: Usage) -> Result<()> {
        let Some(Some(entry)) = self.resources.buffers.get_mut(buffer.0 as usize) else {
            bail!("unknown buffer {buffer:?}");
        };

        let kind = match entry.target {
            BufferTarget::Vertex => wgpu::BufferUsages::VERTEX,
            BufferTarget::Index => wgpu::BufferUsages::INDEX,
        };
        let size = size.max(wgpu::COPY_BUFFER_ALIGNMENT);
        let size = size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let storage = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(match usage {
                Usage::Static => "Scope static buffer",
                Usage::Dynamic => "Scope dynamic buffer",
            }),
            size,
            usage: kind | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            bail!("failed to reserve {size} bytes for {buffer:?}: {err}");
        }

        entry.storage = Some(storage);
        Ok(())
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(storage) = self.resources.storage(buffer) else {
            warn!("[gpu] write to unreserved buffer {buffer:?}");
            return;
        };
        if data.is_empty() {
            return;
        }
        debug_assert!(
            offset + data.len() as u64 <= storage.size(),
            "write past reserved storage of {buffer:?}"
        );
        self.queue.write_buffer(storage, offset, data);
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.resources.buffers.get_mut(buffer.0 as usize)
            && let Some(entry) = slot.take()
            && let Some(storage) = entry.storage
        {
            storage.destroy();
        }
    }

    fn bind_attribute(
        &mut self,
        slot: AttributeSlot,
        buffer: BufferId,
        components: u32,
        data_type: DataType,
    ) {
        let Some(format) = vertex_format(components, data_type) else {
            warn!("[gpu] unsupported attribute layout {components}x{data_type:?}");
            return;
        };
        self.resources.bindings.insert(
            slot,
            Binding {
                buffer,
                format,
                stride: u64::from(components * data_type.size_bytes()),
            },
        );
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.resources
            .record_draw(self.device, mode, first..first + count, None);
    }

    fn draw_elements(&mut self, mode: DrawMode, indices: BufferId, first: u32, count: u32) {
        self.resources
            .record_draw(self.device, mode, first..first + count, Some(indices));
    }

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId> {
        if !vertex.contains(VERTEX_ENTRY) {
            bail!("vertex source has no `{VERTEX_ENTRY}` entry point");
        }
        if !fragment.contains(FRAGMENT_ENTRY) {
            bail!("fragment source has no `{FRAGMENT_ENTRY}` entry point");
        }

        let inputs = reflect::vertex_inputs(vertex)?;
        let uniforms = reflect::uniform_block(vertex)?.unwrap_or_default();
        if u64::from(uniforms.size) > MAX_UNIFORM_BLOCK {
            bail!(
                "uniform block of {} bytes exceeds the {MAX_UNIFORM_BLOCK} byte limit",
                uniforms.size
            );
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Scope vertex shader"),
                source: wgpu::ShaderSource::Wgsl(vertex.into()),
            });
        let fragment = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Scope fragment shader"),
                source: wgpu::ShaderSource::Wgsl(fragment.into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            bail!("shader compilation failed: {err}");
        }

        let shadow = vec![0; uniforms.size as usize];
        let programs = &mut self.resources.programs;
        programs.push(Some(Program {
            vertex,
            fragment,
            inputs,
            uniforms,
            shadow,
        }));
        Ok(ProgramId(programs.len() as u32 - 1))
    }

    fn delete_program(&mut self, program: ProgramId) {
        let resources = &mut *self.resources;
        if let Some(slot) = resources.programs.get_mut(program.0 as usize) {
            *slot = None;
        }
        if resources.current_program == Some(program) {
            resources.current_program = None;
        }

        evict_program_pipelines(
            &mut resources.pipeline_lookup,
            &mut resources.pipelines,
            program,
        );
    }

    fn use_program(&mut self, program: ProgramId) {
        self.resources.current_program = Some(program);
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeSlot> {
        self.resources
            .program(program)?
            .inputs
            .iter()
            .find(|input| input.name == name)
            .map(|input| AttributeSlot(input.location))
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformSlot> {
        let (index, _) = self.resources.program(program)?.uniforms.field(name)?;
        Some(UniformSlot(index as u32))
    }

    fn set_uniform_matrix4(&mut self, slot: UniformSlot, value: &[f32; 16]) {
        self.resources
            .write_uniform(slot, bytemuck::cast_slice(value.as_slice()));
    }

    fn set_uniform_float(&mut self, slot: UniformSlot, value: f32) {
        self.resources.write_uniform(slot, bytemuck::bytes_of(&value));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.resources.viewport = viewport;
    }

    fn clear(&mut self, color: [f32; 4]) {
        let color = if self.resources.format.is_srgb() {
            iced::Color::from(color).into_linear()
        } else {
            color
        };
        let [r, g, b, a] = color.map(f64::from);
        self.resources
            .commands
            .push(Command::Clear(wgpu::Color { r, g, b, a }));
    }
}

fn uniform_stride(alignment: u64) -> u64 {
    MAX_UNIFORM_BLOCK.next_multiple_of(alignment.max(1))
}

/// Appends one `stride`-sized, zero-padded copy of `shadow` and returns where
/// it starts.
fn push_uniform_snapshot(staging: &mut Vec<u8>, shadow: &[u8], stride: usize) -> usize {
    debug_assert!(shadow.len() <= stride, "uniform block larger than its stride");
    let offset = staging.len();
    staging.extend_from_slice(shadow);
    staging.resize(offset + stride, 0);
    offset
}

/// Forgets every cached pipeline built for `program`.
fn evict_program_pipelines<T>(
    lookup: &mut FxHashMap<PipelineKey, Option<usize>>,
    pipelines: &mut [Option<T>],
    program: ProgramId,
) {
    lookup.retain(|key, index| {
        if key.program != program {
            return true;
        }
        if let Some(slot) = index.and_then(|index| pipelines.get_mut(index)) {
            *slot = None;
        }
        false
    });
}

/// The whole widget surface, whatever viewport is current.
fn clear_region(surface: Viewport) -> Viewport {
    Viewport {
        x: 0,
        y: 0,
        width: surface.width,
        height: surface.height,
    }
}

/// Places a surface-relative viewport in render target coordinates.
fn target_rect(surface: Viewport, viewport: Viewport) -> Option<[f32; 4]> {
    if viewport.width == 0 || viewport.height == 0 {
        return None;
    }
    Some([
        (surface.x + viewport.x) as f32,
        (surface.y + viewport.y) as f32,
        viewport.width as f32,
        viewport.height as f32,
    ])
}

fn primitive_topology(mode: DrawMode) -> wgpu::PrimitiveTopology {
    match mode {
        DrawMode::Points => wgpu::PrimitiveTopology::PointList,
        DrawMode::Lines => wgpu::PrimitiveTopology::LineList,
        DrawMode::LineStrip | DrawMode::LineLoop => wgpu::PrimitiveTopology::LineStrip,
        DrawMode::Triangles => wgpu::PrimitiveTopology::TriangleList,
    }
}

fn vertex_format(components: u32, data_type: DataType) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;

    let format = match (data_type, components) {
        (DataType::Float, 1) => F::Float32,
        (DataType::Float, 2) => F::Float32x2,
        (DataType::Float, 3) => F::Float32x3,
        (DataType::Float, 4) => F::Float32x4,
        (DataType::Int, 1) => F::Sint32,
        (DataType::Int, 2) => F::Sint32x2,
        (DataType::Int, 3) => F::Sint32x3,
        (DataType::Int, 4) => F::Sint32x4,
        (DataType::UnsignedInt, 1) => F::Uint32,
        (DataType::UnsignedInt, 2) => F::Uint32x2,
        (DataType::UnsignedInt, 3) => F::Uint32x3,
        (DataType::UnsignedInt, 4) => F::Uint32x4,
        _ => return None,
    };
    Some(format)
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scope uniform buffer"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Scope uniform bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(MAX_UNIFORM_BLOCK),
            }),
        }],
    })
}

fn create_clear_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Scope clear shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/clear.wgsl").into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Scope clear layout"),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });

    // Output = blend constant * 1 + destination * 0.
    let replace_with_constant = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Constant,
        dst_factor: wgpu::BlendFactor::Zero,
        operation: wgpu::BlendOperation::Add,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Scope clear pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: VERTEX_ENTRY,
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: FRAGMENT_ENTRY,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState {
                    color: replace_with_constant,
                    alpha: replace_with_constant,
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}
