//! Backend-neutral graphics context used by the buffer store and the renderer.
//!
//! The context is always passed explicitly; nothing in the render path reaches
//! for a process-wide handle. Draw modes, usage hints and data types are
//! expressed with the enums below and only translated to backend codes inside
//! a concrete implementation.

#[cfg(test)]
pub mod recording;
pub mod reflect;
pub mod wgpu;

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeSlot(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformSlot(pub u32);

/// What a buffer object holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Tells the driver whether a buffer is rewritten every frame or filled once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum Usage {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum DataType {
    Float,
    Int,
    UnsignedInt,
}

impl DataType {
    pub const fn size_bytes(self) -> u32 {
        4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
}

/// Drawable region in physical pixels, origin at the top-left of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn aspect_ratio(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// The graphics API surface the waveform renderer depends on.
///
/// Shaped after a classic buffer-object API: buffers are created empty,
/// given storage with [`GraphicsContext::reserve_buffer`] and then patched with
/// [`GraphicsContext::write_buffer`]. Program compilation and name lookup are
/// part of the same handle.
pub trait GraphicsContext {
    /// Whether the underlying device can currently accept commands.
    fn is_available(&self) -> bool;

    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId>;

    /// Declares the buffer's storage, discarding previous contents.
    fn reserve_buffer(&mut self, buffer: BufferId, size: u64, usage: Usage) -> Result<()>;

    /// Writes `data` at `offset` without reallocating.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);

    fn delete_buffer(&mut self, buffer: BufferId);

    fn bind_attribute(
        &mut self,
        slot: AttributeSlot,
        buffer: BufferId,
        components: u32,
        data_type: DataType,
    );

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32);

    fn draw_elements(&mut self, mode: DrawMode, indices: BufferId, first: u32, count: u32);

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId>;

    fn delete_program(&mut self, program: ProgramId);

    fn use_program(&mut self, program: ProgramId);

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeSlot>;

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformSlot>;

    fn set_uniform_matrix4(&mut self, slot: UniformSlot, value: &[f32; 16]);

    fn set_uniform_float(&mut self, slot: UniformSlot, value: f32);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Fills the whole drawing surface with `color`, ignoring the current
    /// viewport.
    fn clear(&mut self, color: [f32; 4]);
}
