//! Fixed set of GPU buffer objects, one per vertex attribute stream.
//!
//! The store knows nothing about waveforms. Storage is declared once with
//! [`GpuBufferStore::reserve`] and then patched in place every frame with
//! [`GpuBufferStore::update`]; nothing here reallocates after setup.

use super::context::{
    AttributeSlot, BufferId, BufferTarget, DataType, DrawMode, GraphicsContext, Usage,
};
use anyhow::{Context, Result, bail};
use bytemuck::Pod;
use tracing::debug;

pub const STREAM_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Position,
    Colour,
    TexCoord,
    Normal,
}

impl Stream {
    pub const ALL: [Stream; STREAM_COUNT] = [
        Stream::Position,
        Stream::Colour,
        Stream::TexCoord,
        Stream::Normal,
    ];

    const fn index(self) -> usize {
        match self {
            Stream::Position => 0,
            Stream::Colour => 1,
            Stream::TexCoord => 2,
            Stream::Normal => 3,
        }
    }
}

/// Number of components a vertex carries in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum ComponentSize {
    Xy,
    Xyz,
    Rgb,
    Rgba,
    Uv,
}

impl ComponentSize {
    pub const fn components(self) -> u32 {
        match self {
            ComponentSize::Xy | ComponentSize::Uv => 2,
            ComponentSize::Xyz | ComponentSize::Rgb => 3,
            ComponentSize::Rgba => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Storage {
    buffer: BufferId,
    reserved: Option<u64>,
}

impl Storage {
    fn new(buffer: BufferId) -> Self {
        Self {
            buffer,
            reserved: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Allocated,
    Released,
}

#[derive(Debug)]
pub struct GpuBufferStore {
    state: State,
    streams: [Option<Storage>; STREAM_COUNT],
    indices: Option<Storage>,
    max_vertices: u32,
}

impl Default for GpuBufferStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBufferStore {
    pub const fn new() -> Self {
        Self {
            state: State::Empty,
            streams: [None; STREAM_COUNT],
            indices: None,
            max_vertices: 0,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.state == State::Allocated
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn max_vertices(&self) -> u32 {
        self.max_vertices
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn reserved_bytes(&self, stream: Stream) -> Option<u64> {
        self.streams[stream.index()].and_then(|storage| storage.reserved)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn buffer_id(&self, stream: Stream) -> Option<BufferId> {
        self.streams[stream.index()].map(|storage| storage.buffer)
    }

    /// Creates one buffer object per stream and, optionally, an index buffer.
    pub fn allocate(
        &mut self,
        ctx: &mut impl GraphicsContext,
        max_vertices: u32,
        has_index_buffer: bool,
    ) -> Result<()> {
        assert!(
            self.state == State::Empty,
            "buffer store may only be allocated once"
        );

        if !ctx.is_available() {
            bail!("graphics context unavailable");
        }

        let mut created = Vec::with_capacity(STREAM_COUNT + 1);
        let result = (|| -> Result<()> {
            for stream in Stream::ALL {
                let buffer = ctx
                    .create_buffer(BufferTarget::Vertex)
                    .with_context(|| format!("failed to create {stream:?} buffer"))?;
                created.push(buffer);
                self.streams[stream.index()] = Some(Storage::new(buffer));
            }

            if has_index_buffer {
                let buffer = ctx
                    .create_buffer(BufferTarget::Index)
                    .context("failed to create index buffer")?;
                created.push(buffer);
                self.indices = Some(Storage::new(buffer));
            }
            Ok(())
        })();

        if let Err(err) = result {
            for buffer in created {
                ctx.delete_buffer(buffer);
            }
            self.streams = [None; STREAM_COUNT];
            self.indices = None;
            return Err(err);
        }

        self.max_vertices = max_vertices;
        self.state = State::Allocated;
        debug!("[gpu] allocated buffer store for {max_vertices} vertices (index buffer: {has_index_buffer})");
        Ok(())
    }

    /// Declares a stream's backing storage and its update frequency.
    pub fn reserve(
        &mut self,
        ctx: &mut impl GraphicsContext,
        stream: Stream,
        byte_size: u64,
        usage: Usage,
    ) -> Result<()> {
        let storage = self.live_stream_mut(stream);
        ctx.reserve_buffer(storage.buffer, byte_size, usage)
            .with_context(|| format!("failed to reserve {byte_size} bytes for {stream:?}"))?;
        storage.reserved = Some(byte_size);
        Ok(())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn reserve_indices(
        &mut self,
        ctx: &mut impl GraphicsContext,
        byte_size: u64,
        usage: Usage,
    ) -> Result<()> {
        assert!(self.is_allocated(), "index buffer reserved outside allocation");
        let Some(storage) = self.indices.as_mut() else {
            bail!("buffer store was allocated without an index buffer");
        };
        ctx.reserve_buffer(storage.buffer, byte_size, usage)
            .context("failed to reserve index buffer")?;
        storage.reserved = Some(byte_size);
        Ok(())
    }

    /// Writes `data` into a reserved stream at `offset` bytes.
    ///
    /// Staying inside the reserved size is the caller's obligation.
    pub fn update<T: Pod>(
        &mut self,
        ctx: &mut impl GraphicsContext,
        stream: Stream,
        offset: u64,
        data: &[T],
    ) {
        let storage = self.live_stream_mut(stream);
        let bytes: &[u8] = bytemuck::cast_slice(data);
        debug_assert!(
            storage
                .reserved
                .is_some_and(|size| offset + bytes.len() as u64 <= size),
            "{stream:?} update of {} bytes at {offset} exceeds reserved storage {:?}",
            bytes.len(),
            storage.reserved
        );
        ctx.write_buffer(storage.buffer, offset, bytes);
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn update_indices(&mut self, ctx: &mut impl GraphicsContext, offset: u64, data: &[u32]) {
        assert!(self.is_allocated(), "index update outside allocation");
        let Some(storage) = self.indices else {
            panic!("buffer store was allocated without an index buffer");
        };
        let bytes: &[u8] = bytemuck::cast_slice(data);
        debug_assert!(
            storage
                .reserved
                .is_some_and(|size| offset + bytes.len() as u64 <= size),
            "index update of {} bytes at {offset} exceeds reserved storage",
            bytes.len()
        );
        ctx.write_buffer(storage.buffer, offset, bytes);
    }

    /// Points a shader input at a stream for subsequent draws.
    pub fn bind_attribute(
        &self,
        ctx: &mut impl GraphicsContext,
        slot: AttributeSlot,
        stream: Stream,
        size: ComponentSize,
        data_type: DataType,
    ) {
        let storage = self.live_stream(stream);
        ctx.bind_attribute(slot, storage.buffer, size.components(), data_type);
    }

    /// Issues one draw over the bound attributes. A zero `vertex_count`
    /// draws every allocated vertex.
    pub fn draw(
        &self,
        ctx: &mut impl GraphicsContext,
        mode: DrawMode,
        vertex_count: u32,
        first_vertex: u32,
    ) {
        assert!(self.is_allocated(), "draw issued on a released buffer store");
        let count = if vertex_count > 0 {
            vertex_count
        } else {
            self.max_vertices
        };

        match self.indices {
            Some(Storage {
                buffer,
                reserved: Some(_),
            }) => ctx.draw_elements(mode, buffer, first_vertex, count),
            _ => ctx.draw_arrays(mode, first_vertex, count),
        }
    }

    /// Frees every buffer. Safe to call more than once.
    pub fn release(&mut self, ctx: &mut impl GraphicsContext) {
        if self.state != State::Allocated {
            self.state = State::Released;
            return;
        }

        for storage in self.streams.iter_mut().filter_map(Option::take) {
            ctx.delete_buffer(storage.buffer);
        }
        if let Some(storage) = self.indices.take() {
            ctx.delete_buffer(storage.buffer);
        }

        self.state = State::Released;
        debug!("[gpu] released buffer store");
    }

    fn live_stream(&self, stream: Stream) -> Storage {
        assert!(
            self.is_allocated(),
            "{stream:?} accessed while the buffer store is not allocated"
        );
        self.streams[stream.index()].expect("allocated store owns every stream")
    }

    fn live_stream_mut(&mut self, stream: Stream) -> &mut Storage {
        assert!(
            self.is_allocated(),
            "{stream:?} accessed while the buffer store is not allocated"
        );
        self.streams[stream.index()]
            .as_mut()
            .expect("allocated store owns every stream")
    }
}
