//! Per-refresh orchestration: pull a block, update the history, re-encode
//! every visible frame into its slot and draw one line strip per frame.

use super::buffer_store::{ComponentSize, GpuBufferStore, Stream};
use super::camera::{Camera, Eye};
use super::context::{
    AttributeSlot, DataType, DrawMode, GraphicsContext, ProgramId, UniformSlot, Usage, Viewport,
};
use super::geometry::{self, COLOUR_COMPONENTS, EncodedTrace, POSITION_COMPONENTS, TraceParams};
use super::history::{MAX_BLOCK_SIZE, WaveformHistory};
use crate::audio::controls::FilterControls;
use crate::audio::tap::{AudioSource, Channel};
use anyhow::{Context, Result};
use std::mem;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

pub const TRACE_VERTEX_SHADER: &str = include_str!("shaders/trace.vert.wgsl");
pub const TRACE_FRAGMENT_SHADER: &str = include_str!("shaders/trace.frag.wgsl");

/// Share of the surface height kept free for the control strip.
pub const TOP_MARGIN: f32 = 0.17;
pub const CLEAR_COLOUR: [f32; 4] = [23.0 / 255.0, 24.0 / 255.0, 23.0 / 255.0, 1.0];

const FLOAT_BYTES: usize = mem::size_of::<f32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    Closing,
    Destroyed,
}

#[derive(Debug, Clone, Copy)]
struct TraceProgram {
    program: ProgramId,
    position: AttributeSlot,
    colour: AttributeSlot,
    projection: UniformSlot,
    view: UniformSlot,
    depth_index: UniformSlot,
    depth_count: Option<UniformSlot>,
}

impl TraceProgram {
    fn resolve(ctx: &impl GraphicsContext, program: ProgramId) -> Result<Self> {
        let attribute = |name: &str| {
            ctx.attribute_location(program, name)
                .with_context(|| format!("trace program has no `{name}` attribute"))
        };
        let uniform = |name: &str| {
            ctx.uniform_location(program, name)
                .with_context(|| format!("trace program has no `{name}` uniform"))
        };

        Ok(Self {
            program,
            position: attribute("position")?,
            colour: attribute("colour")?,
            projection: uniform("projection")?,
            view: uniform("view")?,
            depth_index: uniform("depth_index")?,
            depth_count: ctx.uniform_location(program, "depth_count"),
        })
    }
}

pub struct FrameRenderer<S> {
    source: S,
    controls: Arc<FilterControls>,
    history: WaveformHistory,
    store: GpuBufferStore,
    camera: Camera,
    program: Option<TraceProgram>,
    trace: EncodedTrace,
    state: RendererState,
    setup_error: Option<anyhow::Error>,
    viewport: Viewport,
}

impl<S: AudioSource> FrameRenderer<S> {
    pub fn new(source: S, controls: Arc<FilterControls>, capacity: usize, depth: usize) -> Self {
        let viewport = drawable_region(1_280, 720);
        Self {
            source,
            controls,
            history: WaveformHistory::new(capacity, depth),
            store: GpuBufferStore::new(),
            camera: Camera::new(viewport),
            program: None,
            trace: EncodedTrace::with_capacity(MAX_BLOCK_SIZE),
            state: RendererState::Uninitialized,
            setup_error: None,
            viewport,
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn state(&self) -> RendererState {
        self.state
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn setup_error(&self) -> Option<&anyhow::Error> {
        self.setup_error.as_ref()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn history(&self) -> &WaveformHistory {
        &self.history
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_eye(&mut self, eye: Eye) {
        self.camera.set_eye(eye);
    }

    /// Changes how many frames are drawn. Never touches GPU storage.
    pub fn set_depth(&mut self, depth: usize) -> usize {
        self.history.set_depth(depth)
    }

    /// Compiles the trace program and reserves every slot's storage.
    ///
    /// A failure is recorded and logged once; the renderer then stays
    /// uninitialized for the rest of its life.
    pub fn on_context_created(&mut self, ctx: &mut impl GraphicsContext) {
        if self.state != RendererState::Uninitialized || self.setup_error.is_some() {
            return;
        }

        match self.setup(ctx) {
            Ok(program) => {
                self.program = Some(program);
                self.state = RendererState::Ready;
                info!(
                    "[scope] renderer ready: {} slots of {MAX_BLOCK_SIZE} vertices",
                    self.history.capacity()
                );
            }
            Err(err) => {
                error!("[scope] renderer setup failed: {err:#}");
                self.setup_error = Some(err);
            }
        }
    }

    fn setup(&mut self, ctx: &mut impl GraphicsContext) -> Result<TraceProgram> {
        let program = ctx
            .compile_program(TRACE_VERTEX_SHADER, TRACE_FRAGMENT_SHADER)
            .context("failed to compile trace program")?;

        let result = TraceProgram::resolve(&*ctx, program)
            .and_then(|slots| self.allocate_storage(ctx).map(|()| slots));
        if result.is_err() {
            self.store.release(ctx);
            ctx.delete_program(program);
        }
        result
    }

    fn allocate_storage(&mut self, ctx: &mut impl GraphicsContext) -> Result<()> {
        let vertices = self.history.capacity() * MAX_BLOCK_SIZE;
        let max_vertices =
            u32::try_from(vertices).context("history capacity exceeds addressable vertices")?;

        self.store
            .allocate(ctx, max_vertices, false)
            .context("failed to allocate trace buffers")?;

        let position_bytes = (vertices * POSITION_COMPONENTS * FLOAT_BYTES) as u64;
        let colour_bytes = (vertices * COLOUR_COMPONENTS * FLOAT_BYTES) as u64;
        self.store
            .reserve(ctx, Stream::Position, position_bytes, Usage::Dynamic)?;
        self.store
            .reserve(ctx, Stream::Colour, colour_bytes, Usage::Dynamic)?;
        Ok(())
    }

    pub fn on_refresh(&mut self, ctx: &mut impl GraphicsContext) {
        if self.state != RendererState::Ready {
            return;
        }
        let Some(program) = self.program else {
            return;
        };

        let block = self.source.latest_block();
        if block.sample_count() == 0 {
            trace!("[scope] no new samples; redrawing retained history");
        } else {
            self.history.record(block.channel_data(Channel::Left));
        }

        ctx.clear(CLEAR_COLOUR);
        ctx.set_viewport(self.viewport);

        ctx.use_program(program.program);
        ctx.set_uniform_matrix4(program.projection, &self.camera.projection());
        ctx.set_uniform_matrix4(program.view, &self.camera.view());
        if let Some(depth_count) = program.depth_count {
            ctx.set_uniform_float(depth_count, self.history.visible_len() as f32);
        }

        let controls = self.controls.snapshot();
        let params = TraceParams {
            drive: controls.drive,
            resonance: controls.resonance,
        };

        for (slot, frame) in self.history.visible_frames().enumerate() {
            if frame.is_empty() {
                continue;
            }

            geometry::encode(frame, slot, params, &mut self.trace);

            let first_vertex = slot * MAX_BLOCK_SIZE;
            let position_offset = first_vertex * POSITION_COMPONENTS * FLOAT_BYTES;
            let colour_offset = first_vertex * COLOUR_COMPONENTS * FLOAT_BYTES;
            self.store.update(
                ctx,
                Stream::Position,
                position_offset as u64,
                &self.trace.positions,
            );
            self.store
                .update(ctx, Stream::Colour, colour_offset as u64, &self.trace.colours);

            ctx.set_uniform_float(program.depth_index, slot as f32);
            self.store.bind_attribute(
                ctx,
                program.position,
                Stream::Position,
                ComponentSize::Xyz,
                DataType::Float,
            );
            self.store.bind_attribute(
                ctx,
                program.colour,
                Stream::Colour,
                ComponentSize::Rgba,
                DataType::Float,
            );

            self.store.draw(
                ctx,
                DrawMode::LineStrip,
                frame.len() as u32,
                first_vertex as u32,
            );
        }
    }

    /// Frees GPU resources. No draw is issued afterwards.
    pub fn on_context_closing(&mut self, ctx: &mut impl GraphicsContext) {
        match self.state {
            RendererState::Destroyed | RendererState::Closing => return,
            RendererState::Uninitialized => {
                self.state = RendererState::Destroyed;
                return;
            }
            RendererState::Ready => {}
        }

        self.state = RendererState::Closing;
        self.store.release(ctx);
        if let Some(program) = self.program.take() {
            ctx.delete_program(program.program);
        }
        self.state = RendererState::Destroyed;
        debug!("[scope] renderer destroyed");
    }

    /// Recomputes presentation only; storage, capacity and depth are untouched.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        let viewport = drawable_region(width, height);
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.camera.resize(viewport);
        debug!(
            "[scope] viewport {}x{} at y={}",
            viewport.width, viewport.height, viewport.y
        );
    }
}

/// The part of a `width` x `height` surface below the control strip.
pub fn drawable_region(width: u32, height: u32) -> Viewport {
    let margin = (height as f32 * TOP_MARGIN).round() as u32;
    Viewport {
        x: 0,
        y: margin,
        width,
        height: height.saturating_sub(margin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tap::BlockView;
    use crate::render::context::BufferId;
    use crate::render::context::recording::{DrawRecord, RecordingContext};
    use std::collections::VecDeque;

    struct ScriptedSource {
        pending: VecDeque<Vec<f32>>,
        current: Vec<f32>,
    }

    impl ScriptedSource {
        fn new(blocks: impl IntoIterator<Item = Vec<f32>>) -> Self {
            Self {
                pending: blocks.into_iter().collect(),
                current: Vec::new(),
            }
        }
    }

    impl AudioSource for ScriptedSource {
        fn latest_block(&mut self) -> BlockView<'_> {
            self.current = self.pending.pop_front().unwrap_or_default();
            BlockView::new(&self.current, &self.current)
        }
    }

    /// Block `n` holds `len` samples of value `-n / 100`.
    fn block(n: usize, len: usize) -> Vec<f32> {
        vec![-(n as f32) / 100.0; len]
    }

    fn renderer(
        blocks: impl IntoIterator<Item = Vec<f32>>,
        capacity: usize,
        depth: usize,
    ) -> FrameRenderer<ScriptedSource> {
        FrameRenderer::new(
            ScriptedSource::new(blocks),
            Arc::new(FilterControls::default()),
            capacity,
            depth,
        )
    }

    fn ready(
        blocks: impl IntoIterator<Item = Vec<f32>>,
        capacity: usize,
        depth: usize,
    ) -> (FrameRenderer<ScriptedSource>, RecordingContext) {
        let mut ctx = RecordingContext::new();
        let mut renderer = renderer(blocks, capacity, depth);
        renderer.on_context_created(&mut ctx);
        assert_eq!(renderer.state(), RendererState::Ready);
        (renderer, ctx)
    }

    fn last_draws(ctx: &RecordingContext, count: usize) -> &[DrawRecord] {
        &ctx.draws[ctx.draws.len() - count..]
    }

    fn position_buffer(renderer: &FrameRenderer<ScriptedSource>) -> BufferId {
        renderer
            .store
            .buffer_id(Stream::Position)
            .expect("position stream")
    }

    #[test]
    fn setup_reserves_every_slot_as_dynamic_storage() {
        let (renderer, ctx) = ready([], 8, 4);
        let vertices = (8 * MAX_BLOCK_SIZE) as u64;
        assert_eq!(
            renderer.store.reserved_bytes(Stream::Position),
            Some(vertices * 12)
        );
        assert_eq!(
            renderer.store.reserved_bytes(Stream::Colour),
            Some(vertices * 16)
        );
        let buffer = ctx.buffer(position_buffer(&renderer)).expect("buffer");
        assert_eq!(buffer.usage, Some(Usage::Dynamic));
        assert_eq!(ctx.live_programs(), 1);
    }

    #[test]
    fn capacity_four_keeps_the_four_newest_blocks() {
        let blocks = (1..=6).map(|n| block(n, 16));
        let (mut renderer, mut ctx) = ready(blocks, 4, 4);
        for _ in 0..6 {
            renderer.on_refresh(&mut ctx);
        }

        let draws = last_draws(&ctx, 4);
        let firsts: Vec<u32> = draws.iter().map(|draw| draw.first).collect();
        assert_eq!(firsts, vec![0, 2048, 4096, 6144]);
        assert!(draws.iter().all(|draw| draw.mode == DrawMode::LineStrip));
        assert!(draws.iter().all(|draw| draw.count == 16));

        let buffer = position_buffer(&renderer);
        for (slot, expected) in [(0, 6), (1, 5), (2, 4), (3, 3)] {
            let y = ctx.floats(buffer, slot * MAX_BLOCK_SIZE * 3 + 1, 1)[0];
            assert!((y - (expected as f32 / 100.0 - 0.5)).abs() < 1e-6);
        }
    }

    #[test]
    fn depth_beyond_history_draws_only_existing_frames() {
        let blocks = (1..=3).map(|n| block(n, 32));
        let (mut renderer, mut ctx) = ready(blocks, 16, 10);
        for _ in 0..3 {
            ctx.draws.clear();
            renderer.on_refresh(&mut ctx);
        }
        assert_eq!(renderer.history().visible_frames().len(), 3);
        assert_eq!(ctx.draws.len(), 3);
    }

    #[test]
    fn zero_sample_refresh_redraws_the_same_history() {
        let blocks = vec![block(1, 8), block(2, 8), Vec::new()];
        let (mut renderer, mut ctx) = ready(blocks, 4, 4);
        renderer.on_refresh(&mut ctx);
        renderer.on_refresh(&mut ctx);
        let before = last_draws(&ctx, 2).to_vec();
        let data_before = ctx.floats(position_buffer(&renderer), 0, 2 * MAX_BLOCK_SIZE * 3);

        renderer.on_refresh(&mut ctx);

        assert_eq!(renderer.history().len(), 2);
        assert_eq!(last_draws(&ctx, 2), before.as_slice());
        assert_eq!(
            ctx.floats(position_buffer(&renderer), 0, 2 * MAX_BLOCK_SIZE * 3),
            data_before
        );
        assert_eq!(ctx.clears.len(), 3);
    }

    #[test]
    fn resize_changes_only_presentation() {
        let blocks = (1..=3).map(|n| block(n, 64));
        let (mut renderer, mut ctx) = ready(blocks, 8, 5);
        for _ in 0..3 {
            renderer.on_refresh(&mut ctx);
        }
        let writes = ctx.writes.len();
        let buffers = ctx.buffers.clone();
        let projection_before = renderer.camera.projection();

        renderer.on_resize(1280, 720);
        renderer.on_resize(640, 480);

        assert_eq!(
            renderer.viewport(),
            Viewport {
                x: 0,
                y: 82,
                width: 640,
                height: 398
            }
        );
        assert_ne!(renderer.camera.projection(), projection_before);
        assert_eq!(ctx.writes.len(), writes);
        assert_eq!(ctx.buffers, buffers);
        assert_eq!(renderer.history().capacity(), 8);
        assert_eq!(renderer.history().depth(), 5);
    }

    #[test]
    fn refresh_sets_viewport_matrices_and_per_draw_depth() {
        let blocks = (1..=3).map(|n| block(n, 8));
        let (mut renderer, mut ctx) = ready(blocks, 4, 4);
        for _ in 0..3 {
            renderer.on_refresh(&mut ctx);
        }

        assert_eq!(ctx.viewports.last(), Some(&drawable_region(1280, 720)));
        assert_eq!(ctx.clears.last(), Some(&CLEAR_COLOUR));

        let draws = last_draws(&ctx, 3);
        for (slot, draw) in draws.iter().enumerate() {
            assert_eq!(ctx.uniform_at_draw(draw, "depth_index"), Some(slot as f32));
            assert_eq!(ctx.uniform_at_draw(draw, "depth_count"), Some(3.0));
            assert_eq!(draw.bindings.len(), 2);
        }
    }

    #[test]
    fn frames_keep_their_own_lengths() {
        let blocks = vec![block(1, 100), block(2, 300), block(3, 3000)];
        let (mut renderer, mut ctx) = ready(blocks, 4, 4);
        for _ in 0..3 {
            renderer.on_refresh(&mut ctx);
        }
        let counts: Vec<u32> = last_draws(&ctx, 3).iter().map(|draw| draw.count).collect();
        assert_eq!(counts, vec![MAX_BLOCK_SIZE as u32, 300, 100]);
    }

    #[test]
    fn shrinking_depth_draws_fewer_slots_without_reallocating() {
        let blocks = (1..=6).map(|n| block(n, 8));
        let (mut renderer, mut ctx) = ready(blocks, 6, 6);
        for _ in 0..5 {
            renderer.on_refresh(&mut ctx);
        }
        let live = ctx.live_buffers();
        let reserved = renderer.store.reserved_bytes(Stream::Position);

        assert_eq!(renderer.set_depth(2), 2);
        ctx.draws.clear();
        renderer.on_refresh(&mut ctx);

        assert_eq!(ctx.draws.len(), 2);
        assert_eq!(ctx.live_buffers(), live);
        assert_eq!(renderer.store.reserved_bytes(Stream::Position), reserved);
    }

    #[test]
    fn compile_failure_is_terminal_and_suppresses_draws() {
        let mut ctx = RecordingContext::new();
        ctx.fail_compilation = true;
        let mut renderer = renderer([block(1, 8)], 4, 4);

        renderer.on_context_created(&mut ctx);
        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert!(renderer.setup_error().is_some());

        ctx.fail_compilation = false;
        renderer.on_context_created(&mut ctx);
        renderer.on_refresh(&mut ctx);

        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.live_buffers(), 0);
        assert!(ctx.draws.is_empty());
        assert!(ctx.clears.is_empty());
    }

    #[test]
    fn unavailable_context_releases_the_compiled_program() {
        let mut ctx = RecordingContext::new();
        let mut renderer = renderer([], 4, 4);
        ctx.unavailable = true;

        renderer.on_context_created(&mut ctx);

        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.live_buffers(), 0);
    }

    #[test]
    fn closing_releases_everything_and_stops_drawing() {
        let blocks = (1..=3).map(|n| block(n, 8));
        let (mut renderer, mut ctx) = ready(blocks, 4, 4);
        renderer.on_refresh(&mut ctx);

        renderer.on_context_closing(&mut ctx);
        assert_eq!(renderer.state(), RendererState::Destroyed);
        assert_eq!(ctx.live_buffers(), 0);
        assert_eq!(ctx.live_programs(), 0);

        let draws = ctx.draws.len();
        renderer.on_refresh(&mut ctx);
        renderer.on_context_closing(&mut ctx);
        assert_eq!(ctx.draws.len(), draws);
    }

    #[test]
    fn drawable_region_excludes_the_control_strip() {
        assert_eq!(
            drawable_region(1280, 720),
            Viewport {
                x: 0,
                y: 122,
                width: 1280,
                height: 598
            }
        );
        assert_eq!(drawable_region(10, 0).height, 0);
    }
}
