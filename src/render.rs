//! Depth-stacked waveform rendering.
//!
//! [`frame_renderer::FrameRenderer`] owns the frame history and the GPU
//! storage, and talks to the GPU only through [`context::GraphicsContext`].

pub mod buffer_store;
pub mod camera;
pub mod context;
pub mod frame_renderer;
pub mod geometry;
pub mod history;
