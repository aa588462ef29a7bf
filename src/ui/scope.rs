//! Iced widget hosting the waveform renderer inside a wgpu primitive.

use crate::audio::controls::FilterControls;
use crate::audio::tap::TapReader;
use crate::render::camera::Eye;
use crate::render::context::Viewport;
use crate::render::context::wgpu::{WgpuContext, WgpuResources};
use crate::render::frame_renderer::{CLEAR_COLOUR, FrameRenderer};
use iced::Rectangle;
use iced::advanced::graphics::Viewport as HostViewport;
use iced::advanced::graphics::core::event::Status;
use iced::advanced::renderer::{self, Quad};
use iced::advanced::widget::{Tree, tree};
use iced::advanced::{Clipboard, Layout, Renderer as _, Shell, Widget, layout, mouse};
use iced::{Background, Color, Element, Length, Point, Size};
use iced_wgpu::primitive::{Primitive, Renderer as _, Storage};
use iced_wgpu::wgpu;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::warn;

/// Wheel lines are scaled down before they reach the camera.
const LINE_DOLLY: f32 = 0.05;
const PIXELS_PER_LINE: f32 = 40.0;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Everything the render thread needs to build its renderer on first use.
pub struct ScopeFeed {
    reader: Mutex<Option<TapReader>>,
    controls: Arc<FilterControls>,
    capacity: usize,
    closing: AtomicBool,
    instance_id: u64,
}

impl ScopeFeed {
    pub fn new(reader: TapReader, controls: Arc<FilterControls>, capacity: usize) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            controls,
            capacity,
            closing: AtomicBool::new(false),
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Asks the renderer to release its GPU resources on the next frame.
    pub fn request_close(&self) {
        self.closing.store(true, Ordering::Release);
    }
}

impl fmt::Debug for ScopeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFeed")
            .field("capacity", &self.capacity)
            .field("closing", &self.closing.load(Ordering::Relaxed))
            .field("instance_id", &self.instance_id)
            .finish_non_exhaustive()
    }
}

struct ScopeInstance {
    resources: WgpuResources,
    renderer: FrameRenderer<TapReader>,
}

#[derive(Default)]
struct ScopeStore {
    instances: FxHashMap<u64, ScopeInstance>,
}

#[derive(Debug, Clone)]
pub struct ScopePrimitive {
    feed: Arc<ScopeFeed>,
    depth: usize,
    eye: Eye,
}

impl ScopePrimitive {
    fn key(&self) -> u64 {
        self.feed.instance_id
    }
}

impl Primitive for ScopePrimitive {
    fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        storage: &mut Storage,
        bounds: &Rectangle,
        viewport: &HostViewport,
    ) {
        if !storage.has::<ScopeStore>() {
            storage.store(ScopeStore::default());
        }

        let store = storage
            .get_mut::<ScopeStore>()
            .expect("scope store must exist after storage check");

        if !store.instances.contains_key(&self.key()) {
            let Some(reader) = self.feed.reader.lock().take() else {
                warn!("[scope] audio tap already claimed by another renderer");
                return;
            };
            let renderer = FrameRenderer::new(
                reader,
                Arc::clone(&self.feed.controls),
                self.feed.capacity,
                self.depth,
            );
            store.instances.insert(
                self.key(),
                ScopeInstance {
                    resources: WgpuResources::new(device, format),
                    renderer,
                },
            );
        }

        let Some(ScopeInstance {
            resources,
            renderer,
        }) = store.instances.get_mut(&self.key())
        else {
            return;
        };

        let surface = physical_surface(bounds, viewport.scale_factor() as f32);
        resources.begin_frame(surface);

        let mut ctx = WgpuContext::new(device, queue, resources);
        if self.feed.closing.load(Ordering::Acquire) {
            renderer.on_context_closing(&mut ctx);
        } else {
            renderer.on_context_created(&mut ctx);
            renderer.on_resize(surface.width, surface.height);
            renderer.set_depth(self.depth);
            renderer.set_eye(self.eye);
            renderer.on_refresh(&mut ctx);
        }

        resources.finish_frame(device, queue);
    }

    fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        storage: &Storage,
        target: &wgpu::TextureView,
        clip_bounds: &Rectangle<u32>,
    ) {
        let Some(instance) = storage
            .get::<ScopeStore>()
            .and_then(|store| store.instances.get(&self.key()))
        else {
            return;
        };

        instance.resources.replay(encoder, target, clip_bounds);
    }
}

fn physical_surface(bounds: &Rectangle, scale: f32) -> Viewport {
    let to_px = |value: f32| (value * scale).round().max(0.0) as u32;
    Viewport {
        x: to_px(bounds.x),
        y: to_px(bounds.y),
        width: to_px(bounds.width),
        height: to_px(bounds.height),
    }
}

/// Mouse gestures that move the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraGesture {
    Dolly(f32),
    Pan { dx: f32, dy: f32 },
}

#[derive(Debug, Default)]
struct DragState {
    last: Option<Point>,
}

pub struct Scope<'a, Message> {
    primitive: ScopePrimitive,
    on_camera: Box<dyn Fn(CameraGesture) -> Message + 'a>,
}

impl<'a, Message> Scope<'a, Message> {
    pub fn new(
        feed: Arc<ScopeFeed>,
        depth: usize,
        eye: Eye,
        on_camera: impl Fn(CameraGesture) -> Message + 'a,
    ) -> Self {
        Self {
            primitive: ScopePrimitive { feed, depth, eye },
            on_camera: Box::new(on_camera),
        }
    }
}

impl<Message> Widget<Message, iced::Theme, iced::Renderer> for Scope<'_, Message> {
    fn tag(&self) -> tree::Tag {
        tree::Tag::of::<DragState>()
    }

    fn state(&self) -> tree::State {
        tree::State::new(DragState::default())
    }

    fn size(&self) -> Size<Length> {
        Size::new(Length::Fill, Length::Fill)
    }

    fn layout(
        &self,
        _tree: &mut Tree,
        _renderer: &iced::Renderer,
        limits: &layout::Limits,
    ) -> layout::Node {
        let size = limits.resolve(Length::Fill, Length::Fill, Size::new(0.0, 0.0));
        layout::Node::new(size)
    }

    fn on_event(
        &mut self,
        tree: &mut Tree,
        event: iced::Event,
        layout: Layout<'_>,
        cursor: mouse::Cursor,
        _renderer: &iced::Renderer,
        _clipboard: &mut dyn Clipboard,
        shell: &mut Shell<'_, Message>,
        _viewport: &Rectangle,
    ) -> Status {
        let state = tree.state.downcast_mut::<DragState>();
        let bounds = layout.bounds();

        match event {
            iced::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if !cursor.is_over(bounds) {
                    return Status::Ignored;
                }
                let lines = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y,
                    mouse::ScrollDelta::Pixels { y, .. } => y / PIXELS_PER_LINE,
                };
                shell.publish((self.on_camera)(CameraGesture::Dolly(lines * LINE_DOLLY)));
                Status::Captured
            }
            iced::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                state.last = cursor.position_over(bounds);
                if state.last.is_some() {
                    Status::Captured
                } else {
                    Status::Ignored
                }
            }
            iced::Event::Mouse(mouse::Event::CursorMoved { position }) => {
                let Some(last) = state.last else {
                    return Status::Ignored;
                };
                state.last = Some(position);
                shell.publish((self.on_camera)(CameraGesture::Pan {
                    dx: position.x - last.x,
                    dy: position.y - last.y,
                }));
                Status::Captured
            }
            iced::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left))
            | iced::Event::Mouse(mouse::Event::CursorLeft) => {
                state.last = None;
                Status::Ignored
            }
            _ => Status::Ignored,
        }
    }

    fn draw(
        &self,
        _tree: &Tree,
        renderer: &mut iced::Renderer,
        _theme: &iced::Theme,
        _style: &renderer::Style,
        layout: Layout<'_>,
        _cursor: mouse::Cursor,
        _viewport: &Rectangle,
    ) {
        let bounds = layout.bounds();
        let [r, g, b, a] = CLEAR_COLOUR;

        renderer.fill_quad(
            Quad {
                bounds,
                border: Default::default(),
                shadow: Default::default(),
            },
            Background::Color(Color::from_rgba(r, g, b, a)),
        );

        renderer.draw_primitive(bounds, self.primitive.clone());
    }

    fn mouse_interaction(
        &self,
        tree: &Tree,
        layout: Layout<'_>,
        cursor: mouse::Cursor,
        _viewport: &Rectangle,
        _renderer: &iced::Renderer,
    ) -> mouse::Interaction {
        if tree.state.downcast_ref::<DragState>().last.is_some() {
            mouse::Interaction::Grabbing
        } else if cursor.is_over(layout.bounds()) {
            mouse::Interaction::Grab
        } else {
            mouse::Interaction::default()
        }
    }
}

impl<'a, Message: 'a> From<Scope<'a, Message>> for Element<'a, Message> {
    fn from(scope: Scope<'a, Message>) -> Self {
        Element::new(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_scales_logical_bounds() {
        let bounds = Rectangle {
            x: 10.0,
            y: 20.5,
            width: 640.0,
            height: 480.0,
        };
        assert_eq!(
            physical_surface(&bounds, 1.5),
            Viewport {
                x: 15,
                y: 31,
                width: 960,
                height: 720
            }
        );
    }

    #[test]
    fn feeds_get_distinct_instances_and_hand_out_the_reader_once() {
        let (_, first_reader) = crate::audio::tap::tap();
        let (_, second_reader) = crate::audio::tap::tap();
        let controls = Arc::new(FilterControls::default());

        let first = ScopeFeed::new(first_reader, Arc::clone(&controls), 4);
        let second = ScopeFeed::new(second_reader, controls, 4);
        assert_ne!(first.instance_id, second.instance_id);

        assert!(first.reader.lock().take().is_some());
        assert!(first.reader.lock().take().is_none());
    }

    #[test]
    fn close_requests_are_visible_to_the_render_side() {
        let (_, reader) = crate::audio::tap::tap();
        let feed = ScopeFeed::new(reader, Arc::new(FilterControls::default()), 4);
        assert!(!feed.closing.load(Ordering::Acquire));
        feed.request_close();
        assert!(feed.closing.load(Ordering::Acquire));
    }
}
