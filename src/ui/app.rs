//! Main application logic.

use crate::audio::controls::{ControlSnapshot, FilterControls};
use crate::audio::tap::TapReader;
use crate::render::camera::Eye;
use crate::render::frame_renderer::TOP_MARGIN;
use crate::ui::scope::{CameraGesture, Scope, ScopeFeed};
use crate::ui::settings::SettingsHandle;
use crate::ui::theme;

use iced::keyboard::{self, Key, key::Named};
use iced::widget::{column, container, responsive, row, stack, text};
use iced::{Element, Length, Result, Size, Subscription, Task, application, exit, window};
use std::sync::Arc;
use tracing::{debug, info};

const STRIP_PADDING: f32 = 12.0;
const DEPTH_PAGE: usize = 10;
const DRIVE_STEP: f32 = 5.0;
const RESONANCE_STEP: f32 = 0.05;
const CUTOFF_RATIO: f32 = 1.25;
const VOLUME_STEP: f32 = 0.05;

pub struct UiConfig {
    settings: SettingsHandle,
    controls: Arc<FilterControls>,
    reader: TapReader,
}

impl UiConfig {
    pub fn new(settings: SettingsHandle, controls: Arc<FilterControls>, reader: TapReader) -> Self {
        Self {
            settings,
            controls,
            reader,
        }
    }
}

pub fn run(config: UiConfig) -> Result {
    application("Ladderscope", update, view)
        .subscription(UiApp::subscription)
        .theme(|_| theme::theme())
        .window_size(Size::new(1_280.0, 720.0))
        .exit_on_close_request(false)
        .run_with(move || UiApp::new(config))
}

#[derive(Debug)]
struct UiApp {
    settings: SettingsHandle,
    controls: Arc<FilterControls>,
    feed: Arc<ScopeFeed>,
    depth: usize,
    eye: Eye,
    closing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Adjust {
    Drive(f32),
    Resonance(f32),
    Cutoff(f32),
    Volume(f32),
    NextMode,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    Camera(CameraGesture),
    ResetCamera,
    DepthBy(isize),
    Adjust(Adjust),
    CloseRequested,
}

impl UiApp {
    fn new(config: UiConfig) -> (Self, Task<Message>) {
        let UiConfig {
            settings,
            controls,
            reader,
        } = config;

        let (capacity, depth) = {
            let manager = settings.borrow();
            let data = manager.settings();
            (data.history_capacity, data.history_depth)
        };
        info!("[ui] history holds {capacity} frames, drawing {depth}");

        let feed = Arc::new(ScopeFeed::new(reader, Arc::clone(&controls), capacity));

        (
            Self {
                settings,
                controls,
                feed,
                depth,
                eye: Eye::default(),
                closing: false,
            },
            Task::none(),
        )
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            window::frames().map(|_| Message::Tick),
            window::close_requests().map(|_| Message::CloseRequested),
            keyboard::on_key_press(|key, modifiers| {
                let raise = !modifiers.shift();
                let sign = if raise { 1.0 } else { -1.0 };
                match key.as_ref() {
                    Key::Named(Named::ArrowUp) => Some(Message::DepthBy(1)),
                    Key::Named(Named::ArrowDown) => Some(Message::DepthBy(-1)),
                    Key::Named(Named::PageUp) => Some(Message::DepthBy(DEPTH_PAGE as isize)),
                    Key::Named(Named::PageDown) => Some(Message::DepthBy(-(DEPTH_PAGE as isize))),
                    Key::Character(c) if c.eq_ignore_ascii_case("r") => Some(Message::ResetCamera),
                    Key::Character(c) if c.eq_ignore_ascii_case("m") => {
                        Some(Message::Adjust(Adjust::NextMode))
                    }
                    Key::Character(c) if c.eq_ignore_ascii_case("d") => {
                        Some(Message::Adjust(Adjust::Drive(sign * DRIVE_STEP)))
                    }
                    Key::Character(c) if c.eq_ignore_ascii_case("q") => {
                        Some(Message::Adjust(Adjust::Resonance(sign * RESONANCE_STEP)))
                    }
                    Key::Character(c) if c.eq_ignore_ascii_case("c") => {
                        let ratio = if raise { CUTOFF_RATIO } else { CUTOFF_RATIO.recip() };
                        Some(Message::Adjust(Adjust::Cutoff(ratio)))
                    }
                    Key::Character(c) if c.eq_ignore_ascii_case("v") => {
                        Some(Message::Adjust(Adjust::Volume(sign * VOLUME_STEP)))
                    }
                    _ => None,
                }
            }),
        ])
    }

    fn capacity(&self) -> usize {
        self.feed.capacity()
    }

    fn change_depth(&mut self, delta: isize) {
        let depth = self
            .depth
            .saturating_add_signed(delta)
            .clamp(1, self.capacity());
        if depth == self.depth {
            return;
        }
        self.depth = depth;
        self.settings
            .update(|manager| manager.set_history_depth(depth));
        debug!("[ui] depth set to {depth}");
    }

    fn adjust(&mut self, adjust: Adjust) {
        let current = self.controls.snapshot();
        match adjust {
            Adjust::Drive(step) => self.controls.set_drive(current.drive + step),
            Adjust::Resonance(step) => self.controls.set_resonance(current.resonance + step),
            Adjust::Cutoff(ratio) => self.controls.set_cutoff_frequency(current.cutoff * ratio),
            Adjust::Volume(step) => self.controls.set_volume(current.volume + step),
            Adjust::NextMode => self.controls.set_mode(current.mode.next()),
        }

        let applied = self.controls.snapshot();
        self.settings.update(|manager| manager.set_controls(applied));
    }
}

fn update(state: &mut UiApp, message: Message) -> Task<Message> {
    match message {
        Message::Tick => {
            if state.closing {
                return exit();
            }
        }
        Message::Camera(CameraGesture::Dolly(delta)) => state.eye.dolly(delta),
        Message::Camera(CameraGesture::Pan { dx, dy }) => state.eye.pan(dx, dy),
        Message::ResetCamera => state.eye = Eye::default(),
        Message::DepthBy(delta) => state.change_depth(delta),
        Message::Adjust(adjust) => state.adjust(adjust),
        Message::CloseRequested => {
            // Resources are released during the next redraw, then the next tick exits.
            state.closing = true;
            state.feed.request_close();
        }
    }
    Task::none()
}

fn view(state: &UiApp) -> Element<'_, Message> {
    let scope = Scope::new(Arc::clone(&state.feed), state.depth, state.eye, Message::Camera);
    let (depth, capacity) = (state.depth, state.capacity());
    let controls = state.controls.snapshot();

    stack![
        scope,
        responsive(move |size| {
            container(status_strip(depth, capacity, controls))
                .width(Length::Fill)
                .height(Length::Fixed(strip_height(size.height)))
                .padding(STRIP_PADDING)
                .style(theme::status_strip)
                .into()
        })
    ]
    .into()
}

/// Height of the top margin the scope leaves free for the strip.
fn strip_height(window_height: f32) -> f32 {
    (window_height * TOP_MARGIN).round()
}

fn status_strip<'a>(depth: usize, capacity: usize, controls: ControlSnapshot) -> Element<'a, Message> {
    row![
        field("Depth", format!("{depth} / {capacity}")),
        field("Drive", format!("{:.0}", controls.drive)),
        field("Resonance", format!("{:.2}", controls.resonance)),
        field("Cutoff", format!("{:.0} Hz", controls.cutoff)),
        field("Volume", format!("{:.2}", controls.volume)),
        field("Mode", controls.mode.to_string()),
    ]
    .spacing(28)
    .into()
}

fn field<'a>(name: &'static str, value: String) -> Element<'a, Message> {
    column![
        text(name).size(11).color(theme::secondary_text()),
        text(value).size(15),
    ]
    .spacing(2)
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::frame_renderer::drawable_region;

    #[test]
    fn strip_fills_exactly_the_scope_margin() {
        for height in [0u32, 1, 480, 720, 1_080, 1_441] {
            let region = drawable_region(1_280, height);
            assert_eq!(strip_height(height as f32), region.y as f32, "height {height}");
        }
        assert_eq!(strip_height(720.0), 122.0);
        assert_eq!(strip_height(480.0), 82.0);
    }
}
