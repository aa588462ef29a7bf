use super::context::Viewport;
use glam::{Mat4, Vec3};

const FOV_Y_DEGREES: f32 = 30.0;
const NEAR_CLIP: f32 = 0.1;
const FAR_CLIP: f32 = 1_000.0;

const DOLLY_SPEED: f32 = 2.0;
const PAN_SPEED: f32 = 0.5;
// Drag distances are measured against the reference window size.
const PAN_REFERENCE_WIDTH: f32 = 1_280.0;
const PAN_REFERENCE_HEIGHT: f32 = 720.0;

/// Camera position in world space. The scene is translated by its negation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eye {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Eye {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.15,
            z: 0.25,
        }
    }
}

impl Eye {
    /// Pans by a drag of `(dx, dy)` logical pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.x -= dx / PAN_REFERENCE_WIDTH * PAN_SPEED;
        self.y += dy / PAN_REFERENCE_HEIGHT * PAN_SPEED;
    }

    /// Moves along z by a normalised wheel delta; positive moves closer.
    pub fn dolly(&mut self, delta: f32) {
        self.z -= delta * DOLLY_SPEED;
    }

    fn translation(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    eye: Eye,
    aspect: f32,
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Viewport {
            x: 0,
            y: 0,
            width: 1_280,
            height: 720,
        })
    }
}

impl Camera {
    pub fn new(viewport: Viewport) -> Self {
        let aspect = viewport.aspect_ratio();
        Self {
            eye: Eye::default(),
            aspect,
            projection: perspective(aspect),
        }
    }

    /// Rebuilds the projection for a new drawable region.
    pub fn resize(&mut self, viewport: Viewport) {
        let aspect = viewport.aspect_ratio();
        if aspect != self.aspect {
            self.aspect = aspect;
            self.projection = perspective(aspect);
        }
    }

    pub fn set_eye(&mut self, eye: Eye) {
        self.eye = eye;
    }

    pub fn projection(&self) -> [f32; 16] {
        self.projection.to_cols_array()
    }

    pub fn view(&self) -> [f32; 16] {
        Mat4::from_translation(self.eye.translation()).to_cols_array()
    }
}

fn perspective(aspect: f32) -> Mat4 {
    Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, NEAR_CLIP, FAR_CLIP)
}
