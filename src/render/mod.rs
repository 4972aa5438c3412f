pub mod accumulation;
pub mod camera;
pub mod headless;
pub mod hotspot;
pub mod pick;

pub use accumulation::{RefreshFlag, RenderLoop, SessionId, TickReport};
pub use camera::{CameraState, OrbitCamera};
pub use headless::HeadlessRenderer;
pub use hotspot::{Hotspot, HotspotId, HotspotManager};
pub use pick::{PickResult, PickTarget, RayPicker, ScenePicker};

use crate::config::{EnvironmentConfig, LightingConfig, PostEffectConfig};
use crate::scene::{GroundPlane, Model};

/// Default per-draw joint matrix budget of the skinning shader.
pub const MAX_JOINTS_PER_DRAW: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            device_pixel_ratio,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    /// Regular frame; resets any accumulation buffers.
    Full,
    /// One more refinement sample for the given session.
    Accumulate(SessionId),
}

/// Everything a backend draws in one pass.
pub struct SceneView<'a> {
    pub model: Option<&'a Model>,
    pub ground: &'a GroundPlane,
    pub camera: &'a OrbitCamera,
    pub viewport: Viewport,
}

/// GPU side of the viewer. Implementations own every GPU resource created
/// for a model and release them in [`RenderBackend::dispose_model`].
pub trait RenderBackend {
    fn resize(&mut self, width: u32, height: u32);

    fn set_viewport(&mut self, viewport: Viewport);

    fn render(&mut self, view: &SceneView<'_>, pass: RenderPass);

    /// Whether more samples would improve the last full frame.
    fn needs_accumulate(&self) -> bool;

    fn is_accumulation_finished(&self) -> bool;

    fn dispose_model(&mut self, model: &Model);

    fn dispose(&mut self);

    fn is_linear_space(&self) -> bool;

    fn is_dof_enabled(&self) -> bool;

    fn set_dof_focus(&mut self, distance: f32);

    fn set_post_effect(&mut self, config: &PostEffectConfig);

    fn set_lighting(&mut self, lighting: &LightingConfig);

    fn set_environment(&mut self, environment: &EnvironmentConfig);

    fn max_joints_per_draw(&self) -> usize {
        MAX_JOINTS_PER_DRAW
    }
}
