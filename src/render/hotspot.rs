use crate::render::{OrbitCamera, Viewport};
use crate::scene::Aabb;
use glam::{Mat4, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotspotId(usize);

/// Overlay anchor attached to a point of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    /// Position in model space, before auto-fit.
    pub position: Vec3,
    pub tip: String,
    /// Screen position after the last update, `None` when behind the
    /// camera or outside the viewport.
    pub screen: Option<Vec2>,
}

/// Keeps overlay tips glued to the model as the camera moves. The host
/// reads [`Hotspot::screen`] after each frame to place its widgets.
#[derive(Debug, Default)]
pub struct HotspotManager {
    hotspots: Vec<Hotspot>,
    bounds: Option<Aabb>,
}

impl HotspotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, position: Vec3, tip: impl Into<String>) -> HotspotId {
        self.hotspots.push(Hotspot {
            position,
            tip: tip.into(),
            screen: None,
        });
        HotspotId(self.hotspots.len() - 1)
    }

    pub fn get(&self, id: HotspotId) -> Option<&Hotspot> {
        self.hotspots.get(id.0)
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    pub fn clear(&mut self) {
        self.hotspots.clear();
    }

    /// Model bounds the overlay lays tips out against.
    pub fn set_bounding_box(&mut self, bounds: Aabb) {
        self.bounds = Some(bounds);
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Project every anchor through `model_matrix` and the camera.
    pub fn update(&mut self, camera: &OrbitCamera, viewport: &Viewport, model_matrix: Mat4) {
        let width = viewport.x as f32 + viewport.width as f32;
        let height = viewport.y as f32 + viewport.height as f32;
        for hotspot in &mut self.hotspots {
            let world = model_matrix.transform_point3(hotspot.position);
            hotspot.screen = camera.project(world, viewport).filter(|p| {
                p.x >= viewport.x as f32 && p.y >= viewport.y as f32 && p.x <= width && p.y <= height
            });
        }
    }
}
