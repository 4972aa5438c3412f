pub mod geometry;
pub mod graph;
pub mod material;
pub mod model;
pub mod skeleton;
pub mod texture;

pub use geometry::{split_by_joints, Aabb, Geometry};
pub use graph::{Mesh, Node, NodeGraph, NodeId, Transform};
pub use material::{Material, MaterialId, ShaderDefine, ShaderModel, ShaderPrecision, TextureSlot};
pub use model::{Model, ModelGeneration};
pub use skeleton::{Joint, Skeleton, SkeletonId};
pub use texture::{ImageSource, Texture, TextureData, TextureId, TextureImage};

use glam::{Mat4, Quat, Vec3};

pub const GROUND_SCALE: f32 = 40.0;

/// Shadow-receiving plane under the model. Never picked as a selection
/// target and never casts shadows.
#[derive(Debug, Clone)]
pub struct GroundPlane {
    pub transform: Transform,
    pub visible: bool,
    pub show_grid: bool,
    geometry: Geometry,
}

impl Default for GroundPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl GroundPlane {
    pub fn new() -> Self {
        let mut geometry = Geometry::new(
            vec![
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
            ],
            Some(vec![0, 1, 2, 0, 2, 3]),
        );
        geometry.normals = vec![[0.0, 0.0, 1.0]; 4];
        geometry.uvs = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        Self {
            transform: Transform {
                translation: Vec3::ZERO,
                rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
                scale: Vec3::new(GROUND_SCALE, GROUND_SCALE, 1.0),
            },
            visible: true,
            show_grid: false,
            geometry,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    pub fn height(&self) -> f32 {
        self.transform.translation.y
    }

    pub fn set_height(&mut self, y: f32) {
        self.transform.translation.y = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_lies_flat_in_xz() {
        let mut ground = GroundPlane::new();
        ground.set_height(-2.0);
        let bounds = ground.geometry().bounding_box().transformed(&ground.matrix());
        assert!((bounds.min.y + 2.0).abs() < 1e-4);
        assert!((bounds.max.y + 2.0).abs() < 1e-4);
        assert!((bounds.size().x - 2.0 * GROUND_SCALE).abs() < 1e-3);
        assert!((bounds.size().z - 2.0 * GROUND_SCALE).abs() < 1e-3);
    }
}
