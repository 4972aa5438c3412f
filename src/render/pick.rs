//! CPU ray picking
//!
//! Casts a ray from the camera through a pixel and returns the closest
//! mesh triangle it crosses. Each mesh is first tested against its
//! world-space bounding box; only boxes the ray enters are tested per
//! triangle. Skinned meshes are tested in their current pose.

use crate::render::SceneView;
use crate::scene::{Aabb, NodeId};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickTarget {
    Node(NodeId),
    Ground,
}

impl PickTarget {
    pub fn is_ground(&self) -> bool {
        matches!(self, PickTarget::Ground)
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            PickTarget::Node(id) => Some(*id),
            PickTarget::Ground => None,
        }
    }
}

/// Closest hit along a pick ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickResult {
    pub target: PickTarget,
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub point: Vec3,
}

pub trait ScenePicker {
    /// Pick at pixel (`x`, `y`) of the view's viewport.
    fn pick(&self, view: &SceneView<'_>, x: f32, y: f32) -> Option<PickResult>;
}

// ========================================================================
// RayPicker
// ========================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct RayPicker;

impl ScenePicker for RayPicker {
    fn pick(&self, view: &SceneView<'_>, x: f32, y: f32) -> Option<PickResult> {
        let ray = view.camera.ray_from_screen(x, y, &view.viewport);
        let mut best: Option<PickResult> = None;
        let mut consider = |target: PickTarget, t: f32| {
            if best.map_or(true, |hit| t < hit.distance) {
                best = Some(PickResult {
                    target,
                    distance: t,
                    point: ray.at(t),
                });
            }
        };

        if let Some(model) = view.model {
            for (id, mesh) in model.graph().mesh_nodes() {
                if model.graph().node(id).is_some_and(|node| node.invisible) {
                    continue;
                }
                let positions = model.world_positions(id);
                let bounds = Aabb::from_points(positions.iter().copied());
                if bounds.is_empty()
                    || ray_aabb_intersection(ray.origin, ray.direction, bounds.min, bounds.max).is_none()
                {
                    continue;
                }
                for [a, b, c] in mesh.geometry.triangles() {
                    let (Some(pa), Some(pb), Some(pc)) = (
                        positions.get(a as usize),
                        positions.get(b as usize),
                        positions.get(c as usize),
                    ) else {
                        continue;
                    };
                    if let Some(t) = ray_triangle_intersection(&ray, *pa, *pb, *pc) {
                        consider(PickTarget::Node(id), t);
                    }
                }
            }
        }

        let ground = view.ground;
        if ground.visible {
            let matrix = ground.matrix();
            let geometry = ground.geometry();
            for [a, b, c] in geometry.triangles() {
                let pa = matrix.transform_point3(geometry.position(a));
                let pb = matrix.transform_point3(geometry.position(b));
                let pc = matrix.transform_point3(geometry.position(c));
                if let Some(t) = ray_triangle_intersection(&ray, pa, pb, pc) {
                    consider(PickTarget::Ground, t);
                }
            }
        }
        best
    }
}

pub fn ray_aabb_intersection(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = f32::INFINITY;
    for i in 0..3 {
        let (o, d) = (origin[i], dir[i]);
        if d.abs() < 1e-6 {
            if o < min[i] || o > max[i] {
                return None;
            }
        } else {
            let inv_d = 1.0 / d;
            let mut t1 = (min[i] - o) * inv_d;
            let mut t2 = (max[i] - o) * inv_d;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
    }
    if t_max < 0.0 {
        return None;
    }
    let t_hit = if t_min >= 0.0 { t_min } else { t_max };
    Some((t_hit, origin + dir * t_hit))
}

/// Möller-Trumbore, double sided. Returns the ray parameter of the hit.
pub fn ray_triangle_intersection(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let e1 = b - a;
    let e2 = c - a;
    let p = ray.direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-8 {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t > 1e-6).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{OrbitCamera, Viewport};
    use crate::scene::{Geometry, GroundPlane, Material, MaterialId, Mesh, Model, ModelGeneration, Node, NodeGraph};

    fn quad_model() -> Model {
        let mut graph = NodeGraph::new("model");
        let geometry = Geometry::new(
            vec![[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]],
            Some(vec![0, 1, 2, 0, 2, 3]),
        );
        graph.add_child(graph.root(), Node::with_mesh("quad", Mesh::new(geometry, MaterialId(0))));
        let mut model = Model::new(
            ModelGeneration(1),
            graph,
            Vec::new(),
            Vec::new(),
            vec![Material::new("quad")],
            Vec::new(),
        );
        model.update_pose();
        model
    }

    #[test]
    fn ray_hits_triangle_in_front() {
        let ray = Ray {
            origin: Vec3::new(0.2, 0.2, 5.0),
            direction: Vec3::NEG_Z,
        };
        let t = ray_triangle_intersection(&ray, Vec3::ZERO, Vec3::X, Vec3::Y);
        assert_eq!(t, Some(5.0));
        let behind = Ray {
            origin: Vec3::new(0.2, 0.2, -5.0),
            direction: Vec3::NEG_Z,
        };
        assert_eq!(ray_triangle_intersection(&behind, Vec3::ZERO, Vec3::X, Vec3::Y), None);
    }

    #[test]
    fn aabb_miss_and_hit() {
        let hit = ray_aabb_intersection(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Vec3::splat(-1.0), Vec3::ONE);
        assert_eq!(hit.map(|(t, _)| t), Some(4.0));
        let miss = ray_aabb_intersection(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z, Vec3::splat(-1.0), Vec3::ONE);
        assert!(miss.is_none());
    }

    #[test]
    fn picks_model_before_ground_and_ground_on_miss() {
        let model = quad_model();
        let mut ground = GroundPlane::new();
        ground.set_height(-5.0);
        let mut camera = OrbitCamera::default();
        camera.alpha = 30.0;
        let viewport = Viewport::new(100, 100, 1.0);
        let view = SceneView {
            model: Some(&model),
            ground: &ground,
            camera: &camera,
            viewport,
        };

        let hit = RayPicker.pick(&view, 50.0, 50.0).unwrap();
        assert!(matches!(hit.target, PickTarget::Node(_)));
        assert!((hit.distance - 20.0).abs() < 0.5);

        let low = RayPicker.pick(&view, 50.0, 99.0).unwrap();
        assert!(low.target.is_ground());

        assert!(RayPicker.pick(&view, 50.0, 0.0).is_none());
    }
}
