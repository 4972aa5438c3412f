use crate::animation::Timeline;
use crate::scene::{Aabb, GroundPlane, Model};
use glam::Vec3;

/// How a model was placed by [`auto_fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub scale: f32,
    /// World bounds measured before scaling.
    pub bounds: Aabb,
    pub ground_height: f32,
}

/// Scale and recenter `model` so its largest extent equals `fit_size`, and
/// put the ground under it. Measured in the rest pose (time 0) with the
/// root's rotation kept and its translation and scale reset.
pub fn auto_fit(model: &mut Model, timeline: &mut Timeline, ground: &mut GroundPlane, fit_size: f32) -> FitResult {
    timeline.set_pose(0.0, model.graph_mut());
    let root = model.root();
    if let Some(node) = model.graph_mut().node_mut(root) {
        node.transform.translation = Vec3::ZERO;
        node.transform.scale = Vec3::ONE;
    }
    model.update_pose();

    let bounds = model.world_bounding_box();
    let (size, center) = if bounds.is_empty() {
        (Vec3::ZERO, Vec3::ZERO)
    } else {
        (bounds.size(), bounds.center())
    };
    let scale = fit_size / size.max_element();
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };

    if let Some(node) = model.graph_mut().node_mut(root) {
        node.transform.scale = Vec3::splat(scale);
        node.transform.translation = -center * scale;
    }
    model.update_pose();

    let ground_height = -size.y * scale / 2.0;
    ground.set_height(ground_height);
    log::debug!("Auto-fit scale {scale:.4}, ground at {ground_height:.3}");
    FitResult {
        scale,
        bounds,
        ground_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, Material, MaterialId, Mesh, ModelGeneration, Node, NodeGraph};

    fn model_with(positions: Vec<[f32; 3]>) -> Model {
        let mut graph = NodeGraph::new("model");
        let root = graph.root();
        let count = positions.len() as u32;
        let mesh = Mesh::new(Geometry::new(positions, Some((0..count).collect())), MaterialId(0));
        graph.add_child(root, Node::with_mesh("mesh", mesh));
        Model::new(
            ModelGeneration(1),
            graph,
            Vec::new(),
            Vec::new(),
            vec![Material::new("m")],
            Vec::new(),
        )
    }

    #[test]
    fn box_is_scaled_and_recentered() {
        let mut model = model_with(vec![[0.0, 0.0, 0.0], [2.0, 4.0, 0.0], [2.0, 0.0, 1.0]]);
        let mut ground = GroundPlane::new();
        let fit = auto_fit(&mut model, &mut Timeline::new(), &mut ground, 10.0);

        assert_eq!(fit.scale, 2.5);
        let bounds = model.world_bounding_box();
        assert!((bounds.center()).length() < 1e-5);
        assert!((bounds.size().y - 10.0).abs() < 1e-4);
        assert_eq!(ground.height(), -5.0);
    }

    #[test]
    fn zero_extent_model_keeps_unit_scale() {
        let mut model = model_with(vec![[1.0, 1.0, 1.0]; 3]);
        let mut ground = GroundPlane::new();
        let fit = auto_fit(&mut model, &mut Timeline::new(), &mut ground, 10.0);
        assert_eq!(fit.scale, 1.0);
        let root = model.root();
        let transform = model.graph().node(root).unwrap().transform;
        assert_eq!(transform.scale, Vec3::ONE);
        assert!(transform.translation.is_finite());
        assert_eq!(ground.height(), 0.0);
    }

    #[test]
    fn flat_plane_fits_by_its_width() {
        let mut model = model_with(vec![[-1.0, 0.0, -1.0], [1.0, 0.0, -1.0], [1.0, 0.0, 1.0]]);
        let mut ground = GroundPlane::new();
        let fit = auto_fit(&mut model, &mut Timeline::new(), &mut ground, 10.0);
        assert_eq!(fit.scale, 5.0);
        assert!(model.graph().node(model.root()).unwrap().transform.scale.is_finite());
    }

    #[test]
    fn refitting_is_stable() {
        let mut model = model_with(vec![[0.0, 0.0, 0.0], [2.0, 4.0, 0.0], [2.0, 0.0, 1.0]]);
        let mut ground = GroundPlane::new();
        let mut timeline = Timeline::new();
        let first = auto_fit(&mut model, &mut timeline, &mut ground, 10.0);
        let second = auto_fit(&mut model, &mut timeline, &mut ground, 10.0);
        assert_eq!(first, second);
    }
}
