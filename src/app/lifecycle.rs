use crate::animation::{AnimationClip, Timeline};
use crate::assets::ParsedAsset;
use crate::material;
use crate::render::{RenderBackend, RenderLoop};
use crate::scene::{Model, ModelGeneration};

/// Owner of the single displayed model and the clips bound to it.
///
/// Installing always tears the previous model down first, and that is the
/// only place backend resources of a model are released.
#[derive(Debug)]
pub struct ModelLifecycle {
    current: Option<Model>,
    timeline: Timeline,
    next_generation: u64,
}

impl Default for ModelLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLifecycle {
    pub fn new() -> Self {
        Self {
            current: None,
            timeline: Timeline::new(),
            next_generation: 1,
        }
    }

    pub fn model(&self) -> Option<&Model> {
        self.current.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut Model> {
        self.current.as_mut()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Model and timeline borrowed together, for posing.
    pub fn parts_mut(&mut self) -> (Option<&mut Model>, &mut Timeline) {
        (self.current.as_mut(), &mut self.timeline)
    }

    pub fn install<B: RenderBackend + ?Sized>(
        &mut self,
        asset: ParsedAsset,
        backend: &mut B,
        render_loop: &mut RenderLoop,
    ) -> ModelGeneration {
        self.remove(backend, render_loop);

        let generation = ModelGeneration(self.next_generation);
        self.next_generation += 1;
        let ParsedAsset {
            graph,
            nodes,
            skeletons,
            clips,
            materials,
            textures,
            ..
        } = asset;
        let mut model = Model::new(generation, graph, nodes, skeletons, materials, textures);
        material::update_srgb(&mut model, backend.is_linear_space());
        self.timeline
            .set_clips(clips, model.nodes(), render_loop.refresh_flag());
        model.update_pose();
        log::info!(
            "Installed model {} ({} nodes, {} materials, {} clips)",
            generation.get(),
            model.graph().len(),
            model.material_map().len(),
            self.timeline.clips().len()
        );
        self.current = Some(model);
        generation
    }

    /// Drop the current model if any. Returns whether one was installed.
    pub fn remove<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, render_loop: &mut RenderLoop) -> bool {
        self.timeline.remove_clips();
        render_loop.stop_accumulating();
        render_loop.mark_dirty();
        match self.current.take() {
            Some(model) => {
                backend.dispose_model(&model);
                log::info!("Removed model {}", model.generation().get());
                true
            }
            None => false,
        }
    }

    /// Replace the clips of the current model. Returns the number bound.
    pub fn set_clips(&mut self, clips: Vec<AnimationClip>, render_loop: &RenderLoop) -> usize {
        let Some(model) = &self.current else {
            log::warn!("Animation loaded without a model to bind it to");
            return 0;
        };
        self.timeline
            .set_clips(clips, model.nodes(), render_loop.refresh_flag());
        self.timeline.clips().len()
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;
    use crate::scene::{Geometry, Material, MaterialId, Mesh, Node, NodeGraph, ShaderDefine};
    use std::time::Duration;

    fn asset(material: &str) -> ParsedAsset {
        let mut graph = NodeGraph::new("model");
        let root = graph.root();
        let mesh = Mesh::new(Geometry::new(vec![[0.0; 3]; 3], None), MaterialId(0));
        let node = graph.add_child(root, Node::with_mesh("mesh", mesh));
        ParsedAsset {
            graph,
            nodes: vec![node],
            materials: vec![Material::new(material)],
            mesh_count: 1,
            ..ParsedAsset::default()
        }
    }

    #[test]
    fn install_disposes_previous_model_exactly_once() {
        let mut lifecycle = ModelLifecycle::new();
        let mut backend = HeadlessRenderer::new();
        let mut render_loop = RenderLoop::new(Duration::from_millis(50));

        let a = lifecycle.install(asset("A"), &mut backend, &mut render_loop);
        let b = lifecycle.install(asset("B"), &mut backend, &mut render_loop);
        assert_ne!(a, b);
        assert_eq!(backend.disposed_models(), &[a]);
        assert_eq!(lifecycle.model().map(Model::generation), Some(b));
        assert_eq!(lifecycle.model().unwrap().material_names().collect::<Vec<_>>(), vec!["B"]);
        assert!(render_loop.needs_refresh());
    }

    #[test]
    fn remove_without_model_is_harmless() {
        let mut lifecycle = ModelLifecycle::new();
        let mut backend = HeadlessRenderer::new();
        let mut render_loop = RenderLoop::new(Duration::from_millis(50));
        assert!(!lifecycle.remove(&mut backend, &mut render_loop));
        assert!(lifecycle.model().is_none());
        assert!(lifecycle.timeline().is_empty());
        assert!(backend.disposed_models().is_empty());
    }

    #[test]
    fn install_follows_renderer_color_space() {
        let mut lifecycle = ModelLifecycle::new();
        let mut backend = HeadlessRenderer::new();
        let mut render_loop = RenderLoop::new(Duration::from_millis(50));
        lifecycle.install(asset("A"), &mut backend, &mut render_loop);
        let material = &lifecycle.model().unwrap().materials()[0];
        assert!(material.is_defined(ShaderDefine::SrgbDecode));
    }
}
