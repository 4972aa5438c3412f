use crate::config::{EnvironmentConfig, LightingConfig, PostEffectConfig};
use crate::render::{RenderBackend, RenderPass, SceneView, Viewport};
use crate::scene::{Model, ModelGeneration};

/// Backend that draws nothing and records what it was asked to do. Used by
/// the demo host and by tests.
#[derive(Debug)]
pub struct HeadlessRenderer {
    passes: Vec<RenderPass>,
    disposed_models: Vec<ModelGeneration>,
    rendered_models: Vec<Option<ModelGeneration>>,
    accumulate: bool,
    target_samples: u32,
    samples: u32,
    linear_space: bool,
    dof_enabled: bool,
    dof_focus: Option<f32>,
    size: (u32, u32),
    viewport: Option<Viewport>,
    post_effect: PostEffectConfig,
    lighting: Option<LightingConfig>,
    environment: Option<EnvironmentConfig>,
    disposed: bool,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            disposed_models: Vec::new(),
            rendered_models: Vec::new(),
            accumulate: false,
            target_samples: 0,
            samples: 0,
            linear_space: true,
            dof_enabled: false,
            dof_focus: None,
            size: (0, 0),
            viewport: None,
            post_effect: PostEffectConfig::default(),
            lighting: None,
            environment: None,
            disposed: false,
        }
    }

    /// Whether full frames ask for refinement, and how many samples a
    /// session takes to finish.
    pub fn set_accumulation(&mut self, enabled: bool, samples: u32) {
        self.accumulate = enabled;
        self.target_samples = samples;
    }

    pub fn set_dof_enabled(&mut self, enabled: bool) {
        self.dof_enabled = enabled;
    }

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn full_renders(&self) -> usize {
        self.passes.iter().filter(|pass| **pass == RenderPass::Full).count()
    }

    /// Generation of the model drawn by each recorded pass.
    pub fn rendered_models(&self) -> &[Option<ModelGeneration>] {
        &self.rendered_models
    }

    pub fn disposed_models(&self) -> &[ModelGeneration] {
        &self.disposed_models
    }

    pub fn dof_focus(&self) -> Option<f32> {
        self.dof_focus
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn post_effect(&self) -> &PostEffectConfig {
        &self.post_effect
    }

    pub fn lighting(&self) -> Option<&LightingConfig> {
        self.lighting.as_ref()
    }

    pub fn environment(&self) -> Option<&EnvironmentConfig> {
        self.environment.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl RenderBackend for HeadlessRenderer {
    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn render(&mut self, view: &SceneView<'_>, pass: RenderPass) {
        match pass {
            RenderPass::Full => self.samples = 0,
            RenderPass::Accumulate(_) => self.samples += 1,
        }
        self.passes.push(pass);
        self.rendered_models.push(view.model.map(Model::generation));
    }

    fn needs_accumulate(&self) -> bool {
        self.accumulate
    }

    fn is_accumulation_finished(&self) -> bool {
        self.samples >= self.target_samples
    }

    fn dispose_model(&mut self, model: &Model) {
        self.disposed_models.push(model.generation());
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_linear_space(&self) -> bool {
        self.linear_space
    }

    fn is_dof_enabled(&self) -> bool {
        self.dof_enabled
    }

    fn set_dof_focus(&mut self, distance: f32) {
        self.dof_focus = Some(distance);
    }

    fn set_post_effect(&mut self, config: &PostEffectConfig) {
        self.linear_space = config.linear_space;
        self.dof_enabled = config.enable && config.depth_of_field.enable;
        self.accumulate = config.enable && (self.dof_enabled || config.ambient_occlusion);
        self.target_samples = config.accumulation_samples;
        self.post_effect = config.clone();
    }

    fn set_lighting(&mut self, lighting: &LightingConfig) {
        self.lighting = Some(lighting.clone());
    }

    fn set_environment(&mut self, environment: &EnvironmentConfig) {
        self.environment = Some(environment.clone());
    }
}
