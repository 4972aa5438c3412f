pub mod autofit;
pub mod context;
pub mod input;
pub mod lifecycle;
pub mod timing;

pub use autofit::{auto_fit, FitResult};
pub use context::DisposeToken;
pub use input::{ClickOutcome, PointerTracker, Selection};
pub use lifecycle::ModelLifecycle;
pub use timing::{FpsSummary, FrameTiming};

use crate::animation::{Take, Timeline};
use crate::assets::{
    preprocess, AssetLoader, AssetPipeline, GltfLoader, LoadHandle, LoadOptions, LoadRequest, ModelSource,
    ModelStats, UpAxis,
};
use crate::config::{
    AmbientLightConfig, CameraControlUpdate, EnvironmentConfig, GroundUpdate, LightConfig, LightingConfig,
    PostEffectConfig, ViewerConfig,
};
use crate::events::{EventQueue, InteractionEvent, LoadEvent, ViewEvent, ViewerEvent};
use crate::material::{self, MaterialConfig, MaterialSnapshot};
use crate::render::{
    HotspotId, HotspotManager, OrbitCamera, RayPicker, RenderBackend, RenderLoop, RenderPass, SceneView,
    ScenePicker, TickReport, Viewport,
};
use crate::scene::{GroundPlane, Model, Transform};
use glam::{Mat4, Vec3};
use std::time::{Duration, Instant};

/// What one [`Viewer::frame`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub tick: TickReport,
    pub fps: Option<FpsSummary>,
}

/// The embeddable viewer: one model, one camera, one render backend.
///
/// Everything runs on the caller's thread. The host forwards pointer input
/// and calls [`Viewer::frame`] once per display refresh; loads and texture
/// decodes queued in between are worked off from there.
pub struct Viewer<B: RenderBackend> {
    config: ViewerConfig,
    backend: B,
    pipeline: AssetPipeline,
    lifecycle: ModelLifecycle,
    render_loop: RenderLoop,
    camera: OrbitCamera,
    ground: GroundPlane,
    hotspots: HotspotManager,
    picker: Box<dyn ScenePicker>,
    pointer: PointerTracker,
    selection: Selection,
    events: EventQueue,
    timing: FrameTiming,
    viewport: Viewport,
    lighting: LightingConfig,
    picking: bool,
    texture_flip_y: bool,
    token: DisposeToken,
}

impl<B: RenderBackend> Viewer<B> {
    pub fn new(mut backend: B, config: ViewerConfig) -> Self {
        let token = DisposeToken::new();
        let lighting = LightingConfig::from_viewer(&config);
        backend.set_post_effect(&config.post_effect);
        backend.set_lighting(&lighting);
        if let Some(environment) = &config.environment {
            backend.set_environment(environment);
        }
        let mut ground = GroundPlane::new();
        ground.visible = config.ground.show;
        ground.show_grid = config.ground.grid;

        let mut render_loop = RenderLoop::new(Duration::from_millis(config.accumulation_debounce_ms));
        render_loop.mark_dirty();
        Self {
            backend,
            pipeline: AssetPipeline::new(Box::new(GltfLoader), config.texture_decodes_per_frame, token.clone()),
            lifecycle: ModelLifecycle::new(),
            render_loop,
            camera: OrbitCamera::from_config(&config.camera),
            ground,
            hotspots: HotspotManager::new(),
            picker: Box::new(RayPicker),
            pointer: PointerTracker::new(config.drag_threshold),
            selection: Selection::default(),
            events: EventQueue::default(),
            timing: FrameTiming::new(),
            viewport: Viewport::new(0, 0, config.device_pixel_ratio),
            lighting,
            picking: config.picking,
            texture_flip_y: false,
            token,
            config,
        }
    }

    pub fn with_loader(mut self, loader: impl AssetLoader + 'static) -> Self {
        self.pipeline.set_loader(Box::new(loader));
        self
    }

    pub fn with_picker(mut self, picker: impl ScenePicker + 'static) -> Self {
        self.picker = Box::new(picker);
        self
    }

    fn is_live(&self, operation: &str) -> bool {
        if self.token.is_disposed() {
            log::warn!("{operation} called on a disposed viewer");
            return false;
        }
        true
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn model(&self) -> Option<&Model> {
        self.lifecycle.model()
    }

    pub fn timeline(&self) -> &Timeline {
        self.lifecycle.timeline()
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn ground(&self) -> &GroundPlane {
        &self.ground
    }

    pub fn hotspots(&self) -> &HotspotManager {
        &self.hotspots
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_picking_enabled(&self) -> bool {
        self.picking
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_disposed()
    }

    pub fn has_pending_work(&self) -> bool {
        self.pipeline.has_pending_work()
    }

    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain()
    }

    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    /// Queue a model load. It is parsed and installed on the next frame;
    /// events for it carry the handle's id.
    pub fn load_model(&mut self, source: ModelSource, options: LoadOptions) -> LoadHandle {
        let handle = self.pipeline.request_model(source, options);
        log::debug!("Queued model load {}", handle.id().get());
        handle
    }

    /// Queue a file whose clips replace those of the current model.
    pub fn load_animation(&mut self, source: ModelSource) -> LoadHandle {
        self.pipeline.request_animation(source)
    }

    fn process_requests(&mut self) {
        while let Some(request) = self.pipeline.next_request() {
            match request {
                LoadRequest::Model { load, source, options } => {
                    let resolver = options.resolver_for(&source);
                    let mut asset = match self.pipeline.parse(&source, &options) {
                        Ok(asset) => asset,
                        Err(err) => {
                            log::warn!("Model load {} failed: {err}", load.get());
                            self.events.push(LoadEvent::Error {
                                load,
                                message: err.to_string(),
                            });
                            continue;
                        }
                    };
                    let stats = ModelStats::collect(&asset);
                    preprocess(&mut asset, &options, self.backend.max_joints_per_draw());
                    self.lifecycle
                        .install(asset, &mut self.backend, &mut self.render_loop);
                    self.selection.clear();
                    self.texture_flip_y = options.texture_flip_y;
                    self.auto_fit_model(None);
                    log::info!(
                        "Model load {} complete: {} triangles, {} vertices",
                        load.get(),
                        stats.triangle_count,
                        stats.vertex_count
                    );
                    self.events.push(LoadEvent::ModelLoaded { load, stats });
                    if let Some(model) = self.lifecycle.model() {
                        self.pipeline.begin_texture_join(load, model, resolver);
                    }
                }
                LoadRequest::Animation { load, source } => {
                    let options = LoadOptions {
                        include_texture: false,
                        ..LoadOptions::default()
                    };
                    if self.lifecycle.model().is_none() {
                        self.events.push(LoadEvent::Error {
                            load,
                            message: "no model to bind the animation to".to_string(),
                        });
                        continue;
                    }
                    match self.pipeline.parse(&source, &options) {
                        Ok(asset) => {
                            let clip_count = self.lifecycle.set_clips(asset.clips, &self.render_loop);
                            log::info!("Animation load {} bound {clip_count} clips", load.get());
                            self.events.push(LoadEvent::AnimationLoaded { load, clip_count });
                        }
                        Err(err) => {
                            log::warn!("Animation load {} failed: {err}", load.get());
                            self.events.push(LoadEvent::Error {
                                load,
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn remove_model(&mut self) {
        if !self.is_live("remove_model") {
            return;
        }
        self.lifecycle.remove(&mut self.backend, &mut self.render_loop);
        self.selection.clear();
    }

    pub fn start(&mut self) {
        if self.is_live("start") {
            self.render_loop.start();
            self.render_loop.mark_dirty();
        }
    }

    pub fn stop(&mut self) {
        self.render_loop.stop();
    }

    /// Release the model and the backend. Terminal: later calls are no-ops.
    pub fn dispose(&mut self) {
        if !self.is_live("dispose") {
            return;
        }
        self.lifecycle.remove(&mut self.backend, &mut self.render_loop);
        self.token.dispose();
        self.pipeline.clear();
        self.render_loop.stop();
        self.render_loop.stop_accumulating();
        self.hotspots.clear();
        self.events.clear();
        self.backend.dispose();
        log::info!("Viewer disposed");
    }

    // ---------------------------------------------------------------------
    // Materials
    // ---------------------------------------------------------------------

    pub fn set_material(&mut self, names: &[&str], config: &MaterialConfig) {
        if !self.is_live("set_material") {
            return;
        }
        let Some(model) = self.lifecycle.model_mut() else {
            log::warn!("set_material without a model");
            return;
        };
        let generation = model.generation();
        let Some(update) = material::set_material(model, names, config, self.texture_flip_y) else {
            return;
        };
        for request in update.texture_requests {
            self.pipeline.request_texture(generation, request);
        }
        self.render_loop.mark_dirty();
    }

    pub fn get_material(&self, name: &str) -> Option<MaterialSnapshot> {
        material::get_material(self.lifecycle.model()?, name)
    }

    pub fn material_names(&self) -> Vec<String> {
        self.lifecycle
            .model()
            .map(|model| model.material_names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn set_texture_flip_y(&mut self, flip_y: bool) {
        if !self.is_live("set_texture_flip_y") {
            return;
        }
        self.texture_flip_y = flip_y;
        if let Some(model) = self.lifecycle.model_mut() {
            material::set_texture_flip_y(model, flip_y);
            self.render_loop.mark_dirty();
        }
    }

    // ---------------------------------------------------------------------
    // Animation
    // ---------------------------------------------------------------------

    pub fn set_pose(&mut self, time: f32) {
        if !self.is_live("set_pose") {
            return;
        }
        let (model, timeline) = self.lifecycle.parts_mut();
        if let Some(model) = model {
            timeline.set_pose(time, model.graph_mut());
            model.update_pose();
        }
    }

    pub fn animation_duration(&self) -> f32 {
        self.lifecycle.timeline().duration()
    }

    pub fn takes(&self) -> &[Take] {
        self.lifecycle.timeline().takes()
    }

    pub fn pause_animation(&mut self) {
        if !self.is_live("pause_animation") {
            return;
        }
        self.lifecycle.timeline_mut().pause();
        self.render_loop.mark_dirty();
    }

    pub fn resume_animation(&mut self) {
        if !self.is_live("resume_animation") {
            return;
        }
        self.lifecycle.timeline_mut().resume();
        self.render_loop.mark_dirty();
    }

    pub fn stop_animation(&mut self) {
        if !self.is_live("stop_animation") {
            return;
        }
        self.lifecycle.timeline_mut().stop();
        self.render_loop.mark_dirty();
    }

    pub fn play_animation(&mut self) {
        if !self.is_live("play_animation") {
            return;
        }
        self.lifecycle.timeline_mut().play();
        self.render_loop.mark_dirty();
    }

    // ---------------------------------------------------------------------
    // View
    // ---------------------------------------------------------------------

    /// Scale and center the model to `fit_size` (the configured size when
    /// `None`).
    pub fn auto_fit_model(&mut self, fit_size: Option<f32>) -> Option<FitResult> {
        let fit_size = fit_size.unwrap_or(self.config.fit_size);
        let (model, timeline) = self.lifecycle.parts_mut();
        let fit = auto_fit(model?, timeline, &mut self.ground, fit_size);
        self.hotspots.set_bounding_box(fit.bounds);
        self.render_loop.mark_dirty();
        Some(fit)
    }

    pub fn set_model_up_axis(&mut self, up_axis: UpAxis) {
        if !self.is_live("set_model_up_axis") {
            return;
        }
        let Some(model) = self.lifecycle.model_mut() else {
            return;
        };
        let root = model.root();
        if let Some(node) = model.graph_mut().node_mut(root) {
            node.transform = Transform {
                rotation: up_axis.rotation(),
                ..Transform::IDENTITY
            };
        }
        self.auto_fit_model(None);
    }

    pub fn enable_picking(&mut self) {
        self.picking = true;
    }

    pub fn disable_picking(&mut self) {
        self.picking = false;
    }

    pub fn set_ground(&mut self, update: GroundUpdate) {
        if let Some(show) = update.show {
            self.ground.visible = show;
        }
        if let Some(grid) = update.grid {
            self.ground.show_grid = grid;
        }
        self.render_loop.mark_dirty();
    }

    pub fn set_camera_control(&mut self, update: &CameraControlUpdate) {
        if !self.is_live("set_camera_control") {
            return;
        }
        self.camera.set_option(update);
        self.camera_changed();
    }

    fn camera_changed(&mut self) {
        self.events.push(ViewEvent::CameraUpdated(self.camera.state()));
        self.render_loop.mark_dirty();
    }

    fn apply_lighting(&mut self) {
        if !self.is_live("set_light") {
            return;
        }
        self.backend.set_lighting(&self.lighting);
        self.render_loop.mark_dirty();
    }

    pub fn set_main_light(&mut self, light: LightConfig) {
        self.lighting.main = light;
        self.apply_lighting();
    }

    pub fn set_secondary_light(&mut self, light: LightConfig) {
        self.lighting.secondary = light;
        self.apply_lighting();
    }

    pub fn set_tertiary_light(&mut self, light: LightConfig) {
        self.lighting.tertiary = light;
        self.apply_lighting();
    }

    pub fn set_ambient_light(&mut self, light: AmbientLightConfig) {
        self.lighting.ambient = light;
        self.apply_lighting();
    }

    pub fn set_environment(&mut self, environment: EnvironmentConfig) {
        if !self.is_live("set_environment") {
            return;
        }
        self.backend.set_environment(&environment);
        self.config.environment = Some(environment);
        self.render_loop.mark_dirty();
    }

    /// Forward post-processing settings and re-evaluate sRGB decoding of
    /// every material against the new output space.
    pub fn set_post_effect(&mut self, post_effect: PostEffectConfig) {
        if !self.is_live("set_post_effect") {
            return;
        }
        self.backend.set_post_effect(&post_effect);
        if let Some(model) = self.lifecycle.model_mut() {
            material::update_srgb(model, self.backend.is_linear_space());
        }
        self.config.post_effect = post_effect;
        self.render_loop.mark_dirty();
    }

    /// Anchor an overlay tip at `position` in model space.
    pub fn add_hotspot(&mut self, position: Vec3, tip: impl Into<String>) -> HotspotId {
        self.render_loop.mark_dirty();
        self.hotspots.add(position, tip)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.is_live("resize") {
            return;
        }
        self.backend.resize(width, height);
        self.viewport = Viewport::new(width, height, self.config.device_pixel_ratio);
        self.backend.set_viewport(self.viewport);
        self.render_loop.mark_dirty();
    }

    // ---------------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------------

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if self.token.is_disposed() {
            return;
        }
        self.pointer.pointer_down(x, y);
    }

    /// Dragging with the pointer pressed orbits the camera.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if self.token.is_disposed() {
            return;
        }
        if let Some(delta) = self.pointer.pointer_move(x, y) {
            if delta != glam::Vec2::ZERO {
                self.camera.rotate(delta.x, delta.y);
                self.camera_changed();
            }
        }
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) -> ClickOutcome {
        if self.token.is_disposed() {
            return ClickOutcome::Ignored;
        }
        let listening = self.picking || self.backend.is_dof_enabled();
        let outcome = self.pointer.pointer_up(x, y, listening);
        if let ClickOutcome::Pick { x, y } = outcome {
            self.pick(x, y);
        }
        outcome
    }

    /// Positive `delta` zooms out.
    pub fn wheel(&mut self, delta: f32) {
        if self.token.is_disposed() {
            return;
        }
        self.camera.zoom(delta);
        self.camera_changed();
    }

    fn pick(&mut self, x: f32, y: f32) {
        let view = SceneView {
            model: self.lifecycle.model(),
            ground: &self.ground,
            camera: &self.camera,
            viewport: self.viewport,
        };
        let hit = self.picker.pick(&view, x, y);
        for event in self.selection.resolve(hit) {
            if let InteractionEvent::DofFocus(hit) = &event {
                self.backend.set_dof_focus(hit.distance);
                self.render_loop.mark_dirty();
            }
            self.events.push(event);
        }
    }

    // ---------------------------------------------------------------------
    // Frame
    // ---------------------------------------------------------------------

    /// One display refresh: finish queued loads, decode a few textures,
    /// advance animation, then draw if anything changed.
    pub fn frame(&mut self, now: Instant) -> FrameReport {
        if self.token.is_disposed() {
            return FrameReport::default();
        }
        let fps = self.timing.update(now);

        self.process_requests();
        if self.pipeline.pump(self.lifecycle.model_mut(), &mut self.events) {
            self.render_loop.mark_dirty();
        }

        let (model, timeline) = self.lifecycle.parts_mut();
        if let Some(model) = model {
            if timeline.advance(self.timing.frame_dt, model.graph_mut()) {
                model.update_pose();
            }
        }

        let view = SceneView {
            model: self.lifecycle.model(),
            ground: &self.ground,
            camera: &self.camera,
            viewport: self.viewport,
        };
        let tick = self
            .render_loop
            .tick(now, &mut self.backend, &view, &self.token);

        if tick.full {
            self.events.push(ViewEvent::RenderScene);
            self.events.push(ViewEvent::AfterRender { pass: RenderPass::Full });
        }
        for session in &tick.accumulated {
            self.events.push(ViewEvent::AfterRender {
                pass: RenderPass::Accumulate(*session),
            });
        }
        if tick.rendered() {
            let model_matrix = self
                .lifecycle
                .model()
                .map(|model| model.graph().world_matrix(model.root()))
                .unwrap_or(Mat4::IDENTITY);
            self.hotspots.update(&self.camera, &self.viewport, model_matrix);
        }
        FrameReport { tick, fps }
    }
}
