pub mod gltf;
pub mod preprocess;
pub mod texture_util;

pub use self::gltf::GltfLoader;
pub use preprocess::preprocess;
pub use texture_util::TextureError;

use crate::animation::AnimationClip;
use crate::app::context::DisposeToken;
use crate::events::{EventQueue, LoadEvent, ViewerEvent};
use crate::material::{self, TextureRequest};
use crate::scene::{
    ImageSource, Material, Model, ModelGeneration, NodeGraph, NodeId, ShaderModel, Skeleton,
    Texture, TextureData, TextureId, TextureImage,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use glam::Quat;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed data URI: {uri}")]
    InvalidDataUri { uri: String },
    #[error("unsupported resource location: {uri}")]
    UnsupportedUri { uri: String },
    #[error("failed to parse glTF: {source}")]
    ParseGltf {
        #[source]
        source: ::gltf::Error,
    },
    #[error("failed to serialize glTF document: {source}")]
    Document {
        #[source]
        source: serde_json::Error,
    },
    #[error("glTF buffer {index} is missing")]
    MissingBuffer { index: usize },
    #[error("glTF has no scene to display")]
    NoScene,
}

// ========================================================================
// Load inputs
// ========================================================================

/// The three accepted model inputs.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// File path (or `data:` URI) of a `.gltf` / `.glb`.
    Url(String),
    /// Raw `.glb` or `.gltf` bytes.
    Binary(Vec<u8>),
    /// Already parsed glTF JSON plus its external buffers, in order.
    Document {
        json: serde_json::Value,
        buffers: Vec<Vec<u8>>,
    },
}

impl ModelSource {
    fn base_dir(&self) -> Option<PathBuf> {
        match self {
            ModelSource::Url(url) if !url.starts_with("data:") => {
                Path::new(url).parent().map(Path::to_path_buf)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

impl UpAxis {
    /// Rotation that brings this axis to +Y.
    pub fn rotation(self) -> Quat {
        match self {
            UpAxis::Y => Quat::IDENTITY,
            UpAxis::Z => Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadOptions {
    pub shader: ShaderModel,
    pub include_texture: bool,
    pub up_axis: UpAxis,
    pub texture_flip_y: bool,
    pub regenerate_normal: bool,
    pub alpha_cutoff: Option<f32>,
    pub double_sided: Option<bool>,
    /// Bundled resources by file name. Texture and buffer URIs resolve
    /// against these before touching the file system.
    #[serde(skip)]
    pub files: HashMap<String, Arc<[u8]>>,
    pub texture_root_path: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            shader: ShaderModel::Standard,
            include_texture: true,
            up_axis: UpAxis::Y,
            texture_flip_y: false,
            regenerate_normal: false,
            alpha_cutoff: None,
            double_sided: None,
            files: HashMap::new(),
            texture_root_path: None,
        }
    }
}

impl LoadOptions {
    pub fn resolver_for(&self, source: &ModelSource) -> ResourceResolver {
        ResourceResolver {
            files: self.files.clone(),
            base_dir: self.texture_root_path.clone().or_else(|| source.base_dir()),
        }
    }
}

/// Maps URIs found inside an asset to bytes.
#[derive(Debug, Clone, Default)]
pub struct ResourceResolver {
    files: HashMap<String, Arc<[u8]>>,
    base_dir: Option<PathBuf>,
}

impl ResourceResolver {
    pub fn new(files: HashMap<String, Arc<[u8]>>, base_dir: Option<PathBuf>) -> Self {
        Self { files, base_dir }
    }

    pub fn read(&self, uri: &str) -> Result<Arc<[u8]>, AssetError> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri).map(Arc::from);
        }
        let normalized = uri.replace('\\', "/");
        let file_name = normalized.rsplit('/').next().unwrap_or(&normalized);
        if let Some(bytes) = self.files.get(file_name) {
            return Ok(bytes.clone());
        }
        if normalized.contains("://") {
            return Err(AssetError::UnsupportedUri {
                uri: uri.to_string(),
            });
        }
        let path = match &self.base_dir {
            Some(base) => base.join(&normalized),
            None => PathBuf::from(&normalized),
        };
        std::fs::read(&path)
            .map(Arc::from)
            .map_err(|source| AssetError::Read {
                path: path.display().to_string(),
                source,
            })
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let invalid = || AssetError::InvalidDataUri {
        uri: uri.chars().take(64).collect(),
    };
    let (header, payload) = uri.split_once(',').ok_or_else(invalid)?;
    if !header.ends_with(";base64") {
        return Err(invalid());
    }
    BASE64.decode(payload.as_bytes()).map_err(|_| invalid())
}

// ========================================================================
// Loader output
// ========================================================================

/// What a loader hands back: a scene graph that is not yet installed.
#[derive(Debug, Default)]
pub struct ParsedAsset {
    pub graph: NodeGraph,
    /// Asset node index to graph node.
    pub nodes: Vec<NodeId>,
    pub skeletons: Vec<Skeleton>,
    pub clips: Vec<AnimationClip>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    /// Meshes declared by the asset, before primitives are split.
    pub mesh_count: usize,
}

/// Geometry statistics reported with [`LoadEvent::ModelLoaded`], counted
/// before preprocessing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub triangle_count: usize,
    pub vertex_count: usize,
    pub node_count: usize,
    pub mesh_count: usize,
    pub material_count: usize,
    pub texture_count: usize,
}

impl ModelStats {
    pub fn collect(asset: &ParsedAsset) -> Self {
        let mut stats = ModelStats {
            mesh_count: asset.mesh_count,
            material_count: asset.materials.len(),
            texture_count: asset.textures.len(),
            ..Self::default()
        };
        for id in asset.graph.traverse() {
            stats.node_count += 1;
            if let Some(mesh) = asset.graph.mesh(id) {
                stats.triangle_count += mesh.geometry.triangle_count();
                stats.vertex_count += mesh.geometry.vertex_count();
            }
        }
        stats
    }
}

/// Parses a model source into an uninstalled scene graph.
pub trait AssetLoader {
    fn load(&mut self, source: &ModelSource, options: &LoadOptions) -> Result<ParsedAsset, AssetError>;
}

// ========================================================================
// Pipeline
// ========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadId(pub(crate) u64);

impl LoadId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Returned by every load request. Events for the load carry its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadHandle {
    id: LoadId,
}

impl LoadHandle {
    pub fn id(&self) -> LoadId {
        self.id
    }

    pub fn owns(&self, event: &ViewerEvent) -> bool {
        matches!(event, ViewerEvent::Load(load) if load.load() == self.id)
    }
}

#[derive(Debug)]
pub enum LoadRequest {
    Model {
        load: LoadId,
        source: ModelSource,
        options: LoadOptions,
    },
    Animation {
        load: LoadId,
        source: ModelSource,
    },
}

#[derive(Debug)]
enum DecodeTarget {
    ModelTexture { load: LoadId, texture: TextureId },
    Material(TextureRequest),
}

#[derive(Debug)]
struct DecodeJob {
    generation: ModelGeneration,
    target: DecodeTarget,
}

#[derive(Debug)]
struct TextureJoin {
    load: LoadId,
    generation: ModelGeneration,
    remaining: usize,
}

/// Queues load requests and drives texture decoding a few images per
/// frame. Parsing itself is synchronous; the viewer pulls one request at a
/// time with [`AssetPipeline::next_request`].
pub struct AssetPipeline {
    loader: Box<dyn AssetLoader>,
    requests: VecDeque<LoadRequest>,
    decodes: VecDeque<DecodeJob>,
    joins: Vec<TextureJoin>,
    decoded: HashMap<String, Arc<RgbaImage>>,
    resolver: ResourceResolver,
    next_load: u64,
    decodes_per_frame: usize,
    token: DisposeToken,
}

impl AssetPipeline {
    pub fn new(loader: Box<dyn AssetLoader>, decodes_per_frame: usize, token: DisposeToken) -> Self {
        Self {
            loader,
            requests: VecDeque::new(),
            decodes: VecDeque::new(),
            joins: Vec::new(),
            decoded: HashMap::new(),
            resolver: ResourceResolver::default(),
            next_load: 1,
            decodes_per_frame: decodes_per_frame.max(1),
            token,
        }
    }

    pub fn set_loader(&mut self, loader: Box<dyn AssetLoader>) {
        self.loader = loader;
    }

    fn next_id(&mut self) -> LoadId {
        let id = LoadId(self.next_load);
        self.next_load += 1;
        id
    }

    pub fn request_model(&mut self, source: ModelSource, options: LoadOptions) -> LoadHandle {
        let load = self.next_id();
        self.requests.push_back(LoadRequest::Model { load, source, options });
        LoadHandle { id: load }
    }

    pub fn request_animation(&mut self, source: ModelSource) -> LoadHandle {
        let load = self.next_id();
        self.requests.push_back(LoadRequest::Animation { load, source });
        LoadHandle { id: load }
    }

    pub fn next_request(&mut self) -> Option<LoadRequest> {
        if self.token.is_disposed() {
            self.requests.clear();
            return None;
        }
        self.requests.pop_front()
    }

    /// Run the loader and orient the result.
    pub fn parse(&mut self, source: &ModelSource, options: &LoadOptions) -> Result<ParsedAsset, AssetError> {
        let mut asset = self.loader.load(source, options)?;
        if options.up_axis != UpAxis::Y {
            let root = asset.graph.root();
            if let Some(node) = asset.graph.node_mut(root) {
                node.transform.rotation = options.up_axis.rotation() * node.transform.rotation;
            }
        }
        Ok(asset)
    }

    /// Queue every texture of a freshly installed model that is not yet
    /// resident, joined under `load`. The join settles once every texture
    /// decoded or failed.
    pub fn begin_texture_join(&mut self, load: LoadId, model: &Model, resolver: ResourceResolver) {
        self.resolver = resolver;
        self.decoded.clear();
        let generation = model.generation();
        let mut remaining = 0;
        for (index, texture) in model.textures().iter().enumerate() {
            if texture.is_renderable() {
                continue;
            }
            remaining += 1;
            self.decodes.push_back(DecodeJob {
                generation,
                target: DecodeTarget::ModelTexture {
                    load,
                    texture: TextureId(index),
                },
            });
        }
        log::debug!("Load {} waits on {} textures", load.0, remaining);
        self.joins.push(TextureJoin {
            load,
            generation,
            remaining,
        });
    }

    /// Queue a texture assigned through the material API.
    pub fn request_texture(&mut self, generation: ModelGeneration, request: TextureRequest) {
        self.decodes.push_back(DecodeJob {
            generation,
            target: DecodeTarget::Material(request),
        });
    }

    pub fn has_pending_work(&self) -> bool {
        !self.requests.is_empty() || !self.decodes.is_empty() || !self.joins.is_empty()
    }

    /// Decode up to the per-frame budget and settle finished joins.
    /// Returns true when the displayed model changed.
    pub fn pump(&mut self, mut model: Option<&mut Model>, events: &mut EventQueue) -> bool {
        if self.token.is_disposed() {
            self.clear();
            return false;
        }
        let current = model.as_deref().map(Model::generation);
        let mut changed = false;
        let mut budget = self.decodes_per_frame;

        while budget > 0 {
            let Some(job) = self.decodes.pop_front() else {
                break;
            };
            let target_model = model.as_deref_mut().filter(|_| Some(job.generation) == current);
            let Some(target_model) = target_model else {
                log::debug!("Dropping texture decode for a replaced model");
                if let DecodeTarget::ModelTexture { load, .. } = job.target {
                    self.settle(load);
                }
                continue;
            };
            budget -= 1;
            match job.target {
                DecodeTarget::ModelTexture { load, texture } => {
                    let source = target_model.texture(texture).map(|t| t.source.clone());
                    if let Some(source) = source {
                        let decoded = self.decode(&source);
                        if let Some(slot) = target_model.texture_mut(texture) {
                            match decoded {
                                Ok(image) => {
                                    slot.set_data(TextureData::Image(image));
                                    changed = true;
                                }
                                Err(err) => {
                                    log::warn!("Texture {} failed: {err}", source.uri());
                                    slot.mark_failed();
                                }
                            }
                        }
                    }
                    self.settle(load);
                }
                DecodeTarget::Material(request) => {
                    match self.decode(&ImageSource::Uri(request.uri.clone())) {
                        Ok(image) => {
                            material::complete_texture_request(target_model, &request, image);
                            changed = true;
                        }
                        Err(err) => log::warn!("Texture {} failed: {err}", request.uri),
                    }
                }
            }
        }

        let mut index = 0;
        while index < self.joins.len() {
            if self.joins[index].remaining > 0 {
                index += 1;
                continue;
            }
            let join = self.joins.remove(index);
            match model.as_deref_mut().filter(|_| Some(join.generation) == current) {
                Some(target_model) => {
                    material::convert_bump_to_normal(target_model);
                    log::info!("Load {} ready", join.load.0);
                    events.push(LoadEvent::Ready { load: join.load });
                    changed = true;
                }
                None => {
                    log::debug!("Load {} settled after being replaced", join.load.0);
                    events.push(LoadEvent::Superseded { load: join.load });
                }
            }
        }
        changed
    }

    fn settle(&mut self, load: LoadId) {
        if let Some(join) = self.joins.iter_mut().find(|join| join.load == load) {
            join.remaining = join.remaining.saturating_sub(1);
        }
    }

    fn decode(&mut self, source: &ImageSource) -> Result<TextureImage, TextureError> {
        let bytes = texture_util::read_source(source, &self.resolver)?;
        let hash = texture_util::source_hash(&bytes);
        let pixels = match self.decoded.get(&hash) {
            Some(pixels) => pixels.clone(),
            None => {
                let pixels = Arc::new(texture_util::decode_bytes(source.uri(), &bytes)?);
                self.decoded.insert(hash.clone(), pixels.clone());
                pixels
            }
        };
        let mut image = TextureImage::new(source.uri(), pixels);
        image.source_hash = Some(hash);
        Ok(image)
    }

    /// Forget all queued work.
    pub fn clear(&mut self) {
        self.requests.clear();
        self.decodes.clear();
        self.joins.clear();
        self.decoded.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scene::{Geometry, MaterialId, Mesh, Node};
    use image::Rgba;

    pub(crate) fn png_bytes(color: [u8; 4]) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(4, 4, Rgba(color))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn model_with_textures(generation: u64, sources: &[&str]) -> Model {
        let mut graph = NodeGraph::new("model");
        let mesh = Mesh::new(Geometry::default(), MaterialId(0));
        graph.add_child(graph.root(), Node::with_mesh("mesh", mesh));
        let textures = sources
            .iter()
            .map(|uri| Texture::pending(ImageSource::Uri(uri.to_string())))
            .collect();
        Model::new(
            ModelGeneration(generation),
            graph,
            Vec::new(),
            Vec::new(),
            vec![Material::new("mat")],
            textures,
        )
    }

    struct NoLoader;

    impl AssetLoader for NoLoader {
        fn load(&mut self, _: &ModelSource, _: &LoadOptions) -> Result<ParsedAsset, AssetError> {
            Err(AssetError::NoScene)
        }
    }

    fn pipeline() -> AssetPipeline {
        AssetPipeline::new(Box::new(NoLoader), 8, DisposeToken::new())
    }

    fn resolver() -> ResourceResolver {
        let mut files: HashMap<String, Arc<[u8]>> = HashMap::new();
        files.insert("ok.png".into(), png_bytes([255, 0, 0, 255]).into());
        files.insert("same.png".into(), png_bytes([255, 0, 0, 255]).into());
        files.insert("broken.png".into(), Arc::from(&b"garbage"[..]));
        ResourceResolver::new(files, None)
    }

    #[test]
    fn resolver_prefers_bundled_files_by_name() {
        let resolver = resolver();
        assert!(resolver.read("textures\\nested/ok.png").is_ok());
        assert!(matches!(
            resolver.read("https://example.com/a.png"),
            Err(AssetError::UnsupportedUri { .. })
        ));
        assert!(matches!(resolver.read("missing.png"), Err(AssetError::Read { .. })));
        let data = resolver.read("data:application/octet-stream;base64,AQID").unwrap();
        assert_eq!(&data[..], &[1, 2, 3]);
        assert!(matches!(
            resolver.read("data:text/plain,hello"),
            Err(AssetError::InvalidDataUri { .. })
        ));
    }

    #[test]
    fn join_settles_over_failures_and_reports_ready() {
        let mut pipeline = pipeline();
        let mut model = model_with_textures(1, &["ok.png", "broken.png", "same.png"]);
        let handle = pipeline.request_model(ModelSource::Binary(Vec::new()), LoadOptions::default());
        let _ = pipeline.next_request();
        pipeline.begin_texture_join(handle.id(), &model, resolver());

        let mut events = EventQueue::default();
        assert!(pipeline.pump(Some(&mut model), &mut events));
        let drained = events.drain();
        assert_eq!(drained, vec![ViewerEvent::Load(LoadEvent::Ready { load: handle.id() })]);

        assert!(model.textures()[0].is_renderable());
        assert_eq!(model.textures()[1].state(), crate::scene::texture::TextureState::Failed);
        // identical source bytes share one decode
        let a = model.textures()[0].image().unwrap();
        let c = model.textures()[2].image().unwrap();
        assert!(Arc::ptr_eq(&a.pixels, &c.pixels));
        assert!(!pipeline.has_pending_work());
    }

    #[test]
    fn model_without_textures_is_ready_on_next_pump() {
        let mut pipeline = pipeline();
        let mut model = model_with_textures(1, &[]);
        let handle = pipeline.request_model(ModelSource::Binary(Vec::new()), LoadOptions::default());
        pipeline.begin_texture_join(handle.id(), &model, ResourceResolver::default());
        let mut events = EventQueue::default();
        pipeline.pump(Some(&mut model), &mut events);
        assert_eq!(events.drain(), vec![ViewerEvent::Load(LoadEvent::Ready { load: handle.id() })]);
    }

    #[test]
    fn replaced_model_join_is_superseded_without_decoding() {
        let mut pipeline = pipeline();
        let old = model_with_textures(1, &["ok.png"]);
        let first = pipeline.request_model(ModelSource::Binary(Vec::new()), LoadOptions::default());
        pipeline.begin_texture_join(first.id(), &old, resolver());

        let mut current = model_with_textures(2, &[]);
        let mut events = EventQueue::default();
        pipeline.pump(Some(&mut current), &mut events);
        assert_eq!(events.drain(), vec![ViewerEvent::Load(LoadEvent::Superseded { load: first.id() })]);
        assert!(!old.textures()[0].is_renderable());
    }

    #[test]
    fn disposal_drops_queued_work() {
        let token = DisposeToken::new();
        let mut pipeline = AssetPipeline::new(Box::new(NoLoader), 8, token.clone());
        let mut model = model_with_textures(1, &["ok.png"]);
        let handle = pipeline.request_model(ModelSource::Binary(Vec::new()), LoadOptions::default());
        pipeline.begin_texture_join(handle.id(), &model, resolver());
        token.dispose();
        let mut events = EventQueue::default();
        assert!(!pipeline.pump(Some(&mut model), &mut events));
        assert!(events.is_empty());
        assert!(pipeline.next_request().is_none());
        assert!(!pipeline.has_pending_work());
    }

    #[test]
    fn load_options_deserialize_with_defaults() {
        let options: LoadOptions = serde_json::from_str(r#"{ "upAxis": "z", "doubleSided": true }"#).unwrap();
        assert_eq!(options.up_axis, UpAxis::Z);
        assert_eq!(options.double_sided, Some(true));
        assert!(options.include_texture);
        assert_eq!(options.shader, ShaderModel::Standard);
    }
}
