//! Default [`AssetLoader`] for glTF 2.0 (`.gltf` and `.glb`).

use crate::animation::{AnimationClip, Interpolation, Keyframes, Track};
use crate::assets::{AssetError, AssetLoader, LoadOptions, ModelSource, ParsedAsset, ResourceResolver};
use crate::scene::{
    Geometry, ImageSource, Joint, Material, MaterialId, Mesh, Node, NodeGraph, NodeId, ShaderDefine,
    Skeleton, SkeletonId, Texture, TextureId, TextureSlot, Transform,
};
use ::gltf::animation::util::ReadOutputs;
use ::gltf::animation::{Interpolation as GltfInterpolation, Property};
use ::gltf::material::AlphaMode;
use ::gltf::mesh::Mode;
use glam::{Mat4, Quat, Vec3};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy)]
pub struct GltfLoader;

impl AssetLoader for GltfLoader {
    fn load(&mut self, source: &ModelSource, options: &LoadOptions) -> Result<ParsedAsset, AssetError> {
        let resolver = options.resolver_for(source);
        let (bytes, external) = match source {
            ModelSource::Url(url) => {
                let bytes = ResourceResolver::new(options.files.clone(), None).read(url)?;
                (bytes.to_vec(), Vec::new())
            }
            ModelSource::Binary(bytes) => (bytes.clone(), Vec::new()),
            ModelSource::Document { json, buffers } => {
                let bytes = serde_json::to_vec(json).map_err(|source| AssetError::Document { source })?;
                (bytes, buffers.clone())
            }
        };
        let gltf = ::gltf::Gltf::from_slice(&bytes).map_err(|source| AssetError::ParseGltf { source })?;
        let buffers = load_buffers(&gltf, &external, &resolver)?;
        build_asset(&gltf, &buffers, options)
    }
}

fn load_buffers(
    gltf: &::gltf::Gltf,
    external: &[Vec<u8>],
    resolver: &ResourceResolver,
) -> Result<Vec<Vec<u8>>, AssetError> {
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let index = buffer.index();
        let data = match buffer.source() {
            ::gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or(AssetError::MissingBuffer { index })?,
            ::gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => resolver.read(uri)?.to_vec(),
            ::gltf::buffer::Source::Uri(uri) => match external.get(index) {
                Some(data) => data.clone(),
                None => resolver.read(uri)?.to_vec(),
            },
        };
        if data.len() < buffer.length() {
            return Err(AssetError::MissingBuffer { index });
        }
        buffers.push(data);
    }
    Ok(buffers)
}

fn build_asset(
    gltf: &::gltf::Gltf,
    buffers: &[Vec<u8>],
    options: &LoadOptions,
) -> Result<ParsedAsset, AssetError> {
    let document = &gltf.document;
    let textures = if options.include_texture {
        load_textures(document, buffers, options.texture_flip_y)
    } else {
        Vec::new()
    };
    let mut materials: Vec<Material> = document
        .materials()
        .map(|material| convert_material(&material, options, textures.len()))
        .collect();
    let mut default_material: Option<MaterialId> = None;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(AssetError::NoScene)?;

    let mut graph = NodeGraph::new(scene.name().unwrap_or("model"));
    let root = graph.root();
    let mut slots: Vec<Option<NodeId>> = vec![None; document.nodes().count()];
    let mut queue: VecDeque<(::gltf::Node, NodeId)> = scene.nodes().map(|node| (node, root)).collect();

    let mut attach = |graph: &mut NodeGraph, node: &::gltf::Node, parent: NodeId| -> NodeId {
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let (translation, rotation, scale) = node.transform().decomposed();
        let mut scene_node = Node::new(name.clone());
        scene_node.transform = Transform {
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from_array(scale),
        };
        let id = graph.add_child(parent, scene_node);
        if let Some(mesh) = node.mesh() {
            let skin = node.skin();
            let mut meshes = Vec::new();
            for primitive in mesh.primitives() {
                if primitive.mode() != Mode::Triangles {
                    log::warn!("Skipping non-triangle primitive in mesh {name}");
                    continue;
                }
                let material = match primitive.material().index() {
                    Some(index) => MaterialId(index),
                    None => *default_material.get_or_insert_with(|| {
                        let mut material = Material::new("default");
                        material.shader = options.shader;
                        materials.push(material);
                        MaterialId(materials.len() - 1)
                    }),
                };
                let Some(geometry) = read_geometry(&primitive, buffers) else {
                    log::warn!("Skipping unreadable primitive in mesh {name}");
                    continue;
                };
                let mut scene_mesh = Mesh::new(geometry, material);
                if let Some(skin) = &skin {
                    scene_mesh.skeleton = Some(SkeletonId(skin.index()));
                    scene_mesh.joints = (0..skin.joints().count() as u32).collect();
                }
                meshes.push(scene_mesh);
            }
            if meshes.len() == 1 {
                if let Some(scene_node) = graph.node_mut(id) {
                    scene_node.mesh = meshes.pop();
                }
            } else {
                for (index, scene_mesh) in meshes.into_iter().enumerate() {
                    graph.add_child(id, Node::with_mesh(format!("{name}_{index}"), scene_mesh));
                }
            }
        }
        id
    };

    while let Some((node, parent)) = queue.pop_front() {
        if slots[node.index()].is_some() {
            continue;
        }
        let id = attach(&mut graph, &node, parent);
        slots[node.index()] = Some(id);
        queue.extend(node.children().map(|child| (child, id)));
    }
    // nodes outside the scene stay addressable for animation targets
    for node in document.nodes() {
        if slots[node.index()].is_none() {
            let id = attach(&mut graph, &node, root);
            if let Some(scene_node) = graph.node_mut(id) {
                scene_node.invisible = true;
            }
            slots[node.index()] = Some(id);
        }
    }
    let nodes: Vec<NodeId> = slots.into_iter().map(|slot| slot.unwrap_or(root)).collect();

    let skeletons = document
        .skins()
        .map(|skin| read_skeleton(&skin, buffers, &nodes, &graph))
        .collect();
    let clips = document
        .animations()
        .map(|animation| read_clip(&animation, buffers))
        .collect();

    Ok(ParsedAsset {
        graph,
        nodes,
        skeletons,
        clips,
        materials,
        textures,
        mesh_count: document.meshes().count(),
    })
}

fn load_textures(document: &::gltf::Document, buffers: &[Vec<u8>], flip_y: bool) -> Vec<Texture> {
    document
        .textures()
        .map(|texture| {
            let image = texture.source();
            let name = image
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("image_{}", image.index()));
            let source = match image.source() {
                ::gltf::image::Source::Uri { uri, .. } => ImageSource::Uri(uri.to_string()),
                ::gltf::image::Source::View { view, mime_type } => {
                    let start = view.offset();
                    let bytes = buffers
                        .get(view.buffer().index())
                        .and_then(|buffer| buffer.get(start..start + view.length()))
                        .unwrap_or_default();
                    ImageSource::Embedded {
                        name,
                        mime_type: mime_type.to_string(),
                        bytes: Arc::from(bytes),
                    }
                }
            };
            let mut texture = Texture::pending(source);
            texture.flip_y = flip_y;
            texture
        })
        .collect()
}

fn convert_material(material: &::gltf::Material, options: &LoadOptions, texture_count: usize) -> Material {
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material_{}", material.index().unwrap_or_default()));
    let texture = |info: Option<::gltf::texture::Info>| {
        info.map(|info| info.texture().index())
            .filter(|index| *index < texture_count)
            .map(TextureId)
    };

    let mut result = match material.pbr_specular_glossiness() {
        Some(spec_gloss) => {
            let mut result = Material::new(name);
            let [r, g, b, a] = spec_gloss.diffuse_factor();
            result.color = Vec3::new(r, g, b);
            result.alpha = a;
            result.specular_color = Vec3::from_array(spec_gloss.specular_factor());
            result.glossiness = spec_gloss.glossiness_factor();
            result.set_texture(TextureSlot::Diffuse, texture(spec_gloss.diffuse_texture()));
            let packed = texture(spec_gloss.specular_glossiness_texture());
            result.set_texture(TextureSlot::Specular, packed);
            result.set_texture(TextureSlot::Glossiness, packed);
            result
        }
        None => {
            let pbr = material.pbr_metallic_roughness();
            let mut result = Material::metallic_roughness(name);
            let [r, g, b, a] = pbr.base_color_factor();
            result.color = Vec3::new(r, g, b);
            result.alpha = a;
            result.metalness = pbr.metallic_factor();
            result.roughness = pbr.roughness_factor();
            result.set_texture(TextureSlot::Diffuse, texture(pbr.base_color_texture()));
            let packed = texture(pbr.metallic_roughness_texture());
            result.set_texture(TextureSlot::Metalness, packed);
            result.set_texture(TextureSlot::Roughness, packed);
            result
        }
    };

    result.shader = options.shader;
    result.emission = Vec3::from_array(material.emissive_factor());
    if let Some(normal) = material.normal_texture() {
        let index = normal.texture().index();
        result.set_texture(TextureSlot::Normal, (index < texture_count).then_some(TextureId(index)));
    }
    result.set_texture(TextureSlot::Emissive, texture(material.emissive_texture()));
    match material.alpha_mode() {
        AlphaMode::Blend => {
            result.transparent = true;
            result.depth_write = false;
        }
        AlphaMode::Mask => {
            result.define(ShaderDefine::AlphaTest);
            result.alpha_cutoff = material.alpha_cutoff().unwrap_or(0.5);
        }
        AlphaMode::Opaque => {}
    }
    result.set_defined(ShaderDefine::DoubleSided, material.double_sided());
    result
}

fn read_geometry(primitive: &::gltf::Primitive, buffers: &[Vec<u8>]) -> Option<Geometry> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let indices: Option<Vec<u32>> = reader.read_indices().map(|read| read.into_u32().collect());
    let count = positions.len();
    if let Some(bad) = indices.iter().flatten().find(|&&index| index as usize >= count) {
        log::warn!("Primitive index {bad} out of range for {count} vertices");
        return None;
    }
    let mut geometry = Geometry::new(positions, indices);
    let matching = |len: usize| len == count;

    if let Some(normals) = reader.read_normals() {
        geometry.normals = normals.collect();
    }
    if let Some(uvs) = reader.read_tex_coords(0) {
        geometry.uvs = uvs.into_f32().collect();
    }
    geometry.tangents = reader.read_tangents().map(|tangents| tangents.collect());
    if let Some(joints) = reader.read_joints(0) {
        geometry.joints = joints.into_u16().collect();
    }
    if let Some(weights) = reader.read_weights(0) {
        geometry.weights = weights.into_f32().collect();
    }

    if !matching(geometry.normals.len()) {
        geometry.normals.clear();
    }
    if !matching(geometry.uvs.len()) {
        geometry.uvs.clear();
    }
    if !matching(geometry.joints.len()) || !matching(geometry.weights.len()) {
        geometry.joints.clear();
        geometry.weights.clear();
    }
    Some(geometry)
}

fn read_skeleton(skin: &::gltf::Skin, buffers: &[Vec<u8>], nodes: &[NodeId], graph: &NodeGraph) -> Skeleton {
    let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let inverse_binds: Vec<Mat4> = reader
        .read_inverse_bind_matrices()
        .map(|matrices| matrices.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_default();
    let joints = skin
        .joints()
        .enumerate()
        .filter_map(|(index, joint)| {
            let node = *nodes.get(joint.index())?;
            Some(Joint {
                name: graph.node(node).map(|n| n.name.clone()).unwrap_or_default(),
                node,
                inverse_bind: inverse_binds.get(index).copied().unwrap_or(Mat4::IDENTITY),
            })
        })
        .collect();
    let name = skin
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("skin_{}", skin.index()));
    Skeleton::new(name, joints)
}

fn read_clip(animation: &::gltf::Animation, buffers: &[Vec<u8>]) -> AnimationClip {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));
    let mut tracks: BTreeMap<usize, Track> = BTreeMap::new();

    for channel in animation.channels() {
        let target = channel.target().node().index();
        let interpolation = match channel.sampler().interpolation() {
            GltfInterpolation::Linear => Interpolation::Linear,
            GltfInterpolation::Step => Interpolation::Step,
            GltfInterpolation::CubicSpline => {
                log::warn!("Clip {name} uses cubic spline interpolation on node {target}; channel skipped");
                continue;
            }
        };
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        let Some(outputs) = reader.read_outputs() else {
            continue;
        };
        let track = tracks.entry(target).or_insert_with(|| Track::new(target));
        match (channel.target().property(), outputs) {
            (Property::Translation, ReadOutputs::Translations(values)) => {
                let values = values.map(Vec3::from_array).collect();
                track.translation = Some(Keyframes::new(times, values, interpolation));
            }
            (Property::Rotation, ReadOutputs::Rotations(values)) => {
                let values = values.into_f32().map(Quat::from_array).collect();
                track.rotation = Some(Keyframes::new(times, values, interpolation));
            }
            (Property::Scale, ReadOutputs::Scales(values)) => {
                let values = values.map(Vec3::from_array).collect();
                track.scale = Some(Keyframes::new(times, values, interpolation));
            }
            _ => log::debug!("Clip {name}: morph target weights are not animated"),
        }
    }
    AnimationClip::new(name, tracks.into_values().collect())
}
