//! Partial, name-addressed edits over a model's materials.
//!
//! A [`MaterialConfig`] only touches what it names. Texture keys that are
//! present but empty (`null`, `""`, `"none"`) clear their slot; texture URIs
//! become [`TextureRequest`]s that the asset pipeline decodes and hands
//! back through [`complete_texture_request`].

pub mod color;

pub use color::{parse_color, stringify_color, ColorValue};

use crate::assets::texture_util::{height_to_normal, is_height_image, panorama_to_cube_map};
use crate::scene::{
    ImageSource, MaterialId, Model, ShaderDefine, Texture, TextureData, TextureId, TextureImage,
    TextureSlot,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// A texture key in a material config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureRef {
    Clear,
    Uri(String),
}

impl Serialize for TextureRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TextureRef::Clear => serializer.serialize_str(""),
            TextureRef::Uri(uri) => serializer.serialize_str(uri),
        }
    }
}

// Absent keys never reach this; a present key always yields `Some`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<TextureRef>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(Some(match value {
        serde_json::Value::String(uri) if !uri.is_empty() && !uri.eq_ignore_ascii_case("none") => {
            TextureRef::Uri(uri)
        }
        _ => TextureRef::Clear,
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emission: Option<ColorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specular_color: Option<ColorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metalness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roughness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glossiness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emission_intensity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_repeat: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallax_occlusion_scale: Option<f32>,

    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub diffuse_map: Option<TextureRef>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub normal_map: Option<TextureRef>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub parallax_occlusion_map: Option<TextureRef>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emissive_map: Option<TextureRef>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub environment_map: Option<TextureRef>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub metalness_map: Option<TextureRef>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub roughness_map: Option<TextureRef>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub specular_map: Option<TextureRef>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub glossiness_map: Option<TextureRef>,
}

impl MaterialConfig {
    pub fn texture(&self, slot: TextureSlot) -> Option<&TextureRef> {
        match slot {
            TextureSlot::Diffuse => self.diffuse_map.as_ref(),
            TextureSlot::Normal => self.normal_map.as_ref(),
            TextureSlot::ParallaxOcclusion => self.parallax_occlusion_map.as_ref(),
            TextureSlot::Emissive => self.emissive_map.as_ref(),
            TextureSlot::Environment => self.environment_map.as_ref(),
            TextureSlot::Metalness => self.metalness_map.as_ref(),
            TextureSlot::Roughness => self.roughness_map.as_ref(),
            TextureSlot::Specular => self.specular_map.as_ref(),
            TextureSlot::Glossiness => self.glossiness_map.as_ref(),
        }
    }

    pub fn texture_mut(&mut self, slot: TextureSlot) -> &mut Option<TextureRef> {
        match slot {
            TextureSlot::Diffuse => &mut self.diffuse_map,
            TextureSlot::Normal => &mut self.normal_map,
            TextureSlot::ParallaxOcclusion => &mut self.parallax_occlusion_map,
            TextureSlot::Emissive => &mut self.emissive_map,
            TextureSlot::Environment => &mut self.environment_map,
            TextureSlot::Metalness => &mut self.metalness_map,
            TextureSlot::Roughness => &mut self.roughness_map,
            TextureSlot::Specular => &mut self.specular_map,
            TextureSlot::Glossiness => &mut self.glossiness_map,
        }
    }
}

/// A texture URI waiting to be decoded and assigned to `materials`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRequest {
    pub slot: TextureSlot,
    pub uri: String,
    pub materials: Vec<MaterialId>,
    pub flip_y: bool,
    pub anisotropic: u32,
}

#[derive(Debug, Default)]
pub struct MaterialUpdate {
    pub texture_requests: Vec<TextureRequest>,
    /// Meshes that received generated tangents.
    pub tangents_generated: usize,
}

/// Apply `config` to every material whose name is in `names`. Returns
/// `None` when no material matched.
pub fn set_material(
    model: &mut Model,
    names: &[&str],
    config: &MaterialConfig,
    flip_y: bool,
) -> Option<MaterialUpdate> {
    let mut ids: Vec<MaterialId> = Vec::new();
    for name in names {
        for id in model.materials_named(name) {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
    }
    if ids.is_empty() {
        log::warn!("No material named {}", names.join(", "));
        return None;
    }

    let uses_metalness = model
        .material(ids[0])
        .is_some_and(|material| material.uses_metalness());
    let mut update = MaterialUpdate::default();
    let mut needs_tangents = false;
    for slot in TextureSlot::ALL {
        let Some(texture) = config.texture(slot) else {
            continue;
        };
        if !slot.applies_to(uses_metalness) {
            log::debug!("Ignoring {} outside its material schema", slot.uniform_name());
            continue;
        }
        match texture {
            TextureRef::Clear => {
                for id in &ids {
                    if let Some(material) = model.material_mut(*id) {
                        material.set_texture(slot, None);
                    }
                }
            }
            TextureRef::Uri(uri) => {
                let environment = slot == TextureSlot::Environment;
                needs_tangents |= matches!(slot, TextureSlot::Normal | TextureSlot::ParallaxOcclusion);
                update.texture_requests.push(TextureRequest {
                    slot,
                    uri: uri.clone(),
                    materials: ids.clone(),
                    flip_y: flip_y && !environment,
                    anisotropic: if environment { 1 } else { 8 },
                });
            }
        }
    }

    if needs_tangents {
        for node in model.meshes_using(&ids) {
            let Some(mesh) = model.graph_mut().mesh_mut(node) else {
                continue;
            };
            if mesh.geometry.has_tangents() {
                continue;
            }
            if mesh.geometry.generate_tangents() {
                update.tangents_generated += 1;
            } else {
                log::debug!("Skipping tangents for a mesh without UVs");
            }
        }
    }

    for id in &ids {
        let Some(material) = model.material_mut(*id) else {
            continue;
        };
        if let Some(transparent) = config.transparent {
            material.transparent = transparent;
            material.depth_write = !transparent;
        }
        if let Some(color) = config.color.as_ref().and_then(ColorValue::to_rgb) {
            material.color = color;
        }
        if let Some(emission) = config.emission.as_ref().and_then(ColorValue::to_rgb) {
            material.emission = emission;
        }
        if let Some(specular) = config.specular_color.as_ref().and_then(ColorValue::to_rgb) {
            material.specular_color = specular;
        }
        if let Some(alpha) = config.alpha {
            material.alpha = alpha;
        }
        if let Some(cutoff) = config.alpha_cutoff {
            material.alpha_cutoff = cutoff;
        }
        if let Some(metalness) = config.metalness {
            material.metalness = metalness;
        }
        if let Some(roughness) = config.roughness {
            material.roughness = roughness;
        }
        if let Some(glossiness) = config.glossiness {
            material.glossiness = glossiness;
        }
        if let Some(intensity) = config.emission_intensity {
            material.emission_intensity = intensity;
        }
        if let Some(repeat) = config.uv_repeat {
            material.uv_repeat = repeat;
        }
        if let Some(scale) = config.parallax_occlusion_scale {
            material.parallax_occlusion_scale = scale;
        }
    }
    Some(update)
}

/// Install a decoded texture into the slot `request` targets.
pub fn complete_texture_request(model: &mut Model, request: &TextureRequest, image: TextureImage) {
    let data = match request.slot {
        TextureSlot::Normal if is_height_image(&image.pixels) => {
            let normal = height_to_normal(&image.pixels);
            TextureData::Image(image.derive(normal))
        }
        TextureSlot::Environment => TextureData::Cube(panorama_to_cube_map(&image)),
        _ => TextureData::Image(image),
    };
    let previous = request
        .materials
        .first()
        .and_then(|id| model.material(*id)?.texture(request.slot))
        .filter(|id| bound_only_by(model, *id, request));
    let id = match previous {
        Some(id) => {
            if let Some(texture) = model.texture_mut(id) {
                texture.source = ImageSource::Uri(request.uri.clone());
                texture.flip_y = request.flip_y;
                texture.anisotropic = request.anisotropic;
                texture.set_data(data);
            }
            id
        }
        None => {
            let mut texture = Texture::resident(ImageSource::Uri(request.uri.clone()), data);
            texture.flip_y = request.flip_y;
            texture.anisotropic = request.anisotropic;
            model.add_texture(texture)
        }
    };
    for material in &request.materials {
        if let Some(material) = model.material_mut(*material) {
            material.set_texture(request.slot, Some(id));
        }
    }
}

/// Whether `texture` is referenced only from `request.slot` of the
/// requested materials, so it can be overwritten in place.
fn bound_only_by(model: &Model, texture: TextureId, request: &TextureRequest) -> bool {
    model.materials().iter().enumerate().all(|(index, material)| {
        let targeted = request.materials.contains(&MaterialId(index));
        material
            .textures()
            .all(|(slot, id)| id != texture || (targeted && slot == request.slot))
    })
}

/// Replace grayscale images in normal slots with derived normal maps.
/// Shared textures are converted once.
pub fn convert_bump_to_normal(model: &mut Model) -> usize {
    let normal_maps: BTreeSet<TextureId> = model
        .mapped_materials()
        .filter_map(|id| model.material(id)?.texture(TextureSlot::Normal))
        .collect();
    let mut converted = 0;
    for id in normal_maps {
        let Some(texture) = model.texture_mut(id) else {
            continue;
        };
        if !texture.image().is_some_and(|image| is_height_image(&image.pixels)) {
            continue;
        }
        if let Some(image) = texture.take_image() {
            let normal = height_to_normal(&image.pixels);
            texture.set_data(TextureData::Image(image.derive(normal)));
            converted += 1;
        }
    }
    if converted > 0 {
        log::debug!("Converted {converted} bump maps to normal maps");
    }
    converted
}

/// Toggle sRGB decoding to match the renderer's output space.
pub fn update_srgb(model: &mut Model, linear_space: bool) {
    for index in 0..model.materials().len() {
        if let Some(material) = model.material_mut(MaterialId(index)) {
            material.set_defined(ShaderDefine::SrgbDecode, linear_space);
        }
    }
}

pub fn set_texture_flip_y(model: &mut Model, flip_y: bool) {
    let ids: BTreeSet<TextureId> = model
        .materials()
        .iter()
        .flat_map(|material| {
            TextureSlot::SURFACE
                .into_iter()
                .filter_map(move |slot| material.texture(slot))
        })
        .collect();
    for id in ids {
        if let Some(texture) = model.texture_mut(id) {
            if texture.flip_y != flip_y {
                texture.flip_y = flip_y;
                texture.dirty();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSnapshot {
    pub name: String,
    pub transparent: bool,
    pub color: String,
    pub emission: String,
    pub alpha: f32,
    pub alpha_cutoff: f32,
    pub emission_intensity: f32,
    pub uv_repeat: [f32; 2],
    pub parallax_occlusion_scale: f32,
    pub diffuse_map: String,
    pub normal_map: String,
    pub parallax_occlusion_map: String,
    pub emissive_map: String,
    pub environment_map: String,
    #[serde(flatten)]
    pub schema: MaterialSchema,
}

/// Schema-specific half of a [`MaterialSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MaterialSchema {
    #[serde(rename_all = "camelCase")]
    PbrMetallicRoughness {
        metalness: f32,
        roughness: f32,
        metalness_map: String,
        roughness_map: String,
    },
    #[serde(rename_all = "camelCase")]
    PbrSpecularGlossiness {
        specular_color: String,
        glossiness: f32,
        specular_map: String,
        glossiness_map: String,
    },
}

/// Current parameters of the first material named `name`.
pub fn get_material(model: &Model, name: &str) -> Option<MaterialSnapshot> {
    let Some(material) = model
        .materials_named(name)
        .first()
        .and_then(|id| model.material(*id))
    else {
        log::warn!("No material named {name}");
        return None;
    };
    let uri = |slot: TextureSlot| {
        material
            .texture(slot)
            .and_then(|id| model.texture(id))
            .map(|texture| texture.source_uri().to_string())
            .unwrap_or_default()
    };
    let schema = if material.uses_metalness() {
        MaterialSchema::PbrMetallicRoughness {
            metalness: material.metalness,
            roughness: material.roughness,
            metalness_map: uri(TextureSlot::Metalness),
            roughness_map: uri(TextureSlot::Roughness),
        }
    } else {
        MaterialSchema::PbrSpecularGlossiness {
            specular_color: stringify_color(material.specular_color),
            glossiness: material.glossiness,
            specular_map: uri(TextureSlot::Specular),
            glossiness_map: uri(TextureSlot::Glossiness),
        }
    };
    Some(MaterialSnapshot {
        name: material.name.clone(),
        transparent: material.transparent,
        color: stringify_color(material.color),
        emission: stringify_color(material.emission),
        alpha: material.alpha,
        alpha_cutoff: material.alpha_cutoff,
        emission_intensity: material.emission_intensity,
        uv_repeat: material.uv_repeat,
        parallax_occlusion_scale: material.parallax_occlusion_scale,
        diffuse_map: uri(TextureSlot::Diffuse),
        normal_map: uri(TextureSlot::Normal),
        parallax_occlusion_map: uri(TextureSlot::ParallaxOcclusion),
        emissive_map: uri(TextureSlot::Emissive),
        environment_map: uri(TextureSlot::Environment),
        schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, Material, Mesh, ModelGeneration, Node, NodeGraph};
    use glam::Vec3;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    fn quad() -> Geometry {
        let mut geometry = Geometry::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            Some(vec![0, 1, 2, 0, 2, 3]),
        );
        geometry.uvs = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        geometry
    }

    /// Two meshes using distinct "Body" materials, one using "Eyes".
    fn body_and_eyes() -> Model {
        let mut graph = NodeGraph::new("model");
        let root = graph.root();
        for (name, material) in [("torso", 0), ("legs", 1), ("eyes", 2)] {
            graph.add_child(root, Node::with_mesh(name, Mesh::new(quad(), MaterialId(material))));
        }
        let mut eyes = Material::metallic_roughness("Eyes");
        eyes.color = Vec3::new(0.0, 0.0, 1.0);
        let mut body = Material::new("Body");
        body.color = Vec3::ONE;
        let diffuse = Texture::resident(
            ImageSource::Uri("skin.png".into()),
            TextureData::Image(TextureImage::new("skin.png", Arc::new(RgbaImage::new(1, 1)))),
        );
        let mut model = Model::new(
            ModelGeneration(1),
            graph,
            Vec::new(),
            Vec::new(),
            vec![body.clone(), body, eyes],
            vec![diffuse],
        );
        for id in [0, 1] {
            if let Some(material) = model.material_mut(MaterialId(id)) {
                material.set_texture(TextureSlot::Diffuse, Some(TextureId(0)));
            }
        }
        model
    }

    fn config(json: &str) -> MaterialConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn color_applies_to_every_instance_of_a_name() {
        let mut model = body_and_eyes();
        set_material(&mut model, &["Body"], &config(r##"{ "color": "#ff0000" }"##), false).unwrap();
        assert_eq!(model.materials()[0].color, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(model.materials()[1].color, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(model.materials()[2].color, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn none_clears_and_absent_keys_are_untouched() {
        let mut model = body_and_eyes();
        let before = get_material(&model, "Body").unwrap();
        assert_eq!(before.diffuse_map, "skin.png");

        set_material(&mut model, &["Body"], &config(r#"{ "alpha": 0.5 }"#), false).unwrap();
        let after = get_material(&model, "Body").unwrap();
        assert_eq!(after.diffuse_map, "skin.png");
        assert_eq!(after.color, before.color);
        assert_eq!(after.alpha, 0.5);

        set_material(&mut model, &["Body"], &config(r#"{ "diffuseMap": "none" }"#), false).unwrap();
        assert_eq!(get_material(&model, "Body").unwrap().diffuse_map, "");
    }

    #[test]
    fn falsy_texture_values_all_clear() {
        for value in ["null", "\"\"", "\"none\"", "false"] {
            let parsed = config(&format!(r#"{{ "normalMap": {value} }}"#));
            assert_eq!(parsed.normal_map, Some(TextureRef::Clear), "{value}");
        }
        assert_eq!(config("{}").normal_map, None);
    }

    #[test]
    fn unknown_name_is_a_no_op() {
        let mut model = body_and_eyes();
        assert!(set_material(&mut model, &["Hair"], &config(r#"{ "alpha": 0.1 }"#), false).is_none());
        assert!(model.materials().iter().all(|m| m.alpha == 1.0));
        assert!(get_material(&model, "Hair").is_none());
    }

    #[test]
    fn transparency_toggles_depth_write() {
        let mut model = body_and_eyes();
        set_material(&mut model, &["Eyes"], &config(r#"{ "transparent": true }"#), false).unwrap();
        let eyes = &model.materials()[2];
        assert!(eyes.transparent && !eyes.depth_write);
    }

    #[test]
    fn normal_map_requests_texture_and_generates_tangents_once() {
        let mut model = body_and_eyes();
        let update =
            set_material(&mut model, &["Body"], &config(r#"{ "normalMap": "n.png" }"#), true).unwrap();
        assert_eq!(update.tangents_generated, 2);
        assert_eq!(update.texture_requests.len(), 1);
        let request = &update.texture_requests[0];
        assert_eq!(request.slot, TextureSlot::Normal);
        assert_eq!(request.materials, vec![MaterialId(0), MaterialId(1)]);
        assert!(request.flip_y);

        let again =
            set_material(&mut model, &["Body"], &config(r#"{ "normalMap": "n.png" }"#), true).unwrap();
        assert_eq!(again.tangents_generated, 0);
    }

    #[test]
    fn texture_slots_follow_the_material_schema() {
        let mut model = body_and_eyes();
        let maps = r#"{ "metalnessMap": "m.png", "roughnessMap": "r.png",
                        "specularMap": "s.png", "glossinessMap": "g.png" }"#;

        let update = set_material(&mut model, &["Eyes"], &config(maps), false).unwrap();
        let slots: Vec<_> = update.texture_requests.iter().map(|r| r.slot).collect();
        assert_eq!(slots, vec![TextureSlot::Metalness, TextureSlot::Roughness]);

        let update = set_material(&mut model, &["Body"], &config(maps), false).unwrap();
        let slots: Vec<_> = update.texture_requests.iter().map(|r| r.slot).collect();
        assert_eq!(slots, vec![TextureSlot::Specular, TextureSlot::Glossiness]);

        let update = set_material(&mut model, &["Eyes"], &config(r#"{ "specularMap": "s.png" }"#), false).unwrap();
        assert!(update.texture_requests.is_empty());
    }

    #[test]
    fn slot_names_match_config_keys() {
        for slot in TextureSlot::ALL {
            let parsed = config(&format!(r#"{{ "{}": "x.png" }}"#, slot.uniform_name()));
            assert!(parsed.texture(slot).is_some(), "{slot:?}");
        }
    }

    #[test]
    fn repeated_requests_reuse_the_slot_texture() {
        let mut model = body_and_eyes();
        let request = |materials: Vec<MaterialId>, uri: &str| TextureRequest {
            slot: TextureSlot::Diffuse,
            uri: uri.into(),
            materials,
            flip_y: false,
            anisotropic: 8,
        };
        let image = |uri: &str| TextureImage::new(uri, Arc::new(RgbaImage::new(2, 2)));

        for uri in ["a.png", "b.png", "c.png"] {
            complete_texture_request(&mut model, &request(vec![MaterialId(0), MaterialId(1)], uri), image(uri));
        }
        assert_eq!(model.textures().len(), 1);
        assert_eq!(get_material(&model, "Body").unwrap().diffuse_map, "c.png");

        // the texture is still bound by the other Body, so it is not overwritten
        complete_texture_request(&mut model, &request(vec![MaterialId(0)], "d.png"), image("d.png"));
        assert_eq!(model.textures().len(), 2);
        assert_eq!(model.materials()[1].texture(TextureSlot::Diffuse), Some(TextureId(0)));
        assert_eq!(model.materials()[0].texture(TextureSlot::Diffuse), Some(TextureId(1)));
    }

    #[test]
    fn height_map_in_normal_slot_reports_original_source() {
        let mut model = body_and_eyes();
        let request = TextureRequest {
            slot: TextureSlot::Normal,
            uri: "bump.png".into(),
            materials: vec![MaterialId(0)],
            flip_y: false,
            anisotropic: 8,
        };
        let gray = RgbaImage::from_pixel(4, 4, Rgba([128, 128, 128, 255]));
        complete_texture_request(&mut model, &request, TextureImage::new("bump.png", Arc::new(gray)));
        assert_eq!(get_material(&model, "Body").unwrap().normal_map, "bump.png");
        let id = model.materials()[0].texture(TextureSlot::Normal).unwrap();
        let image = model.texture(id).and_then(Texture::image).unwrap();
        assert!(image.derived_from.is_some());
        assert!(!is_height_image(&image.pixels));
    }

    #[test]
    fn environment_map_becomes_cube() {
        let mut model = body_and_eyes();
        let request = TextureRequest {
            slot: TextureSlot::Environment,
            uri: "sky.png".into(),
            materials: vec![MaterialId(2)],
            flip_y: false,
            anisotropic: 1,
        };
        let sky = RgbaImage::from_pixel(32, 16, Rgba([10, 20, 30, 255]));
        complete_texture_request(&mut model, &request, TextureImage::new("sky.png", Arc::new(sky)));
        let id = model.materials()[2].texture(TextureSlot::Environment).unwrap();
        match model.texture(id).and_then(Texture::data) {
            Some(TextureData::Cube(cube)) => assert_eq!(cube.size, 8),
            other => panic!("expected cube map, got {other:?}"),
        }
        assert_eq!(get_material(&model, "Eyes").unwrap().environment_map, "sky.png");
    }

    #[test]
    fn bump_conversion_runs_once_per_shared_texture() {
        let mut model = body_and_eyes();
        let gray = RgbaImage::from_pixel(2, 2, Rgba([60, 60, 60, 255]));
        let bump = model.add_texture(Texture::resident(
            ImageSource::Uri("bump.png".into()),
            TextureData::Image(TextureImage::new("bump.png", Arc::new(gray))),
        ));
        for id in [0, 1] {
            if let Some(material) = model.material_mut(MaterialId(id)) {
                material.set_texture(TextureSlot::Normal, Some(bump));
            }
        }
        assert_eq!(convert_bump_to_normal(&mut model), 1);
        assert_eq!(convert_bump_to_normal(&mut model), 0);
        assert_eq!(model.texture(bump).unwrap().source_uri(), "bump.png");
    }

    #[test]
    fn snapshot_shape_follows_schema() {
        let model = body_and_eyes();
        let eyes = serde_json::to_value(get_material(&model, "Eyes").unwrap()).unwrap();
        assert_eq!(eyes["type"], "pbrMetallicRoughness");
        assert!(eyes.get("metalnessMap").is_some());
        let body = serde_json::to_value(get_material(&model, "Body").unwrap()).unwrap();
        assert_eq!(body["type"], "pbrSpecularGlossiness");
        assert!(body.get("specularColor").is_some());
    }

    #[test]
    fn flip_y_dirties_surface_textures() {
        let mut model = body_and_eyes();
        let version = model.textures()[0].version();
        set_texture_flip_y(&mut model, true);
        assert!(model.textures()[0].flip_y);
        assert!(model.textures()[0].version() > version);
    }
}
