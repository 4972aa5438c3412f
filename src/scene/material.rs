use crate::scene::texture::TextureId;
use glam::Vec3;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub(crate) usize);

impl MaterialId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fragment shader feature switches the viewer toggles on materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderDefine {
    UseMetalness,
    AlphaTest,
    DiffuseMapAlphaAlpha,
    DoubleSided,
    SrgbDecode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderPrecision {
    Lowp,
    Mediump,
    #[default]
    Highp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderModel {
    Basic,
    Lambert,
    #[default]
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    Diffuse,
    Normal,
    ParallaxOcclusion,
    Emissive,
    Environment,
    Metalness,
    Roughness,
    Specular,
    Glossiness,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 9] = [
        TextureSlot::Diffuse,
        TextureSlot::Normal,
        TextureSlot::ParallaxOcclusion,
        TextureSlot::Emissive,
        TextureSlot::Environment,
        TextureSlot::Metalness,
        TextureSlot::Roughness,
        TextureSlot::Specular,
        TextureSlot::Glossiness,
    ];

    /// Slots sampled with mesh UVs. These follow the flip-Y setting; the
    /// environment map does not.
    pub const SURFACE: [TextureSlot; 8] = [
        TextureSlot::Diffuse,
        TextureSlot::Normal,
        TextureSlot::ParallaxOcclusion,
        TextureSlot::Emissive,
        TextureSlot::Metalness,
        TextureSlot::Roughness,
        TextureSlot::Specular,
        TextureSlot::Glossiness,
    ];

    /// Metalness and roughness maps are only read by metallic-roughness
    /// materials, specular and glossiness maps only by the other schema.
    pub fn applies_to(self, uses_metalness: bool) -> bool {
        match self {
            TextureSlot::Metalness | TextureSlot::Roughness => uses_metalness,
            TextureSlot::Specular | TextureSlot::Glossiness => !uses_metalness,
            _ => true,
        }
    }

    pub fn uniform_name(self) -> &'static str {
        match self {
            TextureSlot::Diffuse => "diffuseMap",
            TextureSlot::Normal => "normalMap",
            TextureSlot::ParallaxOcclusion => "parallaxOcclusionMap",
            TextureSlot::Emissive => "emissiveMap",
            TextureSlot::Environment => "environmentMap",
            TextureSlot::Metalness => "metalnessMap",
            TextureSlot::Roughness => "roughnessMap",
            TextureSlot::Specular => "specularMap",
            TextureSlot::Glossiness => "glossinessMap",
        }
    }
}

/// Shader parameter bag shared by every mesh that references it.
///
/// Metallic-roughness and specular-glossiness parameters live side by
/// side; [`ShaderDefine::UseMetalness`] selects which set the shader reads.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub shader: ShaderModel,
    pub precision: ShaderPrecision,
    pub transparent: bool,
    pub depth_write: bool,
    pub color: Vec3,
    pub emission: Vec3,
    pub specular_color: Vec3,
    pub alpha: f32,
    pub alpha_cutoff: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub glossiness: f32,
    pub emission_intensity: f32,
    pub uv_repeat: [f32; 2],
    pub parallax_occlusion_scale: f32,
    defines: BTreeSet<ShaderDefine>,
    textures: BTreeMap<TextureSlot, TextureId>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader: ShaderModel::Standard,
            precision: ShaderPrecision::Highp,
            transparent: false,
            depth_write: true,
            color: Vec3::ONE,
            emission: Vec3::ZERO,
            specular_color: Vec3::splat(0.1),
            alpha: 1.0,
            alpha_cutoff: 0.0,
            metalness: 0.0,
            roughness: 0.5,
            glossiness: 0.5,
            emission_intensity: 1.0,
            uv_repeat: [1.0, 1.0],
            parallax_occlusion_scale: 0.01,
            defines: BTreeSet::new(),
            textures: BTreeMap::new(),
        }
    }

    pub fn metallic_roughness(name: impl Into<String>) -> Self {
        let mut material = Self::new(name);
        material.define(ShaderDefine::UseMetalness);
        material
    }

    pub fn define(&mut self, define: ShaderDefine) {
        self.defines.insert(define);
    }

    pub fn undefine(&mut self, define: ShaderDefine) {
        self.defines.remove(&define);
    }

    pub fn set_defined(&mut self, define: ShaderDefine, enabled: bool) {
        if enabled {
            self.define(define);
        } else {
            self.undefine(define);
        }
    }

    pub fn is_defined(&self, define: ShaderDefine) -> bool {
        self.defines.contains(&define)
    }

    pub fn defines(&self) -> impl Iterator<Item = ShaderDefine> + '_ {
        self.defines.iter().copied()
    }

    pub fn uses_metalness(&self) -> bool {
        self.is_defined(ShaderDefine::UseMetalness)
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<TextureId> {
        self.textures.get(&slot).copied()
    }

    pub fn set_texture(&mut self, slot: TextureSlot, texture: Option<TextureId>) {
        match texture {
            Some(texture) => {
                self.textures.insert(slot, texture);
            }
            None => {
                self.textures.remove(&slot);
            }
        }
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureSlot, TextureId)> + '_ {
        self.textures.iter().map(|(slot, id)| (*slot, *id))
    }
}
