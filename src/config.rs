use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Construction-time settings of a viewer. Every field has a default, so a
/// config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub picking: bool,
    pub device_pixel_ratio: f32,
    /// Largest model extent after auto-fit.
    pub fit_size: f32,
    pub accumulation_debounce_ms: u64,
    /// Pointer travel in pixels at which a click becomes a drag.
    pub drag_threshold: f32,
    pub texture_decodes_per_frame: usize,
    pub camera: CameraConfig,
    pub ground: GroundConfig,
    pub post_effect: PostEffectConfig,
    pub main_light: LightConfig,
    pub secondary_light: LightConfig,
    pub tertiary_light: LightConfig,
    pub ambient_light: AmbientLightConfig,
    pub environment: Option<EnvironmentConfig>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            picking: false,
            device_pixel_ratio: 1.0,
            fit_size: 10.0,
            accumulation_debounce_ms: 50,
            drag_threshold: 5.0,
            texture_decodes_per_frame: 4,
            camera: CameraConfig::default(),
            ground: GroundConfig::default(),
            post_effect: PostEffectConfig::default(),
            main_light: LightConfig {
                intensity: 0.8,
                shadow: true,
                ..LightConfig::default()
            },
            secondary_light: LightConfig {
                intensity: 0.0,
                alpha: 30.0,
                beta: 140.0,
                ..LightConfig::default()
            },
            tertiary_light: LightConfig {
                intensity: 0.0,
                alpha: -30.0,
                beta: 220.0,
                ..LightConfig::default()
            },
            ambient_light: AmbientLightConfig::default(),
            environment: None,
        }
    }
}

/// Orbit camera limits and starting pose. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    pub center: [f32; 3],
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub alpha: f32,
    pub beta: f32,
    pub min_alpha: f32,
    pub max_alpha: f32,
    pub rotate_sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub fov: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0, 0.0],
            distance: 20.0,
            min_distance: 2.0,
            max_distance: 100.0,
            alpha: 0.0,
            beta: 0.0,
            min_alpha: -90.0,
            max_alpha: 90.0,
            rotate_sensitivity: 1.0,
            zoom_sensitivity: 1.0,
            fov: 50.0,
        }
    }
}

/// Partial camera update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraControlUpdate {
    pub center: Option<[f32; 3]>,
    pub distance: Option<f32>,
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub min_alpha: Option<f32>,
    pub max_alpha: Option<f32>,
    pub rotate_sensitivity: Option<f32>,
    pub zoom_sensitivity: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroundConfig {
    pub show: bool,
    pub grid: bool,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            show: true,
            grid: false,
        }
    }
}

/// Partial ground update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroundUpdate {
    pub show: Option<bool>,
    pub grid: Option<bool>,
}

/// Directional light placed by spherical angles around the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightConfig {
    pub intensity: f32,
    pub color: String,
    pub alpha: f32,
    pub beta: f32,
    pub shadow: bool,
    pub shadow_quality: ShadowQuality,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            color: "#fff".to_string(),
            alpha: 45.0,
            beta: 45.0,
            shadow: false,
            shadow_quality: ShadowQuality::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowQuality {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmbientLightConfig {
    pub intensity: f32,
    pub color: String,
}

impl Default for AmbientLightConfig {
    fn default() -> Self {
        Self {
            intensity: 0.2,
            color: "#fff".to_string(),
        }
    }
}

/// Light rig forwarded to the renderer in one piece.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingConfig {
    pub main: LightConfig,
    pub secondary: LightConfig,
    pub tertiary: LightConfig,
    pub ambient: AmbientLightConfig,
}

impl LightingConfig {
    pub fn from_viewer(config: &ViewerConfig) -> Self {
        Self {
            main: config.main_light.clone(),
            secondary: config.secondary_light.clone(),
            tertiary: config.tertiary_light.clone(),
            ambient: config.ambient_light.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnvironmentConfig {
    /// Equirectangular panorama shown as the skybox. `"auto"` uses a flat
    /// gradient.
    pub path: String,
    pub exposure: f32,
    pub diffuse_intensity: f32,
    pub specular_intensity: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            path: "auto".to_string(),
            exposure: 1.0,
            diffuse_intensity: 0.2,
            specular_intensity: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostEffectConfig {
    pub enable: bool,
    /// Shade in linear space and tone-map at the end. Materials sample
    /// their textures with sRGB decoding while this is on.
    pub linear_space: bool,
    pub depth_of_field: DepthOfFieldConfig,
    pub ambient_occlusion: bool,
    /// Samples accumulated for soft shadows and depth of field.
    pub accumulation_samples: u32,
}

impl Default for PostEffectConfig {
    fn default() -> Self {
        Self {
            enable: false,
            linear_space: true,
            depth_of_field: DepthOfFieldConfig::default(),
            ambient_occlusion: false,
            accumulation_samples: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepthOfFieldConfig {
    pub enable: bool,
    pub focal_distance: f32,
    pub fstop: f32,
}

impl Default for DepthOfFieldConfig {
    fn default() -> Self {
        Self {
            enable: false,
            focal_distance: 5.0,
            fstop: 5.6,
        }
    }
}

pub fn save_config_to_file(config: &ViewerConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_config_from_file(path: &Path) -> Result<ViewerConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: ViewerConfig = serde_json::from_str(&json)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: ViewerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.camera.distance, 20.0);
        assert_eq!(config.accumulation_debounce_ms, 50);
    }

    #[test]
    fn partial_keys_override_defaults() {
        let json = r#"{ "picking": true, "camera": { "distance": 8 }, "postEffect": { "depthOfField": { "enable": true } } }"#;
        let config: ViewerConfig = serde_json::from_str(json).unwrap();
        assert!(config.picking);
        assert_eq!(config.camera.distance, 8.0);
        assert_eq!(config.camera.max_distance, 100.0);
        assert!(config.post_effect.depth_of_field.enable);
    }

    #[test]
    fn config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("previz-config-{}.json", std::process::id()));
        let mut config = ViewerConfig::default();
        config.fit_size = 4.0;
        config.environment = Some(EnvironmentConfig::default());
        save_config_to_file(&config, &path).unwrap();
        let loaded = load_config_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config_from_file(Path::new("/nonexistent/previz.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
