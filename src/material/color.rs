use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Color as written in a material config: a CSS-style string or 3/4
/// float components in 0..1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Css(String),
    Components(Vec<f32>),
}

impl ColorValue {
    pub fn to_rgb(&self) -> Option<Vec3> {
        match self {
            ColorValue::Css(text) => parse_color(text),
            ColorValue::Components(values) if values.len() == 3 || values.len() == 4 => {
                Some(Vec3::new(values[0], values[1], values[2]))
            }
            ColorValue::Components(_) => None,
        }
    }
}

impl From<&str> for ColorValue {
    fn from(text: &str) -> Self {
        ColorValue::Css(text.to_string())
    }
}

/// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)` or `rgba(r, g, b, a)` with
/// 0..255 channels.
pub fn parse_color(text: &str) -> Option<Vec3> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = text.to_ascii_lowercase();
    let body = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let channels: Vec<f32> = body
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    if channels.len() != 3 && channels.len() != 4 {
        return None;
    }
    Some(Vec3::new(channels[0], channels[1], channels[2]).clamp(Vec3::ZERO, Vec3::splat(255.0)) / 255.0)
}

fn parse_hex(hex: &str) -> Option<Vec3> {
    let digits: Vec<u32> = hex.chars().map(|c| c.to_digit(16)).collect::<Option<_>>()?;
    let channels = match digits.as_slice() {
        [r, g, b] => [r * 17, g * 17, b * 17],
        [r1, r0, g1, g0, b1, b0] => [r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0],
        _ => return None,
    };
    Some(Vec3::new(channels[0] as f32, channels[1] as f32, channels[2] as f32) / 255.0)
}

pub fn stringify_color(color: Vec3) -> String {
    let [r, g, b] = color
        .clamp(Vec3::ZERO, Vec3::ONE)
        .to_array()
        .map(|c| (c * 255.0).round() as u8);
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_css_forms() {
        assert_eq!(parse_color("#ff0000"), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(parse_color("#0f0"), Some(Vec3::new(0.0, 1.0, 0.0)));
        assert_eq!(parse_color("rgb(0, 0, 255)"), Some(Vec3::new(0.0, 0.0, 1.0)));
        assert_eq!(parse_color("rgba(255,255,255,0.5)"), Some(Vec3::ONE));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("red"), None);
    }

    #[test]
    fn stringify_is_lowercase_hex() {
        assert_eq!(stringify_color(Vec3::new(1.0, 0.5, 0.0)), "#ff8000");
    }

    #[test]
    fn deserializes_strings_and_arrays() {
        let css: ColorValue = serde_json::from_str("\"#fff\"").unwrap();
        assert_eq!(css.to_rgb(), Some(Vec3::ONE));
        let rgb: ColorValue = serde_json::from_str("[0.5, 0.25, 1]").unwrap();
        assert_eq!(rgb.to_rgb(), Some(Vec3::new(0.5, 0.25, 1.0)));
        let short: ColorValue = serde_json::from_str("[1, 1]").unwrap();
        assert_eq!(short.to_rgb(), None);
    }
}
