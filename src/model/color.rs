//! Colour spaces and colour values tracked by the content engine.

use lopdf::Object;
use serde::{Deserialize, Serialize};

/// A colour space as far as text recolouring is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Pattern,
    /// Any other family (ICCBased, Separation, Indexed, ...), by name
    Other(String),
}

impl ColorSpace {
    /// Map a colour space family name.
    ///
    /// Only the device families map to device spaces; CIE-based spaces such
    /// as `CalRGB` stay [`ColorSpace::Other`].
    pub fn from_name(name: &[u8]) -> Self {
        match name {
            b"DeviceGray" | b"G" => ColorSpace::DeviceGray,
            b"DeviceRGB" | b"RGB" => ColorSpace::DeviceRgb,
            b"DeviceCMYK" | b"CMYK" => ColorSpace::DeviceCmyk,
            b"Pattern" => ColorSpace::Pattern,
            other => ColorSpace::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }

    /// Number of components for a fresh colour in this space.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRgb => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::Pattern => 0,
            ColorSpace::Other(_) => 1,
        }
    }

    /// The initial colour of this space: black for device spaces.
    pub fn initial_color(&self) -> Color {
        let components = match self {
            ColorSpace::DeviceCmyk => vec![0.0, 0.0, 0.0, 1.0],
            other => vec![0.0; other.components()],
        };
        Color {
            space: self.clone(),
            components,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
            ColorSpace::DeviceCmyk => "DeviceCMYK",
            ColorSpace::Pattern => "Pattern",
            ColorSpace::Other(name) => name,
        }
    }
}

/// A colour: its space and component values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub space: ColorSpace,
    pub components: Vec<f32>,
}

impl Default for Color {
    fn default() -> Self {
        ColorSpace::DeviceGray.initial_color()
    }
}

impl Color {
    pub fn gray(g: f32) -> Self {
        Self {
            space: ColorSpace::DeviceGray,
            components: vec![g],
        }
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            space: ColorSpace::DeviceRgb,
            components: vec![r, g, b],
        }
    }

    pub fn cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self {
            space: ColorSpace::DeviceCmyk,
            components: vec![c, m, y, k],
        }
    }

    /// Whether the colour reads as black.
    ///
    /// CMYK is black when cyan, magenta and yellow are all above 0.9 or when
    /// key is above 0.9. Gray and RGB are black below 0.1 in every channel.
    /// Colours in any other space never count as black.
    pub fn is_black(&self) -> bool {
        let c = &self.components;
        match self.space {
            ColorSpace::DeviceCmyk if c.len() >= 4 => {
                (c[0] > 0.9 && c[1] > 0.9 && c[2] > 0.9) || c[3] > 0.9
            }
            ColorSpace::DeviceGray if !c.is_empty() => c[0] < 0.1,
            ColorSpace::DeviceRgb if c.len() >= 3 => c[0] < 0.1 && c[1] < 0.1 && c[2] < 0.1,
            _ => false,
        }
    }

    /// The non-stroking operator that re-establishes this colour, if the
    /// space has a dedicated one.
    pub fn fill_operator(&self) -> Option<&'static str> {
        match self.space {
            ColorSpace::DeviceCmyk => Some("k"),
            ColorSpace::DeviceGray => Some("g"),
            ColorSpace::DeviceRgb => Some("rg"),
            _ => None,
        }
    }

    pub fn operands(&self) -> Vec<Object> {
        self.components.iter().map(|&v| Object::Real(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_black_cmyk() {
        assert!(Color::cmyk(0.0, 0.0, 0.0, 1.0).is_black());
        assert!(Color::cmyk(0.95, 0.95, 0.95, 0.0).is_black());
        assert!(!Color::cmyk(0.95, 0.95, 0.5, 0.5).is_black());
        assert!(!Color::cmyk(0.0, 1.0, 1.0, 0.0).is_black());
    }

    #[test]
    fn test_is_black_gray_and_rgb() {
        assert!(Color::gray(0.05).is_black());
        assert!(!Color::gray(0.5).is_black());
        assert!(Color::rgb(0.0, 0.05, 0.09).is_black());
        assert!(!Color::rgb(1.0, 0.0, 0.0).is_black());
    }

    #[test]
    fn test_other_spaces_never_black() {
        let color = Color {
            space: ColorSpace::Other("ICCBased".to_string()),
            components: vec![0.0],
        };
        assert!(!color.is_black());
        assert_eq!(color.fill_operator(), None);
    }

    #[test]
    fn test_initial_colors_are_black() {
        assert!(ColorSpace::DeviceGray.initial_color().is_black());
        assert!(ColorSpace::DeviceRgb.initial_color().is_black());
        assert!(ColorSpace::DeviceCmyk.initial_color().is_black());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ColorSpace::from_name(b"DeviceRGB"), ColorSpace::DeviceRgb);
        assert_eq!(ColorSpace::from_name(b"CMYK"), ColorSpace::DeviceCmyk);
        assert_eq!(
            ColorSpace::from_name(b"Separation"),
            ColorSpace::Other("Separation".to_string())
        );
        assert_eq!(ColorSpace::from_name(b"CalRGB"), ColorSpace::Other("CalRGB".to_string()));
        assert_eq!(ColorSpace::from_name(b"CalGray"), ColorSpace::Other("CalGray".to_string()));
    }
}
