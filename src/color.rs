use glam::Vec3;
use thiserror::Error;

/// An RGB color with each channel stored as a float in the range [0, 1].
///
/// Colors are exchanged with the light panel and the color picker as 24-bit
/// hex strings (`#rrggbb`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color(pub Vec3);

impl Color {
    pub const WHITE: Color = Color(Vec3::ONE);
    pub const BLACK: Color = Color(Vec3::ZERO);

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self(Vec3::new(r, g, b))
    }

    /// Create a color from a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        Self::new(
            ((hex >> 16) & 0xff) as f32 / 255.0,
            ((hex >> 8) & 0xff) as f32 / 255.0,
            (hex & 0xff) as f32 / 255.0,
        )
    }

    /// Parse a `#rrggbb` (or `rrggbb`) string.
    pub fn from_hex_str(text: &str) -> Result<Self, ColorParseError> {
        let digits = text.trim().trim_start_matches('#');

        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError(text.to_string()));
        }

        u32::from_str_radix(digits, 16)
            .map(Self::from_hex)
            .map_err(|_| ColorParseError(text.to_string()))
    }

    /// Pack this color into a `0xRRGGBB` value. Channels are clamped first.
    pub fn to_hex(&self) -> u32 {
        let c = self.0.clamp(Vec3::ZERO, Vec3::ONE);
        let r = (c.x * 255.0).round() as u32;
        let g = (c.y * 255.0).round() as u32;
        let b = (c.z * 255.0).round() as u32;
        (r << 16) | (g << 8) | b
    }

    /// Format this color as a lowercase `#rrggbb` string.
    pub fn to_hex_string(&self) -> String {
        format!("#{:06x}", self.to_hex())
    }

    /// Create a color from hue, saturation and lightness, each in [0, 1]. Hue
    /// wraps around.
    pub fn from_hsl(h: f32, s: f32, l: f32) -> Self {
        let h = h.rem_euclid(1.0);
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);

        if s == 0.0 {
            return Self::new(l, l, l);
        }

        let q = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;

        Self::new(
            hue_to_rgb(p, q, h + 1.0 / 3.0),
            hue_to_rgb(p, q, h),
            hue_to_rgb(p, q, h - 1.0 / 3.0),
        )
    }

    pub fn r(&self) -> f32 {
        self.0.x
    }

    pub fn g(&self) -> f32 {
        self.0.y
    }

    pub fn b(&self) -> f32 {
        self.0.z
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<Color> for Vec3 {
    fn from(val: Color) -> Self {
        val.0
    }
}

fn hue_to_rgb(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * 6.0 * (2.0 / 3.0 - t)
    } else {
        p
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("'{0}' is not a #rrggbb hex color")]
pub struct ColorParseError(pub String);

/// Returns black or white, whichever reads better on top of `hex`.
///
/// Unparseable input is treated as black, which yields white text.
pub fn contrast_color(hex: &str) -> &'static str {
    let color = Color::from_hex_str(hex).unwrap_or(Color::BLACK);
    let luminance = 0.299 * color.r() + 0.587 * color.g() + 0.114 * color.b();

    if luminance > 0.5 {
        "#000000"
    } else {
        "#ffffff"
    }
}

/// A named accent color offered by the color picker.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColorOption {
    pub name: &'static str,
    pub hex: &'static str,
}

/// Accent color applied to the navbar meshes until the visitor picks another.
pub const DEFAULT_ACCENT: &str = "#66ccff";

pub const COLOR_OPTIONS: &[ColorOption] = &[
    ColorOption { name: "Bleu clair", hex: "#66ccff" },
    ColorOption { name: "Rouge", hex: "#ff6666" },
    ColorOption { name: "Vert", hex: "#66ff66" },
    ColorOption { name: "Jaune", hex: "#ffcc00" },
    ColorOption { name: "Violet", hex: "#cc66ff" },
    ColorOption { name: "Cyan", hex: "#00ffff" },
    ColorOption { name: "Orange", hex: "#ff9966" },
    ColorOption { name: "Rose", hex: "#ff66cc" },
    ColorOption { name: "Vert lime", hex: "#99ff66" },
    ColorOption { name: "Bleu", hex: "#6666ff" },
    ColorOption { name: "Saumon", hex: "#ff6699" },
    ColorOption { name: "Turquoise", hex: "#66ffcc" },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_hex() {
        let c = Color::from_hex_str("#66CCff").unwrap();
        assert_eq!("#66ccff", c.to_hex_string());
        assert_eq!(0x66ccff, c.to_hex());

        let c = Color::from_hex_str("ff44aa").unwrap();
        assert_eq!("#ff44aa", c.to_hex_string());
    }

    #[test]
    fn reject_malformed_hex() {
        assert!(Color::from_hex_str("#fff").is_err());
        assert!(Color::from_hex_str("#gg0000").is_err());
        assert!(Color::from_hex_str("").is_err());
        assert_eq!(
            ColorParseError("blue".to_string()),
            Color::from_hex_str("blue").unwrap_err()
        );
    }

    #[test]
    fn hsl_primaries() {
        assert_eq!("#ff0000", Color::from_hsl(0.0, 1.0, 0.5).to_hex_string());
        assert_eq!("#00ff00", Color::from_hsl(1.0 / 3.0, 1.0, 0.5).to_hex_string());
        assert_eq!("#0000ff", Color::from_hsl(2.0 / 3.0, 1.0, 0.5).to_hex_string());
        assert_eq!("#808080", Color::from_hsl(0.7, 0.0, 0.5).to_hex_string());
        // Hue wraps.
        assert_eq!(
            Color::from_hsl(0.25, 0.6, 0.4).to_hex(),
            Color::from_hsl(1.25, 0.6, 0.4).to_hex()
        );
    }

    #[test]
    fn contrast_picks_readable_text() {
        assert_eq!("#000000", contrast_color("#ffffff"));
        assert_eq!("#000000", contrast_color("#ffcc00"));
        assert_eq!("#ffffff", contrast_color("#000000"));
        assert_eq!("#ffffff", contrast_color("#6666ff"));
        assert_eq!("#ffffff", contrast_color("nonsense"));
    }

    #[test]
    fn palette_entries_are_valid_colors() {
        assert!(COLOR_OPTIONS.iter().any(|o| o.hex == DEFAULT_ACCENT));
        for option in COLOR_OPTIONS {
            assert!(Color::from_hex_str(option.hex).is_ok(), "{}", option.name);
        }
    }
}
