//! Colors used when drawing a snapshot.

use serde::{Deserialize, Serialize};

/// RGB color with u8 components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse from a hex string (with or without #).
    /// Returns None if the format is invalid.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
        let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
        let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
        Some(Self { r, g, b })
    }

    /// Hex string (#RRGGBB).
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Lighten the color by blending with white.
    /// Factor of 0.0 = no change, 1.0 = pure white.
    pub fn lighten(self, factor: f64) -> Self {
        Self {
            r: Self::blend_component(self.r, 255, factor),
            g: Self::blend_component(self.g, 255, factor),
            b: Self::blend_component(self.b, 255, factor),
        }
    }

    /// Relative luminance (0.0 to 1.0).
    pub fn luminance(self) -> f64 {
        let r = f64::from(self.r);
        let g = f64::from(self.g);
        let b = f64::from(self.b);
        (0.299 * r + 0.587 * g + 0.114 * b) / 255.0
    }

    /// Black or white, whichever reads better on top of this color.
    pub fn contrasting_text(self) -> Self {
        if self.luminance() > 0.5 {
            palette::TEXT
        } else {
            palette::WHITE
        }
    }

    pub fn to_color(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, 255)
    }

    /// The cast is safe because we clamp to [0, 255] before converting.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn blend_component(from: u8, to: u8, factor: f64) -> u8 {
        let factor = factor.clamp(0.0, 1.0);
        let value = f64::from(from) + (f64::from(to) - f64::from(from)) * factor;
        value.round().clamp(0.0, 255.0) as u8
    }
}

/// Fixed colors.
pub mod palette {
    use super::Rgb;

    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);
    pub const TEXT: Rgb = Rgb::new(0x20, 0x21, 0x24);
    pub const MUTED_TEXT: Rgb = Rgb::new(0x5F, 0x63, 0x68);
    pub const GRID_LINE: Rgb = Rgb::new(0xDA, 0xDC, 0xE0);
    pub const ZEBRA: Rgb = Rgb::new(0xF8, 0xF9, 0xFA);
    pub const FOOTER_BG: Rgb = Rgb::new(0xF1, 0xF3, 0xF4);
    pub const ACCENT: Rgb = Rgb::new(0x1A, 0x73, 0xE8);
}

/// Colors for one render, derived from an accent color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb,
    pub header_band: Rgb,
    pub header_text: Rgb,
    pub header_row: Rgb,
    pub header_row_text: Rgb,
    pub body_text: Rgb,
    pub zebra: Rgb,
    pub grid_line: Rgb,
    pub footer_band: Rgb,
    pub footer_text: Rgb,
}

impl Palette {
    pub fn with_accent(accent: Rgb) -> Self {
        let header_row = accent.lighten(0.8);
        Self {
            background: palette::WHITE,
            header_band: accent,
            header_text: accent.contrasting_text(),
            header_row,
            header_row_text: header_row.contrasting_text(),
            body_text: palette::TEXT,
            zebra: palette::ZEBRA,
            grid_line: palette::GRID_LINE,
            footer_band: palette::FOOTER_BG,
            footer_text: palette::MUTED_TEXT,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::with_accent(palette::ACCENT)
    }
}

/// Accent color as configured, in `#RRGGBB` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccentColor(pub String);

impl Default for AccentColor {
    fn default() -> Self {
        Self(palette::ACCENT.to_hex())
    }
}

impl AccentColor {
    pub fn rgb(&self) -> Option<Rgb> {
        Rgb::from_hex(&self.0)
    }
}
