//! Layout engine: turns a document and a selection into pixel geometry.
//!
//! Geometry is a pure function of the document, the selection, the
//! configuration and the font used to measure text.

mod grid;

pub use grid::{compute_geometry, pixel_width};

use serde::{Deserialize, Serialize};

use crate::error::{Result, XlsnapError};

/// Measures rendered text width.
///
/// Implemented by the renderer's font face; tests use fixed-advance
/// measurers so widths are known exactly.
pub trait TextMeasure {
    /// Width in pixels of `text` drawn at `font_size` pixels.
    fn text_width(&self, text: &str, font_size: f32) -> f32;
}

/// Pixel sizes used by the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Uniform column width used unless content forces widening
    pub column_width: u32,
    pub min_column_width: u32,
    pub max_column_width: u32,
    pub row_height: u32,
    pub header_height: u32,
    pub footer_height: u32,
    /// Applied on the left and right of the table
    pub margin: u32,
    /// Applied on both sides of cell text
    pub cell_padding: u32,
    pub font_size: f32,
    pub max_image_width: u32,
    pub max_image_height: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_width: 120,
            min_column_width: 40,
            max_column_width: 360,
            row_height: 28,
            header_height: 72,
            footer_height: 36,
            margin: 24,
            cell_padding: 8,
            font_size: 15.0,
            max_image_width: 4096,
            max_image_height: 16384,
        }
    }
}

impl LayoutConfig {
    /// Check that the sizes are consistent.
    pub fn validate(&self) -> Result<()> {
        if self.min_column_width > self.column_width || self.column_width > self.max_column_width {
            return Err(XlsnapError::InvalidConfig(format!(
                "column widths must satisfy min <= uniform <= max, got {} <= {} <= {}",
                self.min_column_width, self.column_width, self.max_column_width
            )));
        }
        if self.min_column_width == 0 {
            return Err(XlsnapError::InvalidConfig(
                "min_column_width must be positive".to_string(),
            ));
        }
        if self.row_height == 0 || self.header_height == 0 || self.footer_height == 0 {
            return Err(XlsnapError::InvalidConfig(
                "row, header and footer heights must be positive".to_string(),
            ));
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(XlsnapError::InvalidConfig(format!(
                "font_size must be positive, got {}",
                self.font_size
            )));
        }
        if self.max_image_width == 0 || self.max_image_height == 0 {
            return Err(XlsnapError::InvalidConfig(
                "image size limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_column_bounds_rejected() {
        let config = LayoutConfig {
            min_column_width: 200,
            ..LayoutConfig::default()
        };
        assert!(matches!(config.validate(), Err(XlsnapError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_row_height_rejected() {
        let config = LayoutConfig {
            row_height: 0,
            ..LayoutConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
