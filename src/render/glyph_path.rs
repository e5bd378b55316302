//! Glyph outlines as tiny-skia paths.
//!
//! Outlines are recorded in font design units (y-up); [`glyph_transform`]
//! maps them to device pixels.

use tiny_skia::{Path, PathBuilder, Transform};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

/// Collects `ttf_parser` outline commands into a tiny-skia path.
pub struct GlyphOutlineBuilder {
    builder: PathBuilder,
}

impl GlyphOutlineBuilder {
    pub fn new() -> Self {
        Self {
            builder: PathBuilder::new(),
        }
    }

    /// The completed path, or `None` for an empty outline.
    pub fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl Default for GlyphOutlineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineBuilder for GlyphOutlineBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Outline of a glyph; `None` for glyphs without contours (spaces).
pub fn build_glyph_path(face: &Face<'_>, glyph: GlyphId) -> Option<Path> {
    let mut builder = GlyphOutlineBuilder::new();
    face.outline_glyph(glyph, &mut builder)?;
    builder.finish()
}

/// Map design units to pixels with the pen at (`x`, `baseline`).
///
/// Flips the Y axis to match tiny-skia's y-down coordinates.
#[inline]
pub fn glyph_transform(scale: f32, x: f32, baseline: f32) -> Transform {
    Transform::from_row(scale, 0.0, 0.0, -scale, x, baseline)
}
