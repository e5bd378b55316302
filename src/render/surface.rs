//! Drawing surface owned by a single render.

use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use super::colors::Rgb;
use super::font::FontFace;
use super::glyph_path::{build_glyph_path, glyph_transform};
use crate::error::{Result, XlsnapError};

/// Horizontal offset of the second pass used for synthetic bold.
const FAUX_BOLD_OFFSET: f32 = 0.6;

/// Font weight for [`Surface::draw_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    Regular,
    Bold,
}

impl Weight {
    /// How far ink extends past the pen advance of the last glyph.
    pub fn overhang(self) -> f32 {
        match self {
            Weight::Regular => 0.0,
            Weight::Bold => FAUX_BOLD_OFFSET,
        }
    }
}

/// How a run of text is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Rgb,
    pub weight: Weight,
}

/// A raster canvas. Never shared between renders.
pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            XlsnapError::InvalidConfig(format!("cannot allocate a {width}x{height} canvas"))
        })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn clear(&mut self, color: Rgb) {
        self.pixmap.fill(color.to_color());
    }

    /// Fill an axis-aligned rectangle. Degenerate rectangles are skipped.
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        let Some(rect) = Rect::from_xywh(x, y, width, height) else {
            return;
        };
        let paint = solid(color, false);
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    /// One-pixel line between two points, snapped to pixel centers.
    pub fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgb) {
        let mut pb = PathBuilder::new();
        pb.move_to(from.0.floor() + 0.5, from.1.floor() + 0.5);
        pb.line_to(to.0.floor() + 0.5, to.1.floor() + 0.5);
        let Some(path) = pb.finish() else {
            return;
        };
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        let paint = solid(color, false);
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Draw a single line of text with the pen starting at (`x`, `baseline`).
    pub fn draw_text(
        &mut self,
        font: &FontFace,
        text: &str,
        x: f32,
        baseline: f32,
        style: TextStyle,
    ) {
        let face = font.face();
        let scale = font.scale(style.font_size);
        let paint = solid(style.color, true);
        let passes: &[f32] = match style.weight {
            Weight::Regular => &[0.0],
            Weight::Bold => &[0.0, FAUX_BOLD_OFFSET],
        };

        let mut pen = x;
        for ch in text.chars() {
            let glyph = font.glyph(ch);
            if let Some(path) = build_glyph_path(face, glyph) {
                for offset in passes {
                    let transform = glyph_transform(scale, pen + offset, baseline);
                    self.pixmap
                        .fill_path(&path, &paint, FillRule::Winding, transform, None);
                }
            }
            pen += font.advance(glyph) * scale;
        }
    }
}

fn solid(color: Rgb, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_color());
    paint.anti_alias = anti_alias;
    paint
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
mod tests {
    use super::*;
    use crate::layout::TextMeasure;
    use crate::render::colors::palette;

    fn pixel(surface: &Surface, x: u32, y: u32) -> (u8, u8, u8) {
        let px = surface.pixmap().pixel(x, y).unwrap().demultiply();
        (px.red(), px.green(), px.blue())
    }

    #[test]
    fn test_zero_sized_surface_rejected() {
        assert!(Surface::new(0, 10).is_err());
    }

    #[test]
    fn test_fill_rect_paints_area() {
        let mut s = Surface::new(20, 20).unwrap();
        s.clear(palette::WHITE);
        s.fill_rect(5.0, 5.0, 10.0, 10.0, Rgb::new(255, 0, 0));
        assert_eq!(pixel(&s, 10, 10), (255, 0, 0));
        assert_eq!(pixel(&s, 1, 1), (255, 255, 255));
    }

    #[test]
    fn test_text_leaves_ink() {
        let font = FontFace::bundled().unwrap();
        let mut s = Surface::new(80, 30).unwrap();
        s.clear(palette::WHITE);
        let style = TextStyle {
            font_size: 15.0,
            color: palette::TEXT,
            weight: Weight::Bold,
        };
        s.draw_text(&font, "Bench", 2.0, 20.0, style);
        let inked = s
            .pixmap()
            .pixels()
            .iter()
            .filter(|px| px.demultiply().red() < 128)
            .count();
        assert!(inked > 20);
    }

    #[test]
    fn test_bold_ink_stays_within_overhang() {
        let font = FontFace::bundled().unwrap();
        let style = TextStyle {
            font_size: 15.0,
            color: palette::TEXT,
            weight: Weight::Bold,
        };
        let width = font.text_width("HH", 15.0) + Weight::Bold.overhang();
        let mut s = Surface::new(60, 30).unwrap();
        s.clear(palette::WHITE);
        s.draw_text(&font, "HH", 2.0, 20.0, style);
        let right_edge = (2.0 + width).ceil() as u32;
        for y in 0..30 {
            for x in right_edge + 1..60 {
                assert_eq!(pixel(&s, x, y), (255, 255, 255), "ink at {x},{y}");
            }
        }
        assert_eq!(Weight::Regular.overhang(), 0.0);
    }
}
