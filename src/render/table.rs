//! Draws the header band, table and footer band onto a surface.

use std::borrow::Cow;

use super::colors::Palette;
use super::font::FontFace;
use super::surface::{Surface, TextStyle, Weight};
use crate::error::Result;
use crate::layout::TextMeasure;
use crate::numfmt::display_text;
use crate::types::{GridGeometry, Selection, TableDocument};

const ELLIPSIS: &str = "\u{2026}";

/// Title text is this much larger than cell text.
const TITLE_SCALE: f32 = 1.4;

/// Text and appearance of one snapshot.
#[derive(Debug, Clone)]
pub struct TableStyle {
    pub title: String,
    pub subtitle: String,
    /// Empty footer text draws only the band
    pub footer: String,
    /// Draw the first selected row as the table header row
    pub first_row_is_header: bool,
    pub font_size: f32,
    pub cell_padding: u32,
    pub palette: Palette,
}

/// Truncate text with an ellipsis so it fits `max_width`.
///
/// Returns the text unchanged when it fits and `None` when not even the
/// ellipsis fits. The cut point is found by measuring prefixes, not by
/// counting characters.
pub fn truncate_text<'a>(
    measure: &dyn TextMeasure,
    text: &'a str,
    font_size: f32,
    max_width: f32,
) -> Option<Cow<'a, str>> {
    if measure.text_width(text, font_size) <= max_width {
        return Some(Cow::Borrowed(text));
    }

    let available = max_width - measure.text_width(ELLIPSIS, font_size);
    if available < 0.0 {
        return None;
    }

    // Binary search for the longest prefix that fits
    let chars: Vec<char> = text.chars().collect();
    let mut low = 0;
    let mut high = chars.len();
    while low < high {
        let mid = (low + high).div_ceil(2);
        let prefix: String = chars.iter().take(mid).collect();
        if measure.text_width(&prefix, font_size) <= available {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    let mut truncated: String = chars.iter().take(low).collect();
    truncated.push_str(ELLIPSIS);
    Some(Cow::Owned(truncated))
}

/// Allocate a surface sized by `geometry` and draw the snapshot into it.
pub fn render_table(
    document: &TableDocument,
    selection: &Selection,
    geometry: &GridGeometry,
    font: &FontFace,
    style: &TableStyle,
) -> Result<Surface> {
    let mut surface = Surface::new(geometry.image_width, geometry.image_height)?;
    surface.clear(style.palette.background);
    draw_header_band(&mut surface, geometry, font, style);
    draw_rows(&mut surface, document, selection, geometry, font, style);
    draw_grid(&mut surface, geometry, style);
    draw_footer_band(&mut surface, geometry, font, style);
    Ok(surface)
}

fn draw_header_band(surface: &mut Surface, geometry: &GridGeometry, font: &FontFace, style: &TableStyle) {
    let width = geometry.image_width as f32;
    let band = geometry.header_height as f32;
    let margin = geometry.table_origin.0 as f32;
    let palette = &style.palette;
    surface.fill_rect(0.0, 0.0, width, band, palette.header_band);

    let max_width = (width - 2.0 * margin).max(0.0);
    let title_size = style.font_size * TITLE_SCALE;
    if style.subtitle.is_empty() {
        let baseline = font.centered_baseline(0.0, band, title_size);
        draw_fitted(surface, font, &style.title, margin, baseline, max_width, TextStyle {
            font_size: title_size,
            color: palette.header_text,
            weight: Weight::Bold,
        });
        return;
    }

    let half = band / 2.0;
    let title_baseline = font.centered_baseline(half * 0.2, half, title_size);
    draw_fitted(surface, font, &style.title, margin, title_baseline, max_width, TextStyle {
        font_size: title_size,
        color: palette.header_text,
        weight: Weight::Bold,
    });
    let subtitle_baseline = font.centered_baseline(half * 0.9, half, style.font_size);
    draw_fitted(surface, font, &style.subtitle, margin, subtitle_baseline, max_width, TextStyle {
        font_size: style.font_size,
        color: palette.header_text,
        weight: Weight::Regular,
    });
}

fn draw_rows(
    surface: &mut Surface,
    document: &TableDocument,
    selection: &Selection,
    geometry: &GridGeometry,
    font: &FontFace,
    style: &TableStyle,
) {
    let palette = &style.palette;
    let padding = style.cell_padding as f32;
    let line = font.ascent(style.font_size) + font.descent(style.font_size);
    let top_inset = ((geometry.row_height as f32 - line) / 2.0).clamp(0.0, padding);
    let table_x = geometry.table_origin.0 as f32;
    let table_width = geometry.table_width as f32;

    for (slot, &position) in selection.rows.iter().enumerate() {
        let is_header = style.first_row_is_header && slot == 0;
        let y = geometry.row_y(slot) as f32;
        let height = geometry.row_height as f32;
        let body_index = if style.first_row_is_header { slot.saturating_sub(1) } else { slot };

        let (background, color, weight) = if is_header {
            (Some(palette.header_row), palette.header_row_text, Weight::Bold)
        } else if body_index % 2 == 1 {
            (Some(palette.zebra), palette.body_text, Weight::Regular)
        } else {
            (None, palette.body_text, Weight::Regular)
        };
        if let Some(bg) = background {
            surface.fill_rect(table_x, y, table_width, height, bg);
        }

        let Some(row) = document.row(position) else {
            continue;
        };
        let text_style = TextStyle {
            font_size: style.font_size,
            color,
            weight,
        };
        let baseline = y + top_inset + font.ascent(style.font_size);
        for (col_slot, &column) in selection.columns.iter().enumerate() {
            let (Some(cell), Some(rect)) = (row.get(column), geometry.cell_rect(slot, col_slot)) else {
                continue;
            };
            let text = display_text(cell);
            if text.is_empty() {
                continue;
            }
            let max_width = (rect.width as f32 - 2.0 * padding).max(0.0);
            let x = rect.x as f32 + padding;
            draw_fitted(surface, font, &text, x, baseline, max_width, text_style);
        }
    }
}

fn draw_grid(surface: &mut Surface, geometry: &GridGeometry, style: &TableStyle) {
    if geometry.row_count == 0 {
        return;
    }
    let color = style.palette.grid_line;
    let left = geometry.table_origin.0 as f32;
    let top = geometry.table_origin.1 as f32;
    let right = left + geometry.table_width as f32;
    let bottom = top + geometry.table_height() as f32;

    // The closing edges sit one pixel inside the table
    let rows = geometry.row_count as usize;
    for slot in 0..=rows {
        let y = if slot == rows { bottom - 1.0 } else { geometry.row_y(slot) as f32 };
        surface.stroke_line((left, y), (right - 1.0, y), color);
    }
    let cols = geometry.column_widths.len();
    for slot in 0..=cols {
        let x = if slot == cols { right - 1.0 } else { geometry.column_x(slot) as f32 };
        surface.stroke_line((x, top), (x, bottom - 1.0), color);
    }
}

fn draw_footer_band(surface: &mut Surface, geometry: &GridGeometry, font: &FontFace, style: &TableStyle) {
    let top = geometry.footer_y() as f32;
    let height = geometry.footer_height as f32;
    let width = geometry.image_width as f32;
    let margin = geometry.table_origin.0 as f32;
    surface.fill_rect(0.0, top, width, height, style.palette.footer_band);
    if style.footer.is_empty() {
        return;
    }
    let baseline = font.centered_baseline(top, height, style.font_size);
    let max_width = (width - 2.0 * margin).max(0.0);
    draw_fitted(surface, font, &style.footer, margin, baseline, max_width, TextStyle {
        font_size: style.font_size,
        color: style.palette.footer_text,
        weight: Weight::Regular,
    });
}

fn draw_fitted(
    surface: &mut Surface,
    font: &FontFace,
    text: &str,
    x: f32,
    baseline: f32,
    max_width: f32,
    style: TextStyle,
) {
    if let Some(fitted) = fit_text(font, text, max_width, style) {
        surface.draw_text(font, &fitted, x, baseline, style);
    }
}

/// [`truncate_text`] with room left for the ink a bold run adds past its advance.
fn fit_text<'a>(
    measure: &dyn TextMeasure,
    text: &'a str,
    max_width: f32,
    style: TextStyle,
) -> Option<Cow<'a, str>> {
    let room = max_width - style.weight.overhang();
    truncate_text(measure, text, style.font_size, room)
}
