//! Column sizing and grid geometry.

use super::{LayoutConfig, TextMeasure};
use crate::error::{Result, XlsnapError};
use crate::numfmt::display_text;
use crate::types::{GridGeometry, Selection, TableDocument};

/// Round a measured width up to whole pixels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pixel_width(width: f32) -> u32 {
    if !width.is_finite() || width <= 0.0 {
        return 0;
    }
    width.ceil().min(u32::MAX as f32) as u32
}

/// Compute pixel geometry for a selection of a document.
///
/// Each column is as wide as the uniform width, widened to fit its widest
/// display text plus padding, clamped to the configured bounds.
///
/// # Errors
///
/// [`XlsnapError::EmptySelection`] when no columns are selected,
/// [`XlsnapError::CanvasTooLarge`] when the image exceeds the configured
/// limits, [`XlsnapError::InvalidConfig`] for inconsistent sizes.
pub fn compute_geometry(
    document: &TableDocument,
    selection: &Selection,
    config: &LayoutConfig,
    measure: &dyn TextMeasure,
) -> Result<GridGeometry> {
    config.validate()?;
    if selection.columns.is_empty() {
        return Err(XlsnapError::EmptySelection);
    }

    let row_count = u64::try_from(selection.rows.len()).unwrap_or(u64::MAX);
    let image_height = u64::from(config.header_height)
        .saturating_add(u64::from(config.row_height).saturating_mul(row_count))
        .saturating_add(u64::from(config.footer_height));

    // No column is narrower than the uniform width, so this bounds the
    // image width from below before any text is measured.
    let column_count = u64::try_from(selection.columns.len()).unwrap_or(u64::MAX);
    let narrowest_width = u64::from(config.column_width)
        .saturating_mul(column_count)
        .saturating_add(2 * u64::from(config.margin));
    check_canvas(narrowest_width, image_height, config)?;

    let padding = config.cell_padding.saturating_mul(2);
    let column_widths: Vec<u32> = selection
        .columns
        .iter()
        .map(|&column| {
            let widest = selection
                .rows
                .iter()
                .filter_map(|&pos| document.row(pos))
                .filter_map(|row| row.get(column))
                .map(|cell| measure.text_width(&display_text(cell), config.font_size))
                .fold(0.0_f32, f32::max);
            let content = pixel_width(widest).saturating_add(padding);
            content
                .max(config.column_width)
                .clamp(config.min_column_width, config.max_column_width)
        })
        .collect();

    let table_width: u64 = column_widths.iter().map(|&w| u64::from(w)).sum();
    let image_width = table_width.saturating_add(2 * u64::from(config.margin));
    check_canvas(image_width, image_height, config)?;

    // Both bounds checked above, so these fit in u32.
    let to_u32 = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    Ok(GridGeometry {
        column_widths,
        row_height: config.row_height,
        row_count: to_u32(row_count),
        table_origin: (config.margin, config.header_height),
        table_width: to_u32(table_width),
        header_height: config.header_height,
        footer_height: config.footer_height,
        image_width: to_u32(image_width),
        image_height: to_u32(image_height),
    })
}

fn check_canvas(width: u64, height: u64, config: &LayoutConfig) -> Result<()> {
    if width > u64::from(config.max_image_width) || height > u64::from(config.max_image_height) {
        return Err(XlsnapError::CanvasTooLarge {
            width: u32::try_from(width).unwrap_or(u32::MAX),
            height: u32::try_from(height).unwrap_or(u32::MAX),
            max_width: config.max_image_width,
            max_height: config.max_image_height,
        });
    }
    Ok(())
}
