use serde::Serialize;

use super::{TableDocument, MAX_SHEET_COLUMNS};

/// Explicit subset of rows and columns to render.
///
/// Rows are positions in [`TableDocument::rows`]; columns are 0-indexed sheet
/// columns. Order is preserved and duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub rows: Vec<usize>,
    pub columns: Vec<u32>,
}

impl Selection {
    pub fn new(rows: impl IntoIterator<Item = usize>, columns: impl IntoIterator<Item = u32>) -> Self {
        let mut seen_rows = std::collections::HashSet::new();
        let mut seen_cols = std::collections::HashSet::new();
        Self {
            rows: rows.into_iter().filter(|r| seen_rows.insert(*r)).collect(),
            columns: columns.into_iter().filter(|c| seen_cols.insert(*c)).collect(),
        }
    }

    /// Every row through the last populated one, and every column up to the
    /// document's max column count (never past the sheet's last column).
    pub fn all(document: &TableDocument) -> Self {
        Self {
            rows: document.rendered_rows(),
            columns: (0..document.max_column_count().min(MAX_SHEET_COLUMNS)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }
}

/// Rectangle in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Pixel geometry for one render.
///
/// Computed per render and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridGeometry {
    /// Width of each selected column, in selection order
    pub column_widths: Vec<u32>,
    /// Uniform height of each selected row
    pub row_height: u32,
    pub row_count: u32,
    /// Top-left corner of the table
    pub table_origin: (u32, u32),
    pub table_width: u32,
    pub header_height: u32,
    pub footer_height: u32,
    pub image_width: u32,
    pub image_height: u32,
}

impl GridGeometry {
    /// Left edge of the column in slot `slot` (selection order).
    pub fn column_x(&self, slot: usize) -> u32 {
        self.table_origin.0
            + self
                .column_widths
                .iter()
                .take(slot)
                .copied()
                .sum::<u32>()
    }

    /// Top edge of the row in slot `slot` (selection order).
    pub fn row_y(&self, slot: usize) -> u32 {
        let slot = u32::try_from(slot).unwrap_or(u32::MAX);
        self.table_origin
            .1
            .saturating_add(self.row_height.saturating_mul(slot))
    }

    pub fn table_height(&self) -> u32 {
        self.row_height.saturating_mul(self.row_count)
    }

    /// Top edge of the footer band.
    pub fn footer_y(&self) -> u32 {
        self.image_height.saturating_sub(self.footer_height)
    }

    /// Bounds of a cell by row and column slot, if both slots exist.
    pub fn cell_rect(&self, row_slot: usize, col_slot: usize) -> Option<CellRect> {
        let width = *self.column_widths.get(col_slot)?;
        if u32::try_from(row_slot).ok()? >= self.row_count {
            return None;
        }
        Some(CellRect {
            x: self.column_x(col_slot),
            y: self.row_y(row_slot),
            width,
            height: self.row_height,
        })
    }
}
