use serde::{Deserialize, Serialize};

/// The value held by a single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "camelCase")]
pub enum CellValue {
    /// No value (styled-but-empty cells, padding for ragged rows)
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Spreadsheet error literal such as `#DIV/0!`
    Error(String),
    /// A value whose encoding could not be decoded as its declared type.
    /// The raw literal is kept so it can still be displayed.
    Malformed(String),
}

impl CellValue {
    /// True for [`CellValue::Empty`] and for blank text.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// A cell positioned by column inside its row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// 0-indexed column position
    pub column: u32,
    pub value: CellValue,
    /// Number format code from the source document (e.g. `0.0" kg"`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Display text as formatted by the source document itself (ODS `text:p`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Cell {
    pub fn new(column: u32, value: CellValue) -> Self {
        Self {
            column,
            value,
            format: None,
            display: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// An ordered, sparse row of cells.
///
/// Cells are kept sorted by column and column indices are unique within the
/// row. Missing columns are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// 0-indexed row position in the source sheet
    pub index: u32,
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            cells: Vec::new(),
        }
    }

    /// Build a row from cells in any order. Later cells win on duplicate columns.
    pub fn from_cells(index: u32, cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut row = Self::new(index);
        for cell in cells {
            row.insert(cell);
        }
        row
    }

    /// Insert a cell, replacing any existing cell in the same column.
    pub fn insert(&mut self, cell: Cell) {
        match self.cells.binary_search_by_key(&cell.column, |c| c.column) {
            Ok(pos) => {
                if let Some(slot) = self.cells.get_mut(pos) {
                    *slot = cell;
                }
            }
            Err(pos) => self.cells.insert(pos, cell),
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cell at a column, if populated.
    pub fn get(&self, column: u32) -> Option<&Cell> {
        self.cells
            .binary_search_by_key(&column, |c| c.column)
            .ok()
            .and_then(|pos| self.cells.get(pos))
    }

    /// Last populated column index + 1, or 0 when the row has no values.
    pub fn populated_width(&self) -> u32 {
        self.cells
            .iter()
            .rev()
            .find(|c| !c.value.is_empty())
            .map_or(0, |c| c.column.saturating_add(1))
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.value.is_empty())
    }
}
