use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Row;

/// Largest sheet both formats allow: 1,048,576 rows by 16,384 columns (`XFD`).
pub const MAX_SHEET_ROWS: u32 = 1_048_576;
pub const MAX_SHEET_COLUMNS: u32 = 16_384;

/// A parsed, format-agnostic table: the first sheet of a workbook.
///
/// Built once by the parser and treated as read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDocument {
    /// Name of the sheet the table was read from
    pub sheet_name: String,
    rows: Vec<Row>,
}

impl TableDocument {
    /// Build a document from rows. Rows are ordered by source index.
    pub fn new(sheet_name: impl Into<String>, mut rows: Vec<Row>) -> Self {
        rows.sort_by_key(|r| r.index);
        Self {
            sheet_name: sheet_name.into(),
            rows,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row at a position in [`Self::rows`] (not a source row index).
    pub fn row(&self, position: usize) -> Option<&Row> {
        self.rows.get(position)
    }

    /// Largest "last populated column index + 1" over all rows.
    ///
    /// Ragged tables are fine: shorter rows simply contribute less.
    pub fn max_column_count(&self) -> u32 {
        self.rows
            .iter()
            .map(Row::populated_width)
            .max()
            .unwrap_or(0)
    }

    /// Row positions up to and including the last populated row.
    ///
    /// Blank rows between populated ones are included so row positions in a
    /// render match the sheet; trailing blank rows are not.
    pub fn rendered_rows(&self) -> Vec<usize> {
        let end = self
            .rows
            .iter()
            .rposition(|r| !r.is_blank())
            .map_or(0, |last| last + 1);
        (0..end).collect()
    }

    /// Positions of rows with at least one populated cell.
    pub fn populated_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_blank())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Supported tabular container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Office Open XML spreadsheet (`.xlsx`, `.xlsm`)
    Xlsx,
    /// OpenDocument spreadsheet (`.ods`)
    Ods,
}

impl DocumentFormat {
    /// Match a file extension (with or without a leading dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().trim_start_matches('.');
        if ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm") {
            Some(Self::Xlsx)
        } else if ext.eq_ignore_ascii_case("ods") {
            Some(Self::Ods)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Ods => "ods",
        }
    }
}

/// Where a document lives: a file path plus an optional extension hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSource {
    pub path: PathBuf,
    /// Overrides the path's own extension when set
    pub extension_hint: Option<String>,
}

impl DocumentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extension_hint: None,
        }
    }

    #[must_use]
    pub fn with_extension_hint(mut self, ext: impl Into<String>) -> Self {
        self.extension_hint = Some(ext.into());
        self
    }

    /// The extension used for format selection.
    pub fn extension(&self) -> Option<&str> {
        self.extension_hint
            .as_deref()
            .or_else(|| self.path.extension().and_then(|e| e.to_str()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Instantiation parameters that identify a produced document.
///
/// Two identities with the same parameter and template describe the same
/// rendered output and therefore share a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIdentity {
    /// Numeric input the document was produced from (e.g. max bench press in kg)
    pub parameter: f64,
    /// Stable reference to the template the document was instantiated from
    pub template: String,
}

impl DocumentIdentity {
    pub fn new(parameter: f64, template: impl Into<String>) -> Self {
        Self {
            parameter,
            template: template.into(),
        }
    }
}
