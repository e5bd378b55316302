//! Document readers.
//!
//! Validates a [`DocumentSource`], selects the container parser by extension
//! and extracts the first sheet as a [`TableDocument`].

mod ods;
mod xlsx;

use std::io::Cursor;
use std::time::Instant;

use zip::ZipArchive;

use crate::error::{Result, XlsnapError};
use crate::types::{DocumentFormat, DocumentSource, TableDocument};

/// Reads a tabular document from a source.
///
/// This is the seam the pipeline parses through; tests substitute
/// implementations that count or fail calls.
pub trait SheetReader: Send + Sync {
    fn read(&self, source: &DocumentSource) -> Result<TableDocument>;
}

/// Reads documents from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSheetReader;

impl SheetReader for FileSheetReader {
    fn read(&self, source: &DocumentSource) -> Result<TableDocument> {
        read_document(source)
    }
}

/// Resolve the container format of a source.
///
/// Fails with [`XlsnapError::UnsupportedFormat`] before anything is opened.
pub fn detect_format(source: &DocumentSource) -> Result<DocumentFormat> {
    let ext = source.extension().unwrap_or("");
    DocumentFormat::from_extension(ext)
        .ok_or_else(|| XlsnapError::UnsupportedFormat(ext.to_string()))
}

/// Validate and parse a document from disk.
pub fn read_document(source: &DocumentSource) -> Result<TableDocument> {
    let format = detect_format(source)?;
    let path = source.path();
    let unavailable = |reason: String| XlsnapError::DocumentUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = std::fs::metadata(path).map_err(|e| unavailable(e.to_string()))?;
    if !metadata.is_file() {
        return Err(unavailable("not a regular file".to_string()));
    }
    if metadata.len() == 0 {
        return Err(unavailable("zero-length file".to_string()));
    }
    let data = std::fs::read(path).map_err(|e| unavailable(e.to_string()))?;
    if data.is_empty() {
        return Err(unavailable("zero-length file".to_string()));
    }

    parse_bytes(&data, format)
}

/// Parse an in-memory container.
pub fn parse_bytes(data: &[u8], format: DocumentFormat) -> Result<TableDocument> {
    let started = Instant::now();
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let document = match format {
        DocumentFormat::Xlsx => xlsx::parse(&mut archive)?,
        DocumentFormat::Ods => ods::parse(&mut archive)?,
    };
    tracing::debug!(
        format = format.as_str(),
        sheet = %document.sheet_name,
        rows = document.row_count(),
        cols = document.max_column_count(),
        elapsed_ms = started.elapsed().as_millis(),
        "parsed document"
    );
    Ok(document)
}
