//! Structured error types for xlsnap.
//!
//! Every fallible operation in the crate returns [`Result`]. The pipeline wraps
//! parse, layout and draw failures in [`XlsnapError::RenderFailed`] so callers
//! can tell a broken render apart from a bad request.

use std::path::PathBuf;

/// All errors that can occur while parsing, laying out, rendering or caching.
#[derive(Debug, thiserror::Error)]
pub enum XlsnapError {
    /// The source document is missing, unreadable or zero-length.
    #[error("Document unavailable: {path}: {reason}")]
    DocumentUnavailable { path: PathBuf, reason: String },

    /// The extension matches neither supported container format.
    #[error("Unsupported document format: {0:?}")]
    UnsupportedFormat(String),

    /// The workbook contains no sheets.
    #[error("Document contains no sheets")]
    EmptyDocument,

    /// The workbook lists a first sheet whose data part is absent.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Zero columns were selected for rendering.
    #[error("Selection contains no columns")]
    EmptySelection,

    /// Cache key inputs violate the key contract.
    #[error("Invalid cache key input: {0}")]
    InvalidKeyInput(String),

    /// Computed image dimensions exceed the configured canvas limits.
    #[error("Canvas too large: {width}x{height} exceeds {max_width}x{max_height}")]
    CanvasTooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    /// Font loading or parsing failure.
    #[error("Font error: {0}")]
    Font(String),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A render request failed; wraps the underlying cause.
    #[error("Render failed: {0}")]
    RenderFailed(#[source] Box<XlsnapError>),

    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// PNG encoding error.
    #[error("Image encoding: {0}")]
    Image(#[from] image::ImageError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XlsnapError>;

impl XlsnapError {
    /// Wrap an error as a pipeline-level render failure.
    ///
    /// Already-wrapped errors are returned unchanged so the cause chain stays
    /// one level deep.
    #[must_use]
    pub fn into_render_failed(self) -> Self {
        match self {
            Self::RenderFailed(_) => self,
            other => Self::RenderFailed(Box::new(other)),
        }
    }

    /// The innermost cause for wrapped render failures, `self` otherwise.
    #[must_use]
    pub fn root_cause(&self) -> &XlsnapError {
        match self {
            Self::RenderFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_failed_wraps_once() {
        let err = XlsnapError::EmptySelection.into_render_failed();
        let err = err.into_render_failed();
        assert!(matches!(err, XlsnapError::RenderFailed(_)));
        assert!(matches!(err.root_cause(), XlsnapError::EmptySelection));
    }

    #[test]
    fn test_display_includes_cause() {
        let err = XlsnapError::SheetNotFound("Plan".to_string()).into_render_failed();
        assert_eq!(err.to_string(), "Render failed: Sheet not found: Plan");
    }
}
