//! PNG encoding and crash-safe artifact files.
//!
//! Artifacts are written to a uniquely named `.tmp` sibling and renamed into
//! place, so a reader sees either no file or a complete one.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tiny_skia::Pixmap;

use crate::error::Result;

/// Extension of in-progress artifact files.
pub const STAGING_EXTENSION: &str = "tmp";

/// Straight (unpremultiplied) RGBA bytes of a pixmap.
pub fn unpremultiplied_rgba(pixmap: &Pixmap) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    rgba
}

/// Encode a pixmap as PNG into memory.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer).write_image(
        &unpremultiplied_rgba(pixmap),
        pixmap.width(),
        pixmap.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buffer)
}

/// Sibling staging path for `target`: `<dir>/<stem>.<uuid>.tmp`.
pub fn staging_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let name = format!("{stem}.{}.{STAGING_EXTENSION}", uuid::Uuid::new_v4().simple());
    target.with_file_name(name)
}

/// Write a pixmap as PNG to `path`, flushed to disk.
pub fn write_png(pixmap: &Pixmap, path: &Path) -> Result<()> {
    let bytes = encode_png(pixmap)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    let file = writer.into_inner().map_err(std::io::IntoInnerError::into_error)?;
    file.sync_all()?;
    Ok(())
}

/// Encode to a staging file next to `target`. The caller renames it into
/// place (or removes it on failure).
pub fn write_staged_png(pixmap: &Pixmap, target: &Path) -> Result<PathBuf> {
    let staged = staging_path(target);
    if let Err(e) = write_png(pixmap, &staged) {
        remove_quietly(&staged);
        return Err(e);
    }
    Ok(staged)
}

/// Atomically move a staged file to its final path, replacing any file there.
pub fn promote(staged: &Path, target: &Path) -> Result<()> {
    if let Err(e) = std::fs::rename(staged, target) {
        remove_quietly(staged);
        return Err(e.into());
    }
    Ok(())
}

/// Dimensions from a PNG header without decoding pixels.
pub fn png_dimensions(path: &Path) -> Result<(u32, u32)> {
    Ok(image::image_dimensions(path)?)
}

/// Remove a file, logging instead of failing when that is not possible.
pub fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample_pixmap() -> Pixmap {
        let mut pixmap = Pixmap::new(3, 2).unwrap();
        pixmap.fill(tiny_skia::Color::from_rgba8(200, 100, 50, 255));
        pixmap
    }

    #[test]
    fn test_png_signature_and_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("snapshot.png");
        let staged = write_staged_png(&sample_pixmap(), &target).unwrap();
        assert_eq!(staged.extension().unwrap(), STAGING_EXTENSION);
        assert!(!target.exists());

        promote(&staged, &target).unwrap();
        assert!(!staged.exists());
        let bytes = std::fs::read(&target).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(png_dimensions(&target).unwrap(), (3, 2));
    }

    #[test]
    fn test_staging_paths_are_unique_siblings() {
        let target = Path::new("/cache/abc.png");
        let a = staging_path(target);
        let b = staging_path(target);
        assert_ne!(a, b);
        assert_eq!(a.parent(), target.parent());
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("abc."));
    }

    #[test]
    fn test_opaque_pixels_survive_unpremultiply() {
        let rgba = unpremultiplied_rgba(&sample_pixmap());
        assert_eq!(rgba.get(..4), Some(&[200, 100, 50, 255][..]));
    }
}
