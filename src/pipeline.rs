//! Render orchestration: key, cache, parse, layout, draw, persist.
//!
//! A [`RenderPipeline`] is shared by every worker serving render requests.
//! Renders for different keys run fully in parallel; renders for the same key
//! are serialized so only the first one does the work and later callers pick
//! up its artifact from the cache.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cache::{derive_identity_key, derive_selection_key, ArtifactCache, CacheJanitor, CacheKey};
use crate::config::{Config, RenderConfig};
use crate::error::{Result, XlsnapError};
use crate::layout::compute_geometry;
use crate::numfmt::format_default;
use crate::parser::{FileSheetReader, SheetReader};
use crate::render::encode::remove_quietly;
use crate::render::{promote, render_table, write_staged_png, FontFace, Palette, TableStyle};
use crate::types::{DocumentIdentity, DocumentSource, GridGeometry, Selection, TableDocument};

/// Keys with a render in flight. A key is present only while a caller holds
/// its [`KeyGuard`].
#[derive(Default)]
struct KeyLocks {
    in_flight: Mutex<HashSet<CacheKey>>,
    released: Condvar,
}

impl KeyLocks {
    fn acquire(&self, key: &CacheKey) -> KeyGuard<'_> {
        let mut in_flight = self.in_flight.lock();
        while in_flight.contains(key) {
            self.released.wait(&mut in_flight);
        }
        in_flight.insert(key.clone());
        KeyGuard {
            locks: self,
            key: key.clone(),
        }
    }

    fn held(&self) -> usize {
        self.in_flight.lock().len()
    }
}

struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: CacheKey,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.locks.in_flight.lock().remove(&self.key);
        self.locks.released.notify_all();
    }
}

/// Turns spreadsheet documents into cached PNG snapshots.
pub struct RenderPipeline<R: SheetReader = FileSheetReader> {
    config: RenderConfig,
    cache: Arc<ArtifactCache>,
    reader: R,
    font: FontFace,
    palette: Palette,
    locks: KeyLocks,
    janitor: Option<CacheJanitor>,
}

impl RenderPipeline<FileSheetReader> {
    /// Open the configured cache directory, load the configured font and
    /// start sweeping expired artifacts every `cleanup_interval_secs`.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let cache = ArtifactCache::open(&config.cache.dir, config.cache.ttl(), config.cache.enabled)?;
        Self::with_reader(config.render.clone(), Arc::new(cache), FileSheetReader)?
            .with_janitor(config.cache.cleanup_interval())
    }
}

impl<R: SheetReader> RenderPipeline<R> {
    pub fn with_reader(config: RenderConfig, cache: Arc<ArtifactCache>, reader: R) -> Result<Self> {
        config.layout.validate()?;
        let accent = config.accent_color.rgb().ok_or_else(|| {
            XlsnapError::InvalidConfig(format!("accent_color must be #RRGGBB, got {:?}", config.accent_color.0))
        })?;
        let font = FontFace::load(config.font_path.as_deref())?;
        Ok(Self {
            config,
            cache,
            reader,
            font,
            palette: Palette::with_accent(accent),
            locks: KeyLocks::default(),
            janitor: None,
        })
    }

    /// Run [`ArtifactCache::cleanup`] on a background thread every `interval`
    /// for as long as the pipeline lives. Replaces any running sweeper.
    pub fn with_janitor(mut self, interval: Duration) -> Result<Self> {
        self.janitor = Some(CacheJanitor::spawn(Arc::clone(&self.cache), interval)?);
        Ok(self)
    }

    /// Whether a background sweeper is running for this pipeline.
    pub fn has_janitor(&self) -> bool {
        self.janitor.is_some()
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Number of keys with a render currently in flight.
    pub fn in_flight(&self) -> usize {
        self.locks.held()
    }

    /// Render every populated row and every column of the first sheet.
    ///
    /// Returns the artifact path. A cache hit returns without reading the
    /// document.
    ///
    /// # Errors
    ///
    /// [`XlsnapError::InvalidKeyInput`] for a bad identity; every parse,
    /// layout, draw or encode failure as [`XlsnapError::RenderFailed`].
    pub fn render(&self, identity: &DocumentIdentity, source: &DocumentSource) -> Result<PathBuf> {
        let key = derive_identity_key(identity)?;
        self.render_keyed(&key, identity, source, None)
    }

    /// Render an explicit selection. Cached separately from the default
    /// selection of the same identity.
    pub fn render_with_selection(
        &self,
        identity: &DocumentIdentity,
        source: &DocumentSource,
        selection: &Selection,
    ) -> Result<PathBuf> {
        let key = derive_selection_key(identity, selection)?;
        self.render_keyed(&key, identity, source, Some(selection))
    }

    fn render_keyed(
        &self,
        key: &CacheKey,
        identity: &DocumentIdentity,
        source: &DocumentSource,
        selection: Option<&Selection>,
    ) -> Result<PathBuf> {
        if let Some(path) = self.cache.lookup(key) {
            return Ok(path);
        }

        let _guard = self.locks.acquire(key);
        // Whoever held the key before us may have populated the cache.
        if let Some(path) = self.cache.lookup(key) {
            return Ok(path);
        }

        let started = Instant::now();
        let target = self.cache.artifact_path(key);
        let (staged, geometry) = self
            .draw_staged(identity, source, selection, &target)
            .map_err(XlsnapError::into_render_failed)?;

        let path = self
            .persist(key, &staged, &target, &geometry)
            .map_err(|e| {
                remove_quietly(&staged);
                e.into_render_failed()
            })?;

        tracing::info!(
            key = %key,
            path = %path.display(),
            rows = geometry.row_count,
            cols = geometry.column_widths.len(),
            width = geometry.image_width,
            height = geometry.image_height,
            elapsed_ms = started.elapsed().as_millis(),
            "rendered snapshot"
        );
        Ok(path)
    }

    fn draw_staged(
        &self,
        identity: &DocumentIdentity,
        source: &DocumentSource,
        selection: Option<&Selection>,
        target: &Path,
    ) -> Result<(PathBuf, GridGeometry)> {
        let document = self.reader.read(source)?;
        let selection = selection.cloned().unwrap_or_else(|| Selection::all(&document));
        let geometry = compute_geometry(&document, &selection, &self.config.layout, &self.font)?;
        let style = self.style_for(identity, &document);
        let surface = render_table(&document, &selection, &geometry, &self.font, &style)?;
        let staged = write_staged_png(surface.pixmap(), target)?;
        Ok((staged, geometry))
    }

    fn persist(&self, key: &CacheKey, staged: &Path, target: &Path, geometry: &GridGeometry) -> Result<PathBuf> {
        let stored = self
            .cache
            .store(key, staged, geometry.image_width, geometry.image_height)?;
        match stored {
            Some(path) => Ok(path),
            None => {
                promote(staged, target)?;
                Ok(target.to_path_buf())
            }
        }
    }

    fn style_for(&self, identity: &DocumentIdentity, document: &TableDocument) -> TableStyle {
        let title = if document.sheet_name.trim().is_empty() {
            identity.template.trim().to_string()
        } else {
            document.sheet_name.clone()
        };
        TableStyle {
            title,
            subtitle: format_default(identity.parameter).unwrap_or_default(),
            footer: self.config.footer_text.clone(),
            first_row_is_header: self.config.first_row_is_header,
            font_size: self.config.layout.font_size,
            cell_padding: self.config.layout.cell_padding,
            palette: self.palette,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Cell, CellValue, Row};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StaticReader {
        document: TableDocument,
        reads: AtomicUsize,
    }

    impl SheetReader for StaticReader {
        fn read(&self, _source: &DocumentSource) -> Result<TableDocument> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.document.clone())
        }
    }

    fn document() -> TableDocument {
        let header = Row::from_cells(0, [
            Cell::new(0, CellValue::Text("Day".into())),
            Cell::new(1, CellValue::Text("Load".into())),
        ]);
        let body = Row::from_cells(1, [
            Cell::new(0, CellValue::Text("Mon".into())),
            Cell::new(1, CellValue::Number(72.5)),
        ]);
        TableDocument::new("Week 1", vec![header, body])
    }

    fn pipeline(dir: &Path) -> RenderPipeline<StaticReader> {
        let cache = ArtifactCache::open(dir, Duration::from_secs(60), true).unwrap();
        let reader = StaticReader {
            document: document(),
            reads: AtomicUsize::new(0),
        };
        RenderPipeline::with_reader(RenderConfig::default(), Arc::new(cache), reader).unwrap()
    }

    #[test]
    fn test_key_locks_release() {
        let locks = KeyLocks::default();
        let key = crate::cache::derive_key(1.0, "t").unwrap();
        {
            let _guard = locks.acquire(&key);
            assert_eq!(locks.held(), 1);
        }
        assert_eq!(locks.held(), 0);
        let _again = locks.acquire(&key);
        assert_eq!(locks.held(), 1);
    }

    #[test]
    fn test_style_title_falls_back_to_template() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let identity = DocumentIdentity::new(100.0, "cycle-a");
        let style = p.style_for(&identity, &TableDocument::new("", vec![]));
        assert_eq!(style.title, "cycle-a");
        assert_eq!(style.subtitle, "100");
        assert_eq!(p.style_for(&identity, &document()).title, "Week 1");
    }

    #[test]
    fn test_selection_renders_are_cached_apart() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let identity = DocumentIdentity::new(100.0, "cycle-a");
        let source = DocumentSource::new("plan.xlsx");
        let full = p.render(&identity, &source).unwrap();
        let narrow = p
            .render_with_selection(&identity, &source, &Selection::new([0, 1], [0]))
            .unwrap();
        assert_ne!(full, narrow);
        assert_eq!(p.cache().len(), 2);
        assert_eq!(p.reader().reads.load(Ordering::SeqCst), 2);
        assert_eq!(p.in_flight(), 0);
    }
}
