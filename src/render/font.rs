//! Font loading and text measurement.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use ttf_parser::{Face, GlyphId};

use crate::error::{Result, XlsnapError};
use crate::layout::TextMeasure;

/// DejaVu Sans, used when no font is configured.
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Font files read so far, kept for the life of the process so each path is
/// read and leaked at most once.
static LOADED_FILES: OnceLock<Mutex<HashMap<PathBuf, &'static [u8]>>> = OnceLock::new();

/// A parsed TrueType/OpenType face.
///
/// The table directory is parsed once at construction. Font bytes live for
/// the whole process, so the parsed face can be cloned and shared freely.
#[derive(Debug, Clone)]
pub struct FontFace {
    data: &'static [u8],
    face: Face<'static>,
    units_per_em: f32,
    ascender: f32,
    descender: f32,
}

impl FontFace {
    /// The bundled face.
    pub fn bundled() -> Result<Self> {
        Self::from_data(Cow::Borrowed(BUNDLED_FONT))
    }

    /// Load a face from a font file (first face in collections).
    pub fn from_file(path: &Path) -> Result<Self> {
        let files = LOADED_FILES.get_or_init(Mutex::default);
        let mut files = files.lock();
        if let Some(data) = files.get(path) {
            return Self::from_data(Cow::Borrowed(*data));
        }
        let data = std::fs::read(path)
            .map_err(|e| XlsnapError::Font(format!("{}: {e}", path.display())))?;
        let font = Self::from_data(Cow::Owned(data))?;
        files.insert(path.to_path_buf(), font.data);
        Ok(font)
    }

    /// The configured face, or the bundled one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::bundled(),
        }
    }

    /// Parse a face. Owned bytes are leaked only once they parse.
    pub fn from_data(data: Cow<'static, [u8]>) -> Result<Self> {
        let data: &'static [u8] = match data {
            Cow::Borrowed(bytes) => bytes,
            Cow::Owned(bytes) => {
                Face::parse(&bytes, 0).map_err(|e| XlsnapError::Font(e.to_string()))?;
                Box::leak(bytes.into_boxed_slice())
            }
        };
        let face = Face::parse(data, 0).map_err(|e| XlsnapError::Font(e.to_string()))?;
        let units_per_em = f32::from(face.units_per_em());
        if units_per_em <= 0.0 {
            return Err(XlsnapError::Font("units per em is zero".to_string()));
        }
        let ascender = f32::from(face.ascender());
        let descender = f32::from(face.descender());
        Ok(Self {
            data,
            face,
            units_per_em,
            ascender,
            descender,
        })
    }

    pub fn face(&self) -> &Face<'static> {
        &self.face
    }

    /// The font file bytes.
    pub fn data(&self) -> &'static [u8] {
        self.data
    }

    /// Design units to pixels at `font_size`.
    pub fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em
    }

    /// Distance from baseline to the top of the tallest glyphs, in pixels.
    pub fn ascent(&self, font_size: f32) -> f32 {
        self.ascender * self.scale(font_size)
    }

    /// Distance from baseline to the bottom of descenders (positive), in pixels.
    pub fn descent(&self, font_size: f32) -> f32 {
        -self.descender * self.scale(font_size)
    }

    /// Baseline that vertically centers a line of text in a band.
    pub fn centered_baseline(&self, top: f32, height: f32, font_size: f32) -> f32 {
        let ascent = self.ascent(font_size);
        let line = ascent + self.descent(font_size);
        top + (height - line) / 2.0 + ascent
    }

    /// Glyph for a character. Control characters (line breaks from
    /// multi-paragraph cells, tabs) are drawn as spaces; unmapped characters
    /// use glyph 0.
    pub fn glyph(&self, ch: char) -> GlyphId {
        let ch = if ch.is_control() { ' ' } else { ch };
        self.face.glyph_index(ch).unwrap_or(GlyphId(0))
    }

    /// Horizontal advance of a glyph in design units.
    pub fn advance(&self, glyph: GlyphId) -> f32 {
        f32::from(self.face.glyph_hor_advance(glyph).unwrap_or(0))
    }
}

impl TextMeasure for FontFace {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let units: f32 = text.chars().map(|ch| self.advance(self.glyph(ch))).sum();
        units * self.scale(font_size)
    }
}
