//! Raster rendering of table snapshots.
//!
//! - `font`: face loading and text measurement
//! - `glyph_path`: glyph outlines as tiny-skia paths
//! - `surface`: the per-render canvas
//! - `table`: header band, rows, grid and footer band
//! - `encode`: PNG encoding and staged artifact files

pub mod colors;
pub mod encode;
pub mod font;
pub mod glyph_path;
pub mod surface;
pub mod table;

pub use colors::{palette, AccentColor, Palette, Rgb};
pub use encode::{encode_png, png_dimensions, promote, write_staged_png};
pub use font::FontFace;
pub use surface::{Surface, TextStyle, Weight};
pub use table::{render_table, truncate_text, TableStyle};
