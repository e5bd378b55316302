//! xlsnap - spreadsheet snapshots as cached PNG images
//!
//! Turns the first sheet of an XLSX or ODS document into a raster table:
//! - Streaming XLSX/ODS parsing into a ragged row/cell model
//! - Number and date formats applied the way the spreadsheet shows them
//! - Deterministic grid layout with measured column widths
//! - tiny-skia rasterization, PNG artifacts written atomically
//! - SHA-256 keyed artifact cache with TTL eviction and a runtime toggle
//!
//! # Usage
//!
//! ```no_run
//! use xlsnap::{Config, DocumentIdentity, DocumentSource, RenderPipeline};
//!
//! # fn main() -> xlsnap::Result<()> {
//! let pipeline = RenderPipeline::new(&Config::from_env()?)?;
//! let path = pipeline.render(
//!     &DocumentIdentity::new(100.0, "five-by-five"),
//!     &DocumentSource::new("plan.xlsx"),
//! )?;
//! println!("{}", path.display());
//! # Ok(())
//! # }
//! ```

// Parsing modules
pub mod cell_ref;
pub mod error;
pub mod numfmt;
pub mod parser;
pub mod types;
pub mod xml_helpers;

// Layout and rendering modules
pub mod layout;
pub mod render;

// Caching and orchestration
pub mod cache;
pub mod config;
pub mod pipeline;

pub use cache::{derive_key, ArtifactCache, CacheJanitor, CacheKey};
pub use config::Config;
pub use error::{Result, XlsnapError};
pub use pipeline::RenderPipeline;
pub use types::*;
