//! Data types for parsed tables, render selections and grid geometry.

mod cell;
mod document;
mod geometry;

pub use cell::*;
pub use document::*;
pub use geometry::*;
