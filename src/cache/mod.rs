//! Render deduplication: key derivation, the artifact index and its janitor.

mod janitor;
mod key;
mod store;

pub use janitor::CacheJanitor;
pub use key::{derive_identity_key, derive_key, derive_selection_key, CacheKey};
pub use store::{ArtifactCache, CacheEntry, CacheStats};
