//! Cache key derivation.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, XlsnapError};
use crate::types::{DocumentIdentity, Selection};

/// Separates the canonical parameter from the template reference.
const FIELD_SEPARATOR: char = '\u{1f}';

/// Hex-encoded SHA-256 of a document identity. Also the artifact file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accept a string that has the shape of a derived key (64 lowercase hex).
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(s.to_string()))
    }

    /// Artifact file name for this key.
    pub fn file_name(&self) -> String {
        format!("{}.png", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical text of a numeric parameter: fixed 6-decimal precision, with
/// negative zero folded into zero.
fn canonical_parameter(parameter: f64) -> String {
    let text = format!("{parameter:.6}");
    if text.trim_start_matches('-').bytes().all(|b| matches!(b, b'0' | b'.')) {
        return format!("{:.6}", 0.0);
    }
    text
}

/// Derive the cache key for a parameter and template reference.
///
/// Numerically equal parameters (`80.0`, `80.00`) map to the same key.
///
/// # Errors
///
/// [`XlsnapError::InvalidKeyInput`] for an empty or blank template reference
/// or a non-finite parameter.
pub fn derive_key(parameter: f64, template: &str) -> Result<CacheKey> {
    let template = template.trim();
    if template.is_empty() {
        return Err(XlsnapError::InvalidKeyInput(
            "template reference is empty".to_string(),
        ));
    }
    if !parameter.is_finite() {
        return Err(XlsnapError::InvalidKeyInput(format!(
            "parameter {parameter} is not finite"
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical_parameter(parameter).as_bytes());
    let mut separator = [0u8; 4];
    hasher.update(FIELD_SEPARATOR.encode_utf8(&mut separator).as_bytes());
    hasher.update(template.as_bytes());
    Ok(CacheKey(hex::encode(hasher.finalize())))
}

/// [`derive_key`] for a document identity.
pub fn derive_identity_key(identity: &DocumentIdentity) -> Result<CacheKey> {
    derive_key(identity.parameter, &identity.template)
}

/// Key for a render of an explicit selection.
///
/// The selection is folded into the template reference, so explicit
/// selections never share an artifact with the default selection.
pub fn derive_selection_key(identity: &DocumentIdentity, selection: &Selection) -> Result<CacheKey> {
    if identity.template.trim().is_empty() {
        return derive_key(identity.parameter, "");
    }
    let join = |items: Vec<String>| items.join(",");
    let scoped = format!(
        "{}{FIELD_SEPARATOR}rows={}{FIELD_SEPARATOR}cols={}",
        identity.template.trim(),
        join(selection.rows.iter().map(ToString::to_string).collect()),
        join(selection.columns.iter().map(ToString::to_string).collect()),
    );
    derive_key(identity.parameter, &scoped)
}
