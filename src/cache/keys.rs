use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Content address of a rendered PDF.
///
/// SHA-256 over the canonical JSON serialization of everything that
/// influences the rendered bytes. Deterministic: map-typed fields in the
/// payload must serialize with a stable key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_vec(payload)?;
        let digest = Sha256::digest(&canonical);
        Ok(Self(hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
