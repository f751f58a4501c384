//! Content fingerprints for change detection.
//!
//! Only equality matters: fingerprints gate the spec-immutability guard and
//! the plan-staleness counter. A missing file maps to a distinguished
//! absent value so "file deleted" reads as a change.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

/// A content hash of a file, or the distinguished absent value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(Option<String>);

impl Fingerprint {
    /// Fingerprint of a byte buffer.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(Some(hex_encode(&digest)))
    }

    /// Fingerprint of a file's current content.
    ///
    /// A missing or unreadable file yields [`Fingerprint::absent`].
    pub fn of_file(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::of_bytes(&bytes),
            Err(_) => Self::absent(),
        }
    }

    /// The distinguished value for a missing file.
    pub fn absent() -> Self {
        Self(None)
    }

    /// Whether this fingerprint is the absent value.
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            // Twelve hex chars are plenty for log lines.
            Some(hex) => f.write_str(&hex[..12.min(hex.len())]),
            None => f.write_str("<absent>"),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
