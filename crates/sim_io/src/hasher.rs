//! Content hashing for configuration snapshots.
//!
//! Hashes are lowercase SHA-256 hex. Experiment metadata stores the short
//! `sha256:<16 hex>` form so two runs can be compared on the exact
//! configuration bytes they consumed.

use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{IoResult, json_err};

/// Encode bytes as lowercase hex without external deps.
fn to_lower_hex(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(LUT[(b >> 4) as usize] as char);
        out.push(LUT[(b & 0x0F) as usize] as char);
    }
    out
}

/// SHA-256 of raw bytes, full 64-char lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    to_lower_hex(&h.finalize())
}

/// SHA-256 over a value's JSON bytes (serde_json's stable field order).
pub fn sha256_value<T: Serialize>(value: &T) -> IoResult<String> {
    let bytes =
        serde_json::to_vec(value).map_err(|e| json_err(Path::new("<value>"), e))?;
    Ok(sha256_hex(&bytes))
}

/// Short snapshot form stored in experiment metadata: `sha256:<16 hex>`.
pub fn snapshot_tag(full_hex: &str) -> String {
    format!("sha256:{}", &full_hex[..16.min(full_hex.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn snapshot_tag_is_short() {
        let full = sha256_hex(b"config");
        let tag = snapshot_tag(&full);
        assert!(tag.starts_with("sha256:"));
        assert_eq!(tag.len(), "sha256:".len() + 16);
    }

    #[test]
    fn value_hash_is_stable() {
        #[derive(serde::Serialize)]
        struct S {
            a: u32,
            b: &'static str,
        }
        let x = sha256_value(&S { a: 1, b: "x" }).unwrap();
        let y = sha256_value(&S { a: 1, b: "x" }).unwrap();
        assert_eq!(x, y);
    }
}
