//! Stable identity for "this narrative state plus this candidate choice".
//!
//! A [`CacheKey`] is a SHA-256 digest over a canonical encoding of the
//! history, the choice and the style fields. Every variable-length field
//! is written as a little-endian `u64` byte length followed by its UTF-8
//! bytes, so no separator can be forged by the text itself: `["ab", "c"]`
//! and `["a", "bc"]` encode differently, as do a segment boundary and a
//! literal newline inside a segment.
//!
//! Collisions are treated as an accepted risk. Nothing here defends
//! against an adversary choosing inputs to collide.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::{GenerationRequest, StyleParams};

/// Domain tag mixed into every digest; bump the suffix if the encoding changes.
const KEY_DOMAIN: &[u8] = b"huginn.continuation.v1";

/// Fixed-width fingerprint of a (history, choice, style) triple.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Compute the key for a narrative state and candidate choice.
    ///
    /// Pure and deterministic: equal inputs always produce equal keys.
    /// Callers reject empty choices before getting here.
    pub fn compute<S: AsRef<str>>(history: &[S], choice: &str, style: &StyleParams) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update((history.len() as u64).to_le_bytes());
        for segment in history {
            write_field(&mut hasher, segment.as_ref());
        }
        write_field(&mut hasher, choice);
        write_field(&mut hasher, &style.genre);
        write_field(&mut hasher, &style.author_style);
        write_field(&mut hasher, &style.reading_level);
        Self(hasher.finalize().into())
    }

    /// Key for the narrative state described by a provider request.
    pub fn for_request(request: &GenerationRequest) -> Self {
        Self::compute(&request.history[..], &request.choice, &request.style)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

fn write_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.short())
    }
}

/// Compute a cache key from history, choice and style.
///
/// Free-function form of [`CacheKey::compute`].
pub fn compute_key<S: AsRef<str>>(history: &[S], choice: &str, style: &StyleParams) -> CacheKey {
    CacheKey::compute(history, choice, style)
}
