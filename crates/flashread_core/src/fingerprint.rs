//! crates/flashread_core/src/fingerprint.rs
//!
//! Content fingerprinting for cross-device document identity.
//!
//! Hashing the full content would be needlessly expensive for large
//! documents; the head + tail + word-count digest is stable across minor
//! re-encoding artifacts from file parsing while remaining
//! collision-resistant for practical corpora.

use sha2::{Digest, Sha256};

/// Number of words sampled from each end of the sequence.
const SAMPLE_WORDS: usize = 50;

/// Derives the fingerprint of a word sequence: the lowercased first and last
/// fifty words (overlapping when the document is shorter), joined with `|`,
/// followed by the total word count, hashed with SHA-256 and rendered as
/// lowercase hex. Defined for any sequence, including the empty one.
pub fn fingerprint_words<S: AsRef<str>>(words: &[S]) -> String {
    let head = words.iter().take(SAMPLE_WORDS);
    let tail = words
        .iter()
        .skip(words.len().saturating_sub(SAMPLE_WORDS));

    let mut material = String::new();
    for word in head.chain(tail) {
        material.push_str(&word.as_ref().to_lowercase());
        material.push('|');
    }
    material.push_str(&words.len().to_string());

    let digest = Sha256::digest(material.as_bytes());
    hex::encode(digest)
}

/// Fingerprints raw text by tokenizing it first.
pub fn fingerprint_text(text: &str) -> String {
    fingerprint_words(&crate::parser::parse_text(text))
}
