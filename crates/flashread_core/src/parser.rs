//! crates/flashread_core/src/parser.rs
//!
//! Text tokenization shared by the engine, fingerprinting, and the file
//! parsing adapters. File-type handling (plain text, PDF) lives behind the
//! `SourceParser` port in the service crate; the core only deals in word
//! sequences.

/// Splits raw text into word tokens on whitespace, excluding empty tokens.
pub fn parse_text(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Formats the estimated reading time of `word_count` words at `wpm` as
/// `M:SS`.
pub fn estimate_reading_time(word_count: usize, wpm: u16) -> String {
    let wpm = wpm.max(1) as usize;
    let total_seconds = (word_count * 60).div_ceil(wpm);
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
