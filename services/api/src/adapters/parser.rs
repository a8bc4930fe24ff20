//! services/api/src/adapters/parser.rs
//!
//! This module contains the file parsing adapter, the concrete
//! implementation of the `SourceParser` port. Plain text and PDF are
//! accepted; everything else is rejected before any work is done. PDF text
//! extraction is CPU-bound and runs on the blocking pool.

use async_trait::async_trait;
use flashread_core::parser::parse_text;
use flashread_core::ports::{PortError, PortResult, SourceParser};

/// Upload size ceiling.
pub const MAX_SOURCE_BYTES: usize = 10 * 1024 * 1024;

/// An adapter that implements the `SourceParser` port for .txt and .pdf
/// uploads.
#[derive(Clone)]
pub struct FileParser {
    max_bytes: usize,
}

impl FileParser {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new(MAX_SOURCE_BYTES)
    }
}

#[async_trait]
impl SourceParser for FileParser {
    async fn parse(&self, file_name: &str, bytes: &[u8]) -> PortResult<Vec<String>> {
        if bytes.len() > self.max_bytes {
            return Err(PortError::InvalidInput(
                "File too large. Maximum size is 10MB".to_string(),
            ));
        }

        let lowered = file_name.to_lowercase();
        if lowered.ends_with(".txt") {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                PortError::InvalidInput("Uploaded file is not valid UTF-8 text".to_string())
            })?;
            Ok(parse_text(text))
        } else if lowered.ends_with(".pdf") {
            let owned = bytes.to_vec();
            let text = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&owned)
            })
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .map_err(|e| PortError::InvalidInput(format!("Failed to parse PDF: {e}")))?;
            Ok(parse_text(&text))
        } else {
            Err(PortError::InvalidInput(
                "Unsupported file format. Please use .txt or .pdf files".to_string(),
            ))
        }
    }
}
