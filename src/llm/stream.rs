//! Incremental decoder for newline-delimited JSON response bodies
//!
//! Ollama streams one JSON object per line. Bytes arrive in arbitrary
//! chunks, so complete lines are cut from a bounded buffer and the
//! remainder is kept for the next chunk.

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;

use crate::errors::{RagError, Result};

/// Maximum length of a single line (1MB)
pub const MAX_LINE_BYTES: usize = 1_048_576;

#[derive(Debug)]
pub struct NdjsonDecoder {
    buffer: BytesMut,
    max_line_bytes: usize,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    pub fn with_limit(max_line_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_line_bytes,
        }
    }

    /// Feed bytes and decode every complete line now available
    pub fn push<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Result<Vec<T>> {
        self.buffer.extend_from_slice(bytes);

        let mut items = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos);
            self.buffer.advance(1);
            if let Some(item) = Self::decode_line(&line)? {
                items.push(item);
            }
        }

        if self.buffer.len() > self.max_line_bytes {
            return Err(RagError::Generation(format!(
                "stream line exceeds {} bytes",
                self.max_line_bytes
            )));
        }

        Ok(items)
    }

    /// Decode whatever is left once the body ends
    pub fn finish<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let rest = self.buffer.split();
        Self::decode_line(&rest)
    }

    fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Result<Option<T>> {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(trimmed)?))
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for NdjsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Fragment {
        response: String,
        done: bool,
    }

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = NdjsonDecoder::new();
        let first: Vec<Fragment> = decoder.push(br#"{"response":"Hel"#).unwrap();
        assert!(first.is_empty());

        let second: Vec<Fragment> = decoder
            .push(b"lo\",\"done\":false}\n{\"response\":\" world\",\"done\":true}\n")
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].response, "Hello");
        assert!(second[1].done);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_finish_without_trailing_newline() {
        let mut decoder = NdjsonDecoder::new();
        let items: Vec<Fragment> = decoder.push(br#"{"response":"x","done":true}"#).unwrap();
        assert!(items.is_empty());
        let last: Option<Fragment> = decoder.finish().unwrap();
        assert_eq!(last.unwrap().response, "x");
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut decoder = NdjsonDecoder::with_limit(8);
        let result: Result<Vec<Fragment>> = decoder.push(b"0123456789abcdef");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let mut decoder = NdjsonDecoder::new();
        let result: Result<Vec<Fragment>> = decoder.push(b"not json\n");
        assert!(result.is_err());
    }
}
