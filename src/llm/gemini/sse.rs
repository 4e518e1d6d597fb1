//! Server-Sent Events (SSE) decoding for Gemini responses

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::pin::Pin;

use crate::llm::core::error::LlmError;

use super::types::GenerateContentResponse;

/// Incremental `data:` line decoder.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences and JSON payloads split across network chunks decode correctly.
pub struct SseDecoder<T> {
    buffer: Vec<u8>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> SseDecoder<T> {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            _payload: PhantomData,
        }
    }

    /// Feed one chunk, returning every payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<T, LlmError>> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(payload) = decode_line(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Decode whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<Result<T, LlmError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

impl<T: DeserializeOwned> Default for SseDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Option<Result<T, LlmError>> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim(),
        Err(e) => {
            return Some(Err(LlmError::StreamError(format!(
                "Invalid UTF-8 in stream: {}",
                e
            ))))
        }
    };

    // Only data lines carry payloads; event:, id:, retry: and comments are ignored
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    Some(serde_json::from_str::<T>(data).map_err(|e| {
        LlmError::SerializationError(format!("Failed to parse SSE data: {}. Data: {}", e, data))
    }))
}

/// Turn the raw response body into a stream of Gemini response chunks.
pub fn parse_sse_stream(
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
) -> Pin<Box<dyn Stream<Item = Result<GenerateContentResponse, LlmError>> + Send>> {
    // A trailing None marks end of body so the decoder can flush an unterminated last line
    let chunks = byte_stream
        .map(Some)
        .chain(futures::stream::iter(std::iter::once(None)));

    let mut decoder = SseDecoder::<GenerateContentResponse>::new();
    let responses = chunks.flat_map(move |chunk| {
        let payloads = match chunk {
            Some(Ok(bytes)) => decoder.push(&bytes),
            Some(Err(e)) => vec![Err(LlmError::StreamError(e.to_string()))],
            None => decoder.finish().into_iter().collect(),
        };
        futures::stream::iter(payloads)
    });

    Box::pin(responses)
}
