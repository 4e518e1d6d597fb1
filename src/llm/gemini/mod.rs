//! Gemini provider implementation
//!
//! Streams `streamGenerateContent` responses from Vertex AI or the Gemini
//! Developer API and maps them onto the shared `StreamEvent` type.

pub mod client;
pub mod mapper;
pub mod sse;
pub mod types;

pub use client::{GeminiClient, GeminiEndpoint, GeminiModel};
