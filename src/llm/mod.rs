//! Gemini streaming client
//!
//! This module talks to Google Gemini models, either through Vertex AI
//! (Application Default Credentials) or the Gemini Developer API (API key),
//! and exposes responses as a stream of provider-neutral events.

pub mod auth;
pub mod core;
pub mod gemini;

// Re-export commonly used types
pub use core::{
    config::GenerationConfig,
    error::LlmError,
    types::{
        ContentBlock, ContentDelta, FinishReason, GenerateRequest, LlmStream, Message,
        MessageRole, StreamEvent, UsageMetadata,
    },
};

pub use gemini::{GeminiClient, GeminiEndpoint, GeminiModel};
