// HTTP and WebSocket server
pub mod handlers;
pub mod models;
pub mod routes;

// Streaming session protocol
pub mod error;
pub mod relay;
pub mod source;

// Process setup
pub mod config;
pub mod logging;

// Gemini client
pub mod llm;
