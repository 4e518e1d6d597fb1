//! Generation sources
//!
//! A [`GenerationSource`] turns a conversation into a lazy, finite sequence
//! of text fragments. The relay core only depends on this trait; the
//! Gemini-backed [`GeminiSource`] is the production implementation.

use async_trait::async_trait;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use thiserror::Error;
use tracing::debug;

use crate::llm::{
    ContentBlock, ContentDelta, GeminiClient, GeminiModel, GenerateRequest, GenerationConfig,
    LlmError, Message, MessageRole, StreamEvent,
};
use crate::models::{ChatRequest, ChatRole, ContentPart, MessageContent};

/// One piece of generated output
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    /// Non-text output (function calls, inline data); relayed sessions drop these
    Data(serde_json::Value),
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, GenerationError>> + Send>>;

/// A started generation: the model actually serving it plus its fragments
pub struct Generation {
    pub model: String,
    pub fragments: FragmentStream,
}

/// Failure of the generation source, before or during iteration
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Error getting response from Gemini: {0}")]
    Upstream(#[from] LlmError),

    #[error("Generation failed: {0}")]
    Stream(String),

    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),
}

/// Produces fragments for a conversation. Streams are not restartable.
#[async_trait]
pub trait GenerationSource: Send + Sync {
    async fn stream(&self, request: &ChatRequest) -> Result<Generation, GenerationError>;
}

/// Run a generation to the end and concatenate its text.
///
/// Returns `(model, text)`.
pub async fn collect_text(
    source: &dyn GenerationSource,
    request: &ChatRequest,
) -> Result<(String, String), GenerationError> {
    let Generation {
        model,
        mut fragments,
    } = source.stream(request).await?;

    let mut text = String::new();
    while let Some(fragment) = fragments.next().await {
        if let Fragment::Text(piece) = fragment? {
            text.push_str(&piece);
        }
    }
    Ok((model, text))
}

/// Default model per request kind, used when the client sends no hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefaults {
    pub text: String,
    pub multimodal: String,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            text: "gemini-2.0-flash".to_string(),
            multimodal: "gemini-2.0-flash".to_string(),
        }
    }
}

/// [`GenerationSource`] backed by the Gemini streaming client
pub struct GeminiSource {
    client: GeminiClient,
    defaults: ModelDefaults,
    generation: GenerationConfig,
    attachment_base_url: Option<String>,
}

impl GeminiSource {
    pub fn new(
        client: GeminiClient,
        defaults: ModelDefaults,
        generation: GenerationConfig,
        attachment_base_url: Option<String>,
    ) -> Self {
        Self {
            client,
            defaults,
            generation,
            attachment_base_url,
        }
    }

    fn model_for(&self, request: &ChatRequest) -> GeminiModel {
        let fallback = if request.is_multimodal() {
            &self.defaults.multimodal
        } else {
            &self.defaults.text
        };
        GeminiModel::from(request.model_hint().unwrap_or(fallback))
    }
}

#[async_trait]
impl GenerationSource for GeminiSource {
    async fn stream(&self, request: &ChatRequest) -> Result<Generation, GenerationError> {
        let model = self.model_for(request);
        let generate = to_generate_request(
            request,
            self.generation.clone(),
            self.attachment_base_url.as_deref(),
        )?;
        debug!(
            model = %model,
            messages = generate.messages.len(),
            multimodal = request.is_multimodal(),
            "starting Gemini stream"
        );

        let events = self.client.stream_generate(&model, generate).await?;
        let fragments = events.filter_map(|event| async move {
            match event {
                Ok(StreamEvent::ContentDelta { delta, .. }) => Some(Ok(match delta {
                    ContentDelta::TextDelta { text } => Fragment::Text(text),
                    ContentDelta::DataDelta { data } => Fragment::Data(data),
                })),
                Ok(StreamEvent::Error { error }) => Some(Err(GenerationError::Stream(error))),
                Ok(StreamEvent::MessageStart { .. }) | Ok(StreamEvent::MessageEnd { .. }) => None,
                Err(e) => Some(Err(GenerationError::Upstream(e))),
            }
        });

        Ok(Generation {
            model: model.as_str().to_string(),
            fragments: Box::pin(fragments),
        })
    }
}

/// Build the provider request for a chat request.
///
/// System messages become the system instruction; attachment references are
/// appended as image parts of the last user message.
pub fn to_generate_request(
    request: &ChatRequest,
    config: GenerationConfig,
    attachment_base_url: Option<&str>,
) -> Result<GenerateRequest, GenerationError> {
    let mut system = Vec::new();
    let mut messages = Vec::new();

    for message in request.conversation().messages() {
        let blocks = to_content_blocks(&message.content, attachment_base_url);
        let role = match message.role {
            ChatRole::System => {
                system.extend(blocks.into_iter().filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text),
                    ContentBlock::Image { .. } => None,
                }));
                continue;
            }
            ChatRole::User => MessageRole::User,
            ChatRole::Assistant => MessageRole::Assistant,
        };
        messages.push(Message {
            role,
            content: blocks,
        });
    }

    if !request.attachment_refs().is_empty() {
        let attachments = request
            .attachment_refs()
            .iter()
            .map(|reference| image_block(reference, attachment_base_url));

        match messages.iter_mut().rev().find(|m| m.role == MessageRole::User) {
            Some(last_user) => last_user.content.extend(attachments),
            None => messages.push(Message {
                role: MessageRole::User,
                content: attachments.collect(),
            }),
        }
    }

    if messages.is_empty() {
        return Err(GenerationError::InvalidConversation(
            "no user or assistant messages".to_string(),
        ));
    }

    Ok(GenerateRequest {
        messages,
        config,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
    })
}

fn to_content_blocks(content: &MessageContent, attachment_base_url: Option<&str>) -> Vec<ContentBlock> {
    match content {
        MessageContent::Text(text) => vec![ContentBlock::text(text.clone())],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => ContentBlock::text(text.clone()),
                ContentPart::ImageUrl { image_url } => image_block(image_url.url(), attachment_base_url),
            })
            .collect(),
    }
}

fn image_block(reference: &str, attachment_base_url: Option<&str>) -> ContentBlock {
    let uri = match attachment_base_url {
        Some(base) if reference.starts_with('/') => {
            format!("{}{}", base.trim_end_matches('/'), reference)
        }
        _ => reference.to_string(),
    };
    let mime_type = guess_mime_type(&uri);
    ContentBlock::image(uri, mime_type)
}

/// Content types `POST /upload` accepts
pub const UPLOAD_MIME_TYPES: [&str; 8] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// MIME type from the file extension, limited to the upload whitelist.
///
/// Unknown extensions are sent as JPEG; Gemini sniffs the actual bytes.
pub fn guess_mime_type(uri: &str) -> &'static str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "image/jpeg",
    }
}
