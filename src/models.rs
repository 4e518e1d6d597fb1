// Wire types: conversations, inbound/outbound socket events, HTTP bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

// Conversation

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Either a bare string or an ordered list of typed parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Accepts both `"image_url": "https://..."` and `"image_url": {"url": "https://..."}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ImageUrl {
    Url(String),
    Object { url: String },
}

impl ImageUrl {
    pub fn url(&self) -> &str {
        match self {
            ImageUrl::Url(url) | ImageUrl::Object { url } => url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn text(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn has_non_text_parts(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts
                .iter()
                .any(|part| !matches!(part, ContentPart::Text { .. })),
        }
    }

    fn is_blank(&self) -> bool {
        match &self.content {
            MessageContent::Text(text) => text.trim().is_empty(),
            MessageContent::Parts(parts) => parts.iter().all(|part| match part {
                ContentPart::Text { text } => text.trim().is_empty(),
                ContentPart::ImageUrl { image_url } => image_url.url().trim().is_empty(),
            }),
        }
    }
}

/// Ordered messages handed to the generation source; never mutated afterwards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct Conversation(Vec<ChatMessage>);

impl Conversation {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    pub fn has_non_text_parts(&self) -> bool {
        self.0.iter().any(ChatMessage::has_non_text_parts)
    }

    /// Reject conversations the model cannot answer.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.0.is_empty() {
            return Err(RelayError::Protocol("conversation has no messages".to_string()));
        }
        if self.0.iter().all(|m| m.role == ChatRole::System) {
            return Err(RelayError::Protocol(
                "conversation has no user or assistant messages".to_string(),
            ));
        }
        if let Some(position) = self.0.iter().position(ChatMessage::is_blank) {
            return Err(RelayError::Protocol(format!(
                "message {} has empty content",
                position
            )));
        }
        Ok(())
    }
}

// Inbound socket events

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEvent {
    Generate {
        messages: Conversation,
        #[serde(default)]
        model: Option<String>,
    },
    GenerateMultimodal {
        messages: Conversation,
        #[serde(default, rename = "attachmentRefs", alias = "fileUrls")]
        attachment_refs: Vec<String>,
        #[serde(default)]
        model: Option<String>,
    },
}

impl InboundEvent {
    /// Parse one JSON text frame.
    pub fn parse(frame: &str) -> Result<Self, RelayError> {
        serde_json::from_str(frame)
            .map_err(|e| RelayError::Protocol(format!("malformed event: {}", e)))
    }
}

/// A validated generation request, resolved once at entry
#[derive(Debug, Clone, PartialEq)]
pub enum ChatRequest {
    Text(TextRequest),
    Multimodal(MultimodalRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub conversation: Conversation,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultimodalRequest {
    pub conversation: Conversation,
    pub attachment_refs: Vec<String>,
    pub model: Option<String>,
}

impl ChatRequest {
    /// Request from a plain `generate` payload; image parts still make it multimodal.
    pub fn new(conversation: Conversation, model: Option<String>) -> Result<Self, RelayError> {
        let multimodal = conversation.has_non_text_parts();
        Self::resolve(conversation, Vec::new(), model, multimodal)
    }

    /// Validate and pick the variant.
    ///
    /// `generate-multimodal` is always multimodal, with or without attachments.
    fn resolve(
        conversation: Conversation,
        attachment_refs: Vec<String>,
        model: Option<String>,
        multimodal: bool,
    ) -> Result<Self, RelayError> {
        conversation.validate()?;
        if attachment_refs.iter().any(|r| r.trim().is_empty()) {
            return Err(RelayError::Protocol("empty attachment reference".to_string()));
        }
        let model = model.filter(|m| !m.trim().is_empty());

        if multimodal {
            Ok(ChatRequest::Multimodal(MultimodalRequest {
                conversation,
                attachment_refs,
                model,
            }))
        } else {
            Ok(ChatRequest::Text(TextRequest {
                conversation,
                model,
            }))
        }
    }

    pub fn conversation(&self) -> &Conversation {
        match self {
            ChatRequest::Text(request) => &request.conversation,
            ChatRequest::Multimodal(request) => &request.conversation,
        }
    }

    pub fn model_hint(&self) -> Option<&str> {
        match self {
            ChatRequest::Text(request) => request.model.as_deref(),
            ChatRequest::Multimodal(request) => request.model.as_deref(),
        }
    }

    pub fn attachment_refs(&self) -> &[String] {
        match self {
            ChatRequest::Text(_) => &[],
            ChatRequest::Multimodal(request) => &request.attachment_refs,
        }
    }

    pub fn is_multimodal(&self) -> bool {
        matches!(self, ChatRequest::Multimodal(_))
    }
}

impl TryFrom<InboundEvent> for ChatRequest {
    type Error = RelayError;

    fn try_from(event: InboundEvent) -> Result<Self, Self::Error> {
        match event {
            InboundEvent::Generate { messages, model } => Self::new(messages, model),
            InboundEvent::GenerateMultimodal {
                messages,
                attachment_refs,
                model,
            } => Self::resolve(messages, attachment_refs, model, true),
        }
    }
}

// Outbound socket events

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    Processing,
    Generating,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Start,
    Token { value: String },
    Heartbeat { status: HeartbeatStatus },
    Complete { status: CompletionStatus, model: String },
    Error { status: CompletionStatus, message: String },
}

impl OutboundEvent {
    pub fn token(value: impl Into<String>) -> Self {
        OutboundEvent::Token {
            value: value.into(),
        }
    }

    pub fn heartbeat(status: HeartbeatStatus) -> Self {
        OutboundEvent::Heartbeat { status }
    }

    pub fn complete(model: impl Into<String>) -> Self {
        OutboundEvent::Complete {
            status: CompletionStatus::Success,
            model: model.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundEvent::Error {
            status: CompletionStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboundEvent::Complete { .. } | OutboundEvent::Error { .. })
    }

    /// JSON text frame for the socket
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// HTTP bodies

#[derive(Debug, Clone, Deserialize)]
pub struct ChatBody {
    pub messages: Conversation,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// `POST /upload` response; `url` is what clients pass back as an attachment ref
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadReply {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReply {
    pub message: String,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_generate_event() {
        let frame = json!({
            "type": "generate",
            "messages": [{"role": "user", "content": "hi"}],
            "model": "gemini-2.5-flash"
        })
        .to_string();

        let event = InboundEvent::parse(&frame).unwrap();
        let request = ChatRequest::try_from(event).unwrap();
        assert!(!request.is_multimodal());
        assert_eq!(request.model_hint(), Some("gemini-2.5-flash"));
        assert_eq!(request.conversation().messages().len(), 1);
    }

    #[test]
    fn test_parse_multimodal_event_with_legacy_field_name() {
        let frame = json!({
            "type": "generate-multimodal",
            "messages": [{"role": "user", "content": "what is in this picture?"}],
            "fileUrls": ["/uploads/cat.png"]
        })
        .to_string();

        let request = ChatRequest::try_from(InboundEvent::parse(&frame).unwrap()).unwrap();
        assert!(request.is_multimodal());
        assert_eq!(request.attachment_refs(), ["/uploads/cat.png".to_string()]);
        assert_eq!(request.model_hint(), None);
    }

    #[test]
    fn test_image_parts_make_text_event_multimodal() {
        let frame = json!({
            "type": "generate",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "describe"},
                    {"type": "image_url", "image_url": {"url": "https://example.com/a.png"}}
                ]
            }]
        })
        .to_string();

        let request = ChatRequest::try_from(InboundEvent::parse(&frame).unwrap()).unwrap();
        assert!(request.is_multimodal());
        assert!(request.attachment_refs().is_empty());
    }

    #[test]
    fn test_image_url_accepts_bare_string() {
        let part: ContentPart =
            serde_json::from_value(json!({"type": "image_url", "image_url": "gs://b/x.jpg"})).unwrap();
        match part {
            ContentPart::ImageUrl { image_url } => assert_eq!(image_url.url(), "gs://b/x.jpg"),
            other => panic!("expected image part, got {other:?}"),
        }
    }

    #[test]
    fn test_multimodal_event_without_attachments_stays_multimodal() {
        let frame = json!({
            "type": "generate-multimodal",
            "messages": [{"role": "user", "content": "just text"}],
            "attachmentRefs": []
        })
        .to_string();

        let request = ChatRequest::try_from(InboundEvent::parse(&frame).unwrap()).unwrap();
        assert!(request.is_multimodal());
        assert!(request.attachment_refs().is_empty());
    }

    #[test]
    fn test_text_event_without_images_is_text() {
        let request = ChatRequest::try_from(InboundEvent::parse(&generate_frame()).unwrap()).unwrap();
        assert_eq!(
            request,
            ChatRequest::Text(TextRequest {
                conversation: Conversation::new(vec![ChatMessage::text(ChatRole::User, "hi")]),
                model: None,
            })
        );
    }

    fn generate_frame() -> String {
        json!({"type": "generate", "messages": [{"role": "user", "content": "hi"}]}).to_string()
    }

    #[test]
    fn test_unknown_event_type_is_protocol_misuse() {
        let err = InboundEvent::parse(r#"{"type":"summon","messages":[]}"#).unwrap_err();
        assert!(matches!(err, RelayError::Protocol(_)));
    }

    #[test]
    fn test_empty_conversation_is_rejected() {
        let event = InboundEvent::parse(r#"{"type":"generate","messages":[]}"#).unwrap();
        assert!(matches!(ChatRequest::try_from(event), Err(RelayError::Protocol(_))));
    }

    #[test]
    fn test_system_only_conversation_is_rejected() {
        let conversation = Conversation::new(vec![ChatMessage::text(ChatRole::System, "be nice")]);
        assert!(ChatRequest::new(conversation, None).is_err());
    }

    #[test]
    fn test_blank_message_is_rejected() {
        let conversation = Conversation::new(vec![ChatMessage::text(ChatRole::User, "   ")]);
        let err = conversation.validate().unwrap_err();
        assert!(err.to_string().contains("message 0"));
    }

    #[test]
    fn test_blank_model_hint_is_dropped() {
        let conversation = Conversation::new(vec![ChatMessage::text(ChatRole::User, "hi")]);
        let request = ChatRequest::new(conversation, Some(" ".to_string())).unwrap();
        assert_eq!(request.model_hint(), None);
    }

    #[test]
    fn test_outbound_wire_format() {
        assert_eq!(
            serde_json::to_value(OutboundEvent::Start).unwrap(),
            json!({"type": "start"})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::token("He")).unwrap(),
            json!({"type": "token", "value": "He"})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::heartbeat(HeartbeatStatus::Generating)).unwrap(),
            json!({"type": "heartbeat", "status": "generating"})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::complete("gemini-2.0-flash")).unwrap(),
            json!({"type": "complete", "status": "success", "model": "gemini-2.0-flash"})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::error("boom")).unwrap(),
            json!({"type": "error", "status": "error", "message": "boom"})
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(OutboundEvent::complete("m").is_terminal());
        assert!(OutboundEvent::error("e").is_terminal());
        assert!(!OutboundEvent::Start.is_terminal());
        assert!(!OutboundEvent::token("x").is_terminal());
    }
}
