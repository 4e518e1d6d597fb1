//! Mapping between the provider-neutral types and Gemini wire types

use crate::llm::core::{
    config::GenerationConfig,
    types::{
        ContentBlock, ContentDelta, FinishReason, GenerateRequest, Message, MessageMetadata,
        MessageRole, StreamEvent, UsageMetadata,
    },
};

use super::types::{
    Content, FileData, GeminiGenerationConfig, GenerateContentRequest, GenerateContentResponse,
    Part, SystemInstruction,
};

pub fn to_gemini_request(request: GenerateRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: request.messages.into_iter().map(to_gemini_content).collect(),
        system_instruction: request.system.map(|s| SystemInstruction {
            parts: vec![Part::Text { text: s }],
        }),
        generation_config: Some(to_gemini_generation_config(request.config)),
    }
}

fn to_gemini_content(message: Message) -> Content {
    let role = match message.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "model",
    };

    Content {
        role: role.to_string(),
        parts: message.content.into_iter().map(to_gemini_part).collect(),
    }
}

fn to_gemini_part(block: ContentBlock) -> Part {
    match block {
        ContentBlock::Text { text } => Part::Text { text },
        ContentBlock::Image { uri, mime_type } => Part::FileData {
            file_data: FileData {
                mime_type,
                file_uri: uri,
            },
        },
    }
}

fn to_gemini_generation_config(config: GenerationConfig) -> GeminiGenerationConfig {
    GeminiGenerationConfig {
        max_output_tokens: Some(config.max_tokens),
        temperature: config.temperature,
        top_p: config.top_p,
    }
}

/// Convert one streamed Gemini chunk into stream events.
///
/// Only the first candidate is used. `index` counts content parts across the
/// whole response so consumers can tell parts apart.
pub fn from_gemini_response(
    response: GenerateContentResponse,
    index: &mut usize,
) -> Vec<StreamEvent> {
    if let Some(error) = response.error {
        let code = if error.status.is_empty() {
            error.code.to_string()
        } else {
            error.status
        };
        return vec![StreamEvent::Error {
            error: format!("{}: {}", code, error.message),
        }];
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        // No candidates at all means the prompt was rejected up front
        return match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => vec![StreamEvent::Error {
                error: format!("Prompt blocked: {}", reason),
            }],
            None => Vec::new(),
        };
    };

    let mut events = Vec::new();
    for part in candidate.content.parts {
        let delta = match part {
            Part::Text { text } => ContentDelta::TextDelta { text },
            other => ContentDelta::DataDelta {
                data: serde_json::to_value(&other).unwrap_or(serde_json::Value::Null),
            },
        };
        events.push(StreamEvent::ContentDelta {
            index: *index,
            delta,
        });
        *index += 1;
    }

    if let Some(finish_reason) = candidate.finish_reason {
        let usage = response
            .usage_metadata
            .map(|u| UsageMetadata {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        events.push(StreamEvent::MessageEnd {
            finish_reason: map_finish_reason(&finish_reason),
            usage,
        });
    }

    events
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::MaxTokens,
        "SAFETY" => FinishReason::Safety,
        other => FinishReason::Other(other.to_string()),
    }
}

pub fn create_message_start(message_id: String) -> StreamEvent {
    StreamEvent::MessageStart {
        message: MessageMetadata {
            id: message_id,
            role: MessageRole::Assistant,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::gemini::types::{Candidate, ErrorBody, PromptFeedback};

    fn text_chunk(text: &str, finish_reason: Option<&str>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content {
                    role: "model".to_string(),
                    parts: vec![Part::Text {
                        text: text.to_string(),
                    }],
                },
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage_metadata: None,
            prompt_feedback: None,
            error: None,
        }
    }

    #[test]
    fn test_assistant_maps_to_model_role() {
        let content = to_gemini_content(Message::assistant("Hi there"));
        assert_eq!(content.role, "model");
    }

    #[test]
    fn test_image_block_maps_to_file_data() {
        let message = Message {
            role: MessageRole::User,
            content: vec![
                ContentBlock::text("Describe this"),
                ContentBlock::image("gs://bucket/cat.webp", "image/webp"),
            ],
        };
        let content = to_gemini_content(message);
        assert_eq!(content.parts.len(), 2);
        match &content.parts[1] {
            Part::FileData { file_data } => {
                assert_eq!(file_data.file_uri, "gs://bucket/cat.webp");
                assert_eq!(file_data.mime_type, "image/webp");
            }
            other => panic!("Expected file data part, got {other:?}"),
        }
    }

    #[test]
    fn test_system_prompt_becomes_instruction() {
        let request = GenerateRequest {
            messages: vec![Message::user("Hello")],
            config: GenerationConfig::new(256).with_temperature(0.7),
            system: Some("Be brief".to_string()),
        };
        let gemini_request = to_gemini_request(request);
        assert!(gemini_request.system_instruction.is_some());
        let config = gemini_request.generation_config.unwrap();
        assert_eq!(config.max_output_tokens, Some(256));
        assert_eq!(config.temperature, Some(0.7));
    }

    #[test]
    fn test_text_chunk_becomes_text_delta() {
        let mut index = 0;
        let events = from_gemini_response(text_chunk("Hello!", None), &mut index);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::ContentDelta {
                delta: ContentDelta::TextDelta { text },
                ..
            } => assert_eq!(text, "Hello!"),
            other => panic!("Expected text delta, got {other:?}"),
        }
        assert_eq!(index, 1);
    }

    #[test]
    fn test_finish_reason_appends_message_end() {
        let mut index = 0;
        let events = from_gemini_response(text_chunk("Done", Some("MAX_TOKENS")), &mut index);
        assert_eq!(events.len(), 2);
        match &events[1] {
            StreamEvent::MessageEnd { finish_reason, usage } => {
                assert_eq!(*finish_reason, FinishReason::MaxTokens);
                assert_eq!(usage.total_tokens, 0);
            }
            other => panic!("Expected message end, got {other:?}"),
        }
    }

    #[test]
    fn test_function_call_becomes_data_delta() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"functionCall":{"name":"lookup","args":{"q":"x"}}}]}}]}"#,
        )
        .unwrap();
        let mut index = 0;
        let events = from_gemini_response(response, &mut index);
        match &events[0] {
            StreamEvent::ContentDelta {
                delta: ContentDelta::DataDelta { data },
                ..
            } => assert_eq!(data["functionCall"]["name"], "lookup"),
            other => panic!("Expected data delta, got {other:?}"),
        }
    }

    #[test]
    fn test_error_chunk_becomes_error_event() {
        let response = GenerateContentResponse {
            candidates: Vec::new(),
            usage_metadata: None,
            prompt_feedback: None,
            error: Some(ErrorBody {
                code: 429,
                message: "Quota exceeded".to_string(),
                status: "RESOURCE_EXHAUSTED".to_string(),
            }),
        };
        let mut index = 0;
        let events = from_gemini_response(response, &mut index);
        match &events[0] {
            StreamEvent::Error { error } => assert_eq!(error, "RESOURCE_EXHAUSTED: Quota exceeded"),
            other => panic!("Expected error event, got {other:?}"),
        }
    }

    #[test]
    fn test_blocked_prompt_becomes_error_event() {
        let response = GenerateContentResponse {
            candidates: Vec::new(),
            usage_metadata: None,
            prompt_feedback: Some(PromptFeedback {
                block_reason: Some("SAFETY".to_string()),
            }),
            error: None,
        };
        let mut index = 0;
        let events = from_gemini_response(response, &mut index);
        assert!(matches!(&events[0], StreamEvent::Error { error } if error.contains("SAFETY")));
    }

    #[test]
    fn test_map_finish_reason() {
        assert_eq!(map_finish_reason("STOP"), FinishReason::Stop);
        assert_eq!(map_finish_reason("SAFETY"), FinishReason::Safety);
        assert_eq!(
            map_finish_reason("RECITATION"),
            FinishReason::Other("RECITATION".to_string())
        );
    }
}
