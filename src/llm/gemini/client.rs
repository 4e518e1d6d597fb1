//! Gemini client implementation

use futures::StreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder};
use std::fmt;
use uuid::Uuid;

use crate::llm::auth::AuthenticationManager;
use crate::llm::core::{
    error::LlmError,
    types::{GenerateRequest, LlmStream},
};

use super::mapper::{create_message_start, from_gemini_response, to_gemini_request};
use super::sse::parse_sse_stream;

const DEVELOPER_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini model identifiers
///
/// Unknown identifiers pass through untouched so clients can name any model
/// their endpoint serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeminiModel {
    Gemini20Flash,
    Gemini25Pro,
    Gemini25Flash,
    Gemini25FlashLite,
    Other(String),
}

impl GeminiModel {
    pub fn as_str(&self) -> &str {
        match self {
            GeminiModel::Gemini20Flash => "gemini-2.0-flash",
            GeminiModel::Gemini25Pro => "gemini-2.5-pro",
            GeminiModel::Gemini25Flash => "gemini-2.5-flash",
            GeminiModel::Gemini25FlashLite => "gemini-2.5-flash-lite",
            GeminiModel::Other(id) => id,
        }
    }
}

impl From<&str> for GeminiModel {
    fn from(id: &str) -> Self {
        match id.trim() {
            "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
            "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
            "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
            "gemini-2.5-flash-lite" => GeminiModel::Gemini25FlashLite,
            other => GeminiModel::Other(other.to_string()),
        }
    }
}

impl fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where requests go and how they authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeminiEndpoint {
    /// Gemini Developer API with an API key
    DeveloperApi { api_key: String },
    /// Vertex AI with Application Default Credentials
    VertexAi { project_id: String, location: String },
}

impl GeminiEndpoint {
    /// Streaming URL for `model` on this endpoint
    pub fn stream_url(&self, model: &GeminiModel) -> String {
        match self {
            GeminiEndpoint::DeveloperApi { .. } => format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                DEVELOPER_API_BASE,
                model.as_str()
            ),
            GeminiEndpoint::VertexAi {
                project_id,
                location,
            } => format!(
                "https://{}-aiplatform.googleapis.com/v1/projects/{}/locations/{}/publishers/google/models/{}:streamGenerateContent?alt=sse",
                location, project_id, location, model.as_str()
            ),
        }
    }
}

enum Credentials {
    ApiKey(String),
    Adc(AuthenticationManager),
}

/// Streaming client shared by every chat session
pub struct GeminiClient {
    http_client: Client,
    endpoint: GeminiEndpoint,
    credentials: Credentials,
}

impl GeminiClient {
    /// Create a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or, for Vertex AI,
    /// if no Application Default Credentials can be found.
    pub async fn new(endpoint: GeminiEndpoint) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| LlmError::HttpError {
                status: 0,
                body: format!("Failed to create HTTP client: {}", e),
            })?;

        let credentials = match &endpoint {
            GeminiEndpoint::DeveloperApi { api_key } => Credentials::ApiKey(api_key.clone()),
            GeminiEndpoint::VertexAi { .. } => Credentials::Adc(AuthenticationManager::new().await?),
        };

        Ok(Self {
            http_client,
            endpoint,
            credentials,
        })
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        Ok(match &self.credentials {
            Credentials::ApiKey(key) => request.header("x-goog-api-key", key.as_str()),
            Credentials::Adc(auth) => {
                let token = auth.get_token().await?;
                request.header("Authorization", format!("Bearer {}", token))
            }
        })
    }

    /// Start a streaming generation against `model`.
    ///
    /// Errors before the first byte (auth, HTTP status) are returned directly;
    /// later failures arrive as `Err` items or `StreamEvent::Error` in the stream.
    pub async fn stream_generate(
        &self,
        model: &GeminiModel,
        request: GenerateRequest,
    ) -> Result<LlmStream, LlmError> {
        let gemini_request = to_gemini_request(request);

        let url = self.endpoint.stream_url(model);
        let response = self
            .authorize(self.http_client.post(&url))
            .await?
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(
                status.as_u16(),
                retry_after.as_deref(),
                body,
            ));
        }

        let sse_stream = parse_sse_stream(Box::pin(response.bytes_stream()));

        let start = create_message_start(Uuid::new_v4().to_string());
        let mut part_index = 0;
        let events = sse_stream.flat_map(move |result| {
            let batch = match result {
                Ok(chunk) => from_gemini_response(chunk, &mut part_index)
                    .into_iter()
                    .map(Ok)
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            };
            futures::stream::iter(batch)
        });

        Ok(Box::pin(futures::stream::iter([Ok(start)]).chain(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_model_round_trips_known_ids() {
        for id in [
            "gemini-2.0-flash",
            "gemini-2.5-pro",
            "gemini-2.5-flash",
            "gemini-2.5-flash-lite",
        ] {
            let model = GeminiModel::from(id);
            assert!(!matches!(model, GeminiModel::Other(_)), "{id} should be known");
            assert_eq!(model.as_str(), id);
        }
    }

    #[test]
    fn test_gemini_model_passes_unknown_ids_through() {
        let model = GeminiModel::from("gemini-3.0-ultra");
        assert_eq!(model, GeminiModel::Other("gemini-3.0-ultra".to_string()));
        assert_eq!(model.to_string(), "gemini-3.0-ultra");
    }

    #[test]
    fn test_vertex_stream_url() {
        let endpoint = GeminiEndpoint::VertexAi {
            project_id: "my-project".to_string(),
            location: "us-central1".to_string(),
        };
        let url = endpoint.stream_url(&GeminiModel::Gemini25Flash);

        assert!(url.starts_with("https://us-central1-aiplatform.googleapis.com/v1/projects/my-project/"));
        assert!(url.contains("publishers/google/models/gemini-2.5-flash:streamGenerateContent"));
        assert!(url.ends_with("alt=sse"));
    }

    #[test]
    fn test_developer_api_stream_url() {
        let endpoint = GeminiEndpoint::DeveloperApi {
            api_key: "secret".to_string(),
        };
        let url = endpoint.stream_url(&GeminiModel::Gemini20Flash);

        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:streamGenerateContent?alt=sse"
        );
        assert!(!url.contains("secret"));
    }
}
