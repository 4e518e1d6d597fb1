//! Application Default Credentials (ADC) wrapper

use gcp_auth::AuthenticationManager as GcpAuthManager;

use crate::llm::core::error::LlmError;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Bearer tokens for Vertex AI, discovered through the standard ADC chain
/// (`GOOGLE_APPLICATION_CREDENTIALS`, gcloud user credentials, metadata server).
///
/// `gcp_auth` caches the token and refreshes it when it expires.
pub struct AuthenticationManager {
    inner: GcpAuthManager,
}

impl AuthenticationManager {
    /// Discover credentials. Fails when no credential source is available.
    pub async fn new() -> Result<Self, LlmError> {
        let inner = GcpAuthManager::new()
            .await
            .map_err(|e| LlmError::AuthenticationError(format!("Failed to initialize ADC: {}", e)))?;

        Ok(Self { inner })
    }

    pub async fn get_token(&self) -> Result<String, LlmError> {
        let token = self
            .inner
            .get_token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| LlmError::AuthenticationError(format!("Failed to get token: {}", e)))?;

        Ok(token.as_str().to_string())
    }
}
