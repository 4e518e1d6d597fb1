//! Environment configuration
//!
//! Read once at startup (after `.env` is loaded). Empty variables count as unset.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::llm::{GeminiEndpoint, GenerationConfig};
use crate::relay::SessionSettings;
use crate::source::ModelDefaults;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";
const DEFAULT_LOCATION: &str = "us-central1";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no Gemini credentials: set GOOGLE_API_KEY or GCP_PROJECT_ID")]
    MissingCredentials,

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: IpAddr,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub endpoint: GeminiEndpoint,
    pub models: ModelDefaults,
    pub generation: GenerationConfig,
    pub attachment_base_url: Option<String>,
    pub session: SessionSettings,
    /// Where `POST /upload` stores files; served back under `/uploads/`
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let endpoint = match (get("GOOGLE_API_KEY"), get("GCP_PROJECT_ID")) {
            (Some(api_key), _) => GeminiEndpoint::DeveloperApi { api_key },
            (None, Some(project_id)) => GeminiEndpoint::VertexAi {
                project_id,
                location: get("GCP_LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            },
            (None, None) => return Err(ConfigError::MissingCredentials),
        };

        let defaults = ModelDefaults::default();
        let models = ModelDefaults {
            text: get("RELAY_DEFAULT_MODEL").unwrap_or(defaults.text),
            multimodal: get("RELAY_MULTIMODAL_MODEL").unwrap_or(defaults.multimodal),
        };

        let generation = GenerationConfig::new(parse(&get, "RELAY_MAX_OUTPUT_TOKENS", 2048)?)
            .with_temperature(parse(&get, "RELAY_TEMPERATURE", 0.7)?);

        let session = SessionSettings {
            start_delay: Duration::from_millis(parse(&get, "RELAY_START_DELAY_MS", 100)?),
            token_pacing: Duration::from_millis(parse(&get, "RELAY_TOKEN_PACING_MS", 10)?),
            heartbeat_interval: Duration::from_secs(parse(&get, "RELAY_HEARTBEAT_INTERVAL_SECS", 5)?),
            generating_every: parse(&get, "RELAY_GENERATING_EVERY", 20)?,
            recency_capacity: parse(&get, "RELAY_RECENCY_CAPACITY", 5)?,
        };
        if session.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "RELAY_HEARTBEAT_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let allowed_origins = get("RELAY_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            host: parse(&get, "RELAY_HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: parse(&get, "RELAY_PORT", 3030)?,
            allowed_origins,
            endpoint,
            models,
            generation,
            attachment_base_url: get("RELAY_ATTACHMENT_BASE_URL"),
            session,
            upload_dir: get("RELAY_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            max_upload_bytes: parse(&get, "RELAY_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<RelayConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_with_api_key() {
        let config = load(&[("GOOGLE_API_KEY", "key")]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3030");
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:5173", "http://127.0.0.1:5173"]
        );
        assert_eq!(config.models, ModelDefaults::default());
        assert_eq!(config.generation.max_tokens, 2048);
        assert_eq!(config.generation.temperature, Some(0.7));
        assert_eq!(config.session, SessionSettings::default());
        assert!(config.attachment_base_url.is_none());
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_api_key_wins_over_project() {
        let config = load(&[("GOOGLE_API_KEY", "key"), ("GCP_PROJECT_ID", "proj")]).unwrap();
        assert_eq!(
            config.endpoint,
            GeminiEndpoint::DeveloperApi {
                api_key: "key".to_string()
            }
        );
    }

    #[test]
    fn test_vertex_endpoint() {
        let config = load(&[("GCP_PROJECT_ID", "proj"), ("GCP_LOCATION", "europe-west4")]).unwrap();
        assert_eq!(
            config.endpoint,
            GeminiEndpoint::VertexAi {
                project_id: "proj".to_string(),
                location: "europe-west4".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_credentials() {
        let err = load(&[("GOOGLE_API_KEY", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GOOGLE_API_KEY", "key"),
            ("RELAY_HOST", "0.0.0.0"),
            ("RELAY_PORT", "8000"),
            ("RELAY_ALLOWED_ORIGINS", "https://chat.example.com, "),
            ("RELAY_TOKEN_PACING_MS", "0"),
            ("RELAY_GENERATING_EVERY", "7"),
            ("RELAY_UPLOAD_DIR", "/var/lib/relay/files"),
            ("RELAY_MAX_UPLOAD_BYTES", "2048"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(config.allowed_origins, vec!["https://chat.example.com"]);
        assert_eq!(config.session.token_pacing, Duration::ZERO);
        assert_eq!(config.session.generating_every, 7);
        assert_eq!(config.upload_dir, PathBuf::from("/var/lib/relay/files"));
        assert_eq!(config.max_upload_bytes, 2048);
    }

    #[test]
    fn test_invalid_number() {
        let err = load(&[("GOOGLE_API_KEY", "key"), ("RELAY_PORT", "http")]).unwrap_err();
        match err {
            ConfigError::Invalid { name, value } => {
                assert_eq!(name, "RELAY_PORT");
                assert_eq!(value, "http");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
