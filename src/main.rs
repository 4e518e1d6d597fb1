use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use chat_relay::config::RelayConfig;
use chat_relay::llm::GeminiClient;
use chat_relay::logging::init_logging;
use chat_relay::relay::Gateway;
use chat_relay::routes::configure_routes;
use chat_relay::source::{GeminiSource, GenerationSource};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_logging("info");

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = match GeminiClient::new(config.endpoint.clone()).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to create Gemini client");
            return ExitCode::FAILURE;
        }
    };

    let source: Arc<dyn GenerationSource> = Arc::new(GeminiSource::new(
        client,
        config.models.clone(),
        config.generation.clone(),
        config.attachment_base_url.clone(),
    ));
    let gateway = Gateway::new(source.clone(), config.session.clone());
    let routes = configure_routes(gateway, source, &config);

    let addr = config.socket_addr();
    info!(%addr, model = %config.models.text, "starting chat relay");
    warp::serve(routes).run(addr).await;
    ExitCode::SUCCESS
}
