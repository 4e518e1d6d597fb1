// POST /chat handler: non-streaming generation

use std::convert::Infallible;
use std::sync::Arc;

use tracing::{info, warn};
use warp::http::StatusCode;
use warp::Reply;

use crate::models::{ChatBody, ChatReply, ChatRequest, ErrorDetail};
use crate::source::{collect_text, GenerationSource};

pub async fn chat_handler(
    body: ChatBody,
    source: Arc<dyn GenerationSource>,
) -> Result<warp::reply::Response, Infallible> {
    let request = match ChatRequest::new(body.messages, body.model) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected chat request");
            return Ok(detail(StatusCode::BAD_REQUEST, e.to_string()));
        }
    };

    match collect_text(source.as_ref(), &request).await {
        Ok((model, response)) => {
            info!(model = %model, chars = response.len(), "chat request complete");
            Ok(warp::reply::json(&ChatReply { response, model }).into_response())
        }
        Err(e) => {
            warn!(error = %e, "chat generation failed");
            Ok(detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn detail(status: StatusCode, detail: String) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(&ErrorDetail { detail }), status).into_response()
}
