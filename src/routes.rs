// Route definitions

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use warp::ws::Ws;
use warp::Filter;

use crate::config::RelayConfig;
use crate::handlers;
use crate::relay::Gateway;
use crate::source::GenerationSource;

pub fn configure_routes(
    gateway: Gateway,
    source: Arc<dyn GenerationSource>,
    config: &RelayConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let started_at = Utc::now();

    // GET /ws
    let socket = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::any().map(move || gateway.clone()))
        .map(|ws: Ws, gateway: Gateway| {
            ws.on_upgrade(move |socket| handlers::run_socket(socket, gateway))
        });

    // GET /api/health
    let health = warp::path!("api" / "health")
        .and(warp::get())
        .and(warp::any().map(move || started_at))
        .and_then(handlers::health_handler);

    // POST /chat
    let chat = warp::path("chat")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(warp::any().map(move || source.clone()))
        .and_then(handlers::chat_handler);

    let cors = warp::cors()
        .allow_origins(config.allowed_origins.iter().map(String::as_str))
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    let uploads = upload_routes(config.upload_dir.clone(), config.max_upload_bytes);

    socket.or(health).or(chat).or(uploads).with(cors)
}

/// `POST /upload` stores into `dir`; `GET /uploads/<name>` serves it back.
pub fn upload_routes(
    dir: PathBuf,
    max_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let store_dir = dir.clone();
    let upload = warp::path("upload")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_bytes))
        .and(warp::any().map(move || store_dir.clone()))
        .and_then(handlers::upload_handler);

    let files = warp::path("uploads").and(warp::get()).and(warp::fs::dir(dir));

    upload.or(files)
}
