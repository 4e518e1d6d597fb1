// GET /api/health handler

use chrono::{DateTime, Utc};
use std::convert::Infallible;

use crate::models::HealthReply;

pub async fn health_handler(started_at: DateTime<Utc>) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&HealthReply {
        message: "Welcome to Agent Chat API".to_string(),
        started_at,
    }))
}
