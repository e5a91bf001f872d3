use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

pub mod channels;
pub mod comments;
pub mod likes;
pub mod playlists;
pub mod search;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod videos;

use crate::responses;

#[get("/api/v1/healthCheck")]
async fn health_check() -> impl Responder {
    responses::ok(json!({ "status": "running" }), "OK")
}

// Default service: unmatched routes get the same structured shape as every
// other error.
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "statusCode": 404,
        "message": "Route not found",
    }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check);
    users::configure(cfg);
    channels::configure(cfg);
    videos::configure(cfg);
    comments::configure(cfg);
    likes::configure(cfg);
    subscriptions::configure(cfg);
    search::configure(cfg);
    playlists::configure(cfg);
    tweets::configure(cfg);
}
