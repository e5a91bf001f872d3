pub mod auth;
pub mod errors;
pub mod handlers;
pub mod media;
pub mod models;
pub mod pagination;
pub mod responses;
pub mod services;
pub mod video_utils;

use aws_sdk_s3::Client;
use sqlx::PgPool;

pub struct AppState {
    pub db_pool: PgPool,
    pub s3_client: Client,
}
