use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::ApiError;
use crate::models::{Channel, User, Video};
use crate::pagination::{PageQuery, Paginated};
use crate::responses;
use crate::AppState;

const GLOBAL_SEARCH_LIMIT: i64 = 5;

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    category: Option<String>,
    #[serde(rename = "sortBy")]
    sort_by: Option<String>,
}

impl SearchParams {
    fn query(&self) -> Result<String, ApiError> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(String::from)
            .ok_or_else(|| ApiError::BadRequest("Search query is required".to_string()))
    }
}

fn like_pattern(q: &str) -> String {
    format!("%{}%", q)
}

const VIDEO_MATCH: &str = "visibility = 'public' AND (title ILIKE $1 OR description ILIKE $1 \
     OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE $1))";

#[get("/api/v1/search/videos")]
async fn search_videos(
    params: web::Query<SearchParams>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let q = params.query()?;
    let category = params.category.clone().filter(|c| c != "all");

    // "relevance" has no ranking backend; it falls back to newest-first.
    let order = match params.sort_by.as_deref() {
        Some("views") => "views DESC",
        _ => "created_at DESC",
    };

    let state = state.lock().await;

    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT * FROM videos WHERE {} AND ($2::text IS NULL OR category = $2) \
         ORDER BY {} LIMIT $3 OFFSET $4",
        VIDEO_MATCH, order
    ))
    .bind(like_pattern(&q))
    .bind(&category)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM videos WHERE {} AND ($2::text IS NULL OR category = $2)",
        VIDEO_MATCH
    ))
    .bind(like_pattern(&q))
    .bind(&category)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(videos, total, &pq),
        "Videos search completed successfully",
    ))
}

const CHANNEL_MATCH: &str = "name ILIKE $1 OR handle ILIKE $1 OR description ILIKE $1";

#[get("/api/v1/search/channels")]
async fn search_channels(
    params: web::Query<SearchParams>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let q = params.query()?;
    let state = state.lock().await;

    let channels = sqlx::query_as::<_, Channel>(&format!(
        "SELECT * FROM channels WHERE {} ORDER BY subscribers_count DESC LIMIT $2 OFFSET $3",
        CHANNEL_MATCH
    ))
    .bind(like_pattern(&q))
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM channels WHERE {}", CHANNEL_MATCH))
            .bind(like_pattern(&q))
            .fetch_one(&state.db_pool)
            .await?;

    Ok(responses::ok(
        Paginated::new(channels, total, &pq),
        "Channels search completed successfully",
    ))
}

const USER_MATCH: &str = "username ILIKE $1 OR fullname ILIKE $1";
const USER_COLUMNS: &str = "id, username, email, fullname, avatar, cover_image, created_at";

#[get("/api/v1/search/users")]
async fn search_users(
    params: web::Query<SearchParams>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let q = params.query()?;
    let state = state.lock().await;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE {} ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        USER_COLUMNS, USER_MATCH
    ))
    .bind(like_pattern(&q))
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {}", USER_MATCH))
            .bind(like_pattern(&q))
            .fetch_one(&state.db_pool)
            .await?;

    Ok(responses::ok(
        Paginated::new(users, total, &pq),
        "Users search completed successfully",
    ))
}

#[get("/api/v1/search/global")]
async fn global_search(
    params: web::Query<SearchParams>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let q = params.query()?;
    let limit = pq.limit.unwrap_or(GLOBAL_SEARCH_LIMIT).clamp(1, 100);
    let state = state.lock().await;

    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT * FROM videos WHERE {} ORDER BY created_at DESC LIMIT $2",
        VIDEO_MATCH
    ))
    .bind(like_pattern(&q))
    .bind(limit)
    .fetch_all(&state.db_pool)
    .await?;

    let channels = sqlx::query_as::<_, Channel>(&format!(
        "SELECT * FROM channels WHERE {} ORDER BY subscribers_count DESC LIMIT $2",
        CHANNEL_MATCH
    ))
    .bind(like_pattern(&q))
    .bind(limit)
    .fetch_all(&state.db_pool)
    .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE {} ORDER BY created_at DESC LIMIT $2",
        USER_COLUMNS, USER_MATCH
    ))
    .bind(like_pattern(&q))
    .bind(limit)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(responses::ok(
        json!({
            "videos": videos,
            "channels": channels,
            "users": users,
            "query": q,
        }),
        "Global search completed successfully",
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(search_videos)
        .service(search_channels)
        .service(search_users)
        .service(global_search);
}
