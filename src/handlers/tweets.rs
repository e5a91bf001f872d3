use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::models::{Tweet, TweetRequest};
use crate::pagination::{PageQuery, Paginated};
use crate::responses;
use crate::AppState;

#[post("/api/v1/tweets")]
async fn add_tweet(
    user: AuthUser,
    req: web::Json<TweetRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Tweet content is required".to_string()));
    }

    let state = state.lock().await;
    let tweet = sqlx::query_as::<_, Tweet>(
        "INSERT INTO tweets (content, owner_id) VALUES ($1, $2) RETURNING *",
    )
    .bind(&content)
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::created(tweet, "Tweet added successfully"))
}

#[get("/api/v1/tweets")]
async fn list_tweets(
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;

    let tweets = sqlx::query_as::<_, Tweet>(
        "SELECT * FROM tweets ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tweets")
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        Paginated::new(tweets, total, &pq),
        "Tweets fetched successfully",
    ))
}

#[get("/api/v1/tweets/user/{userId}")]
async fn user_tweets(
    path: web::Path<i32>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let user_id = path.into_inner();
    let state = state.lock().await;

    let tweets = sqlx::query_as::<_, Tweet>(
        "SELECT * FROM tweets WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tweets WHERE owner_id = $1")
        .bind(user_id)
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        Paginated::new(tweets, total, &pq),
        "Tweets fetched successfully",
    ))
}

#[delete("/api/v1/tweets/{tweetId}")]
async fn delete_tweet(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let tweet = sqlx::query_as::<_, Tweet>("SELECT * FROM tweets WHERE id = $1")
        .bind(path.into_inner())
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tweet not found".to_string()))?;
    if tweet.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only delete your own tweets".to_string(),
        ));
    }

    sqlx::query("DELETE FROM tweets WHERE id = $1")
        .bind(tweet.id)
        .execute(&state.db_pool)
        .await?;

    Ok(responses::ok(json!(null), "Tweet deleted successfully"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(add_tweet)
        .service(list_tweets)
        .service(user_tweets)
        .service(delete_tweet);
}
