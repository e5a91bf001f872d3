use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::models::{Channel, Subscription, User, Video};
use crate::pagination::{PageQuery, Paginated};
use crate::responses;
use crate::AppState;

#[post("/api/v1/subscriptions/subscribe/{channelId}")]
async fn subscribe(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let channel_id = path.into_inner();
    let exists = sqlx::query("SELECT id FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_optional(&state.db_pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Channel not found".to_string()));
    }

    let existing = sqlx::query(
        "SELECT id FROM subscriptions WHERE subscriber_id = $1 AND channel_id = $2",
    )
    .bind(user.0.id)
    .bind(channel_id)
    .fetch_optional(&state.db_pool)
    .await?;
    if existing.is_some() {
        return Err(ApiError::BadRequest(
            "Already subscribed to this channel".to_string(),
        ));
    }

    let subscription = sqlx::query_as::<_, Subscription>(
        "INSERT INTO subscriptions (subscriber_id, channel_id) VALUES ($1, $2) RETURNING *",
    )
    .bind(user.0.id)
    .bind(channel_id)
    .fetch_one(&state.db_pool)
    .await?;

    sqlx::query("UPDATE channels SET subscribers_count = subscribers_count + 1 WHERE id = $1")
        .bind(channel_id)
        .execute(&state.db_pool)
        .await?;

    Ok(responses::ok(subscription, "Subscribed to channel successfully"))
}

#[delete("/api/v1/subscriptions/unsubscribe/{channelId}")]
async fn unsubscribe(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let channel_id = path.into_inner();

    let deleted: Option<i32> = sqlx::query_scalar(
        "DELETE FROM subscriptions WHERE subscriber_id = $1 AND channel_id = $2 RETURNING id",
    )
    .bind(user.0.id)
    .bind(channel_id)
    .fetch_optional(&state.db_pool)
    .await?;
    if deleted.is_none() {
        return Err(ApiError::BadRequest(
            "Not subscribed to this channel".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE channels SET subscribers_count = GREATEST(subscribers_count - 1, 0) WHERE id = $1",
    )
    .bind(channel_id)
    .execute(&state.db_pool)
    .await?;

    Ok(responses::ok(
        json!(null),
        "Unsubscribed from channel successfully",
    ))
}

#[get("/api/v1/subscriptions/user-subscriptions")]
async fn user_subscriptions(
    user: AuthUser,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;

    let channels = sqlx::query_as::<_, Channel>(
        "SELECT c.* FROM channels c JOIN subscriptions s ON s.channel_id = c.id \
         WHERE s.subscriber_id = $1 ORDER BY s.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.0.id)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = $1")
        .bind(user.0.id)
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        Paginated::new(channels, total, &pq),
        "User subscriptions fetched successfully",
    ))
}

#[get("/api/v1/subscriptions/channel-subscribers/{channelId}")]
async fn channel_subscribers(
    path: web::Path<i32>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;
    let channel_id = path.into_inner();
    let exists = sqlx::query("SELECT id FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_optional(&state.db_pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Channel not found".to_string()));
    }

    let subscribers = sqlx::query_as::<_, User>(
        "SELECT u.id, u.username, u.email, u.fullname, u.avatar, u.cover_image, u.created_at \
         FROM users u JOIN subscriptions s ON s.subscriber_id = u.id \
         WHERE s.channel_id = $1 ORDER BY s.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(channel_id)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE channel_id = $1")
        .bind(channel_id)
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        Paginated::new(subscribers, total, &pq),
        "Channel subscribers fetched successfully",
    ))
}

#[get("/api/v1/subscriptions/status/{channelId}")]
async fn subscription_status(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let is_subscribed: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber_id = $1 AND channel_id = $2)",
    )
    .bind(user.0.id)
    .bind(path.into_inner())
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        json!({ "isSubscribed": is_subscribed }),
        "Subscription status fetched successfully",
    ))
}

#[get("/api/v1/subscriptions/feed")]
async fn subscription_feed(
    user: AuthUser,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;

    let videos = sqlx::query_as::<_, Video>(
        "SELECT v.* FROM videos v JOIN subscriptions s ON s.channel_id = v.channel_id \
         WHERE s.subscriber_id = $1 AND v.visibility = 'public' \
         ORDER BY v.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.0.id)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM videos v JOIN subscriptions s ON s.channel_id = v.channel_id \
         WHERE s.subscriber_id = $1 AND v.visibility = 'public'",
    )
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(videos, total, &pq),
        "Subscription feed fetched successfully",
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(subscribe)
        .service(unsubscribe)
        .service(user_subscriptions)
        .service(channel_subscribers)
        .service(subscription_status)
        .service(subscription_feed);
}
