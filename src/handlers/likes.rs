use actix_web::{get, post, web, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::models::{Liker, Video};
use crate::pagination::{PageQuery, Paginated};
use crate::responses;
use crate::AppState;

// Likes are idempotent toggles: the second request from the same user
// removes the first and reports the off-state.
#[post("/api/v1/likes/video/{videoId}")]
async fn toggle_video_like(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let video_id = path.into_inner();
    let exists = sqlx::query("SELECT id FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(&state.db_pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Video not found".to_string()));
    }

    let existing: Option<i32> =
        sqlx::query_scalar("SELECT id FROM likes WHERE video_id = $1 AND user_id = $2")
            .bind(video_id)
            .bind(user.0.id)
            .fetch_optional(&state.db_pool)
            .await?;

    if let Some(like_id) = existing {
        sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(like_id)
            .execute(&state.db_pool)
            .await?;
        let likes_count: i32 = sqlx::query_scalar(
            "UPDATE videos SET likes_count = GREATEST(likes_count - 1, 0) \
             WHERE id = $1 RETURNING likes_count",
        )
        .bind(video_id)
        .fetch_one(&state.db_pool)
        .await?;

        Ok(responses::ok(
            json!({ "isLiked": false, "likesCount": likes_count }),
            "Video unliked successfully",
        ))
    } else {
        sqlx::query("INSERT INTO likes (video_id, user_id) VALUES ($1, $2)")
            .bind(video_id)
            .bind(user.0.id)
            .execute(&state.db_pool)
            .await?;
        let likes_count: i32 = sqlx::query_scalar(
            "UPDATE videos SET likes_count = likes_count + 1 WHERE id = $1 RETURNING likes_count",
        )
        .bind(video_id)
        .fetch_one(&state.db_pool)
        .await?;

        Ok(responses::ok(
            json!({ "isLiked": true, "likesCount": likes_count }),
            "Video liked successfully",
        ))
    }
}

#[post("/api/v1/likes/comment/{commentId}")]
async fn toggle_comment_like(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let comment_id = path.into_inner();
    let exists = sqlx::query("SELECT id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&state.db_pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }

    let existing: Option<i32> =
        sqlx::query_scalar("SELECT id FROM likes WHERE comment_id = $1 AND user_id = $2")
            .bind(comment_id)
            .bind(user.0.id)
            .fetch_optional(&state.db_pool)
            .await?;

    if let Some(like_id) = existing {
        sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(like_id)
            .execute(&state.db_pool)
            .await?;

        Ok(responses::ok(
            json!({ "isLiked": false }),
            "Comment unliked successfully",
        ))
    } else {
        sqlx::query("INSERT INTO likes (comment_id, user_id) VALUES ($1, $2)")
            .bind(comment_id)
            .bind(user.0.id)
            .execute(&state.db_pool)
            .await?;

        Ok(responses::ok(
            json!({ "isLiked": true }),
            "Comment liked successfully",
        ))
    }
}

#[get("/api/v1/likes/video/{videoId}")]
async fn video_likes(
    path: web::Path<i32>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;
    let video_id = path.into_inner();
    let exists = sqlx::query("SELECT id FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(&state.db_pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Video not found".to_string()));
    }

    let likers = sqlx::query_as::<_, Liker>(
        "SELECT u.id AS user_id, u.username, u.fullname, u.avatar, l.created_at AS liked_at \
         FROM likes l JOIN users u ON u.id = l.user_id \
         WHERE l.video_id = $1 ORDER BY l.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(video_id)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE video_id = $1")
        .bind(video_id)
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        Paginated::new(likers, total, &pq),
        "Video likes fetched successfully",
    ))
}

#[get("/api/v1/likes/video/{videoId}/status")]
async fn video_like_status(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let is_liked: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE video_id = $1 AND user_id = $2)",
    )
    .bind(path.into_inner())
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        json!({ "isLiked": is_liked }),
        "Like status fetched successfully",
    ))
}

#[get("/api/v1/likes/videos")]
async fn liked_videos(
    user: AuthUser,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;

    let videos = sqlx::query_as::<_, Video>(
        "SELECT v.* FROM videos v JOIN likes l ON l.video_id = v.id \
         WHERE l.user_id = $1 ORDER BY l.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.0.id)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM likes WHERE user_id = $1 AND video_id IS NOT NULL",
    )
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(videos, total, &pq),
        "Liked videos fetched successfully",
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(toggle_video_like)
        .service(toggle_comment_like)
        .service(liked_videos)
        .service(video_like_status)
        .service(video_likes);
}
