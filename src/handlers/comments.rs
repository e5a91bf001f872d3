use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::ApiError;
use crate::models::{Comment, CommentRequest, CommentWithMeta};
use crate::pagination::{PageQuery, Paginated};
use crate::responses;
use crate::AppState;

const COMMENT_META_COLUMNS: &str =
    "c.id, c.content, c.video_id, c.owner_id, c.parent_id, c.created_at, \
     (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id) AS likes_count, \
     (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id) AS replies_count, \
     EXISTS(SELECT 1 FROM likes l WHERE l.comment_id = c.id AND l.user_id = $2) AS is_liked_by_user";

async fn load_comment(pool: &sqlx::PgPool, comment_id: i32) -> Result<Comment, ApiError> {
    sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))
}

#[post("/api/v1/videos/{videoId}/comments")]
async fn add_comment(
    user: AuthUser,
    path: web::Path<i32>,
    req: web::Json<CommentRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment content is required".to_string()));
    }

    let state = state.lock().await;
    let video_id = path.into_inner();
    let exists = sqlx::query("SELECT id FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(&state.db_pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Video not found".to_string()));
    }

    let comment = sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (content, video_id, owner_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&content)
    .bind(video_id)
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::created(comment, "Comment added successfully"))
}

#[get("/api/v1/videos/{videoId}/comments")]
async fn video_comments(
    viewer: MaybeAuthUser,
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

    // Only top-level comments are paginated; replies hang off their parent.
    let comments = sqlx::query_as::<_, CommentWithMeta>(&format!(
        "SELECT {} FROM comments c \
         WHERE c.video_id = $1 AND c.parent_id IS NULL \
         ORDER BY c.created_at DESC LIMIT $3 OFFSET $4",
        COMMENT_META_COLUMNS
    ))
    .bind(video_id)
    .bind(viewer.user_id())
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM comments WHERE video_id = $1 AND parent_id IS NULL",
    )
    .bind(video_id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(comments, total, &pq),
        "Video comments fetched successfully",
    ))
}

#[put("/api/v1/comments/{commentId}")]
async fn update_comment(
    user: AuthUser,
    path: web::Path<i32>,
    req: web::Json<CommentRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment content is required".to_string()));
    }

    let state = state.lock().await;
    let comment = load_comment(&state.db_pool, path.into_inner()).await?;
    if comment.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only update your own comments".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Comment>(
        "UPDATE comments SET content = $1 WHERE id = $2 RETURNING *",
    )
    .bind(&content)
    .bind(comment.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(updated, "Comment updated successfully"))
}

#[delete("/api/v1/comments/{commentId}")]
async fn delete_comment(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let comment = load_comment(&state.db_pool, path.into_inner()).await?;
    if comment.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only delete your own comments".to_string(),
        ));
    }

    // FK cascade removes the replies and every like on the comment and on
    // its replies.
    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment.id)
        .execute(&state.db_pool)
        .await?;

    Ok(responses::ok(json!(null), "Comment deleted successfully"))
}

#[post("/api/v1/comments/{commentId}/replies")]
async fn add_reply(
    user: AuthUser,
    path: web::Path<i32>,
    req: web::Json<CommentRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Reply content is required".to_string()));
    }

    let state = state.lock().await;
    let parent = load_comment(&state.db_pool, path.into_inner()).await?;

    let reply = sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (content, video_id, owner_id, parent_id) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&content)
    .bind(parent.video_id)
    .bind(user.0.id)
    .bind(parent.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::created(reply, "Reply added successfully"))
}

#[get("/api/v1/comments/{commentId}/replies")]
async fn comment_replies(
    viewer: MaybeAuthUser,
    path: web::Path<i32>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;
    let parent = load_comment(&state.db_pool, path.into_inner()).await?;

    // Replies read oldest-first, unlike top-level comments.
    let replies = sqlx::query_as::<_, CommentWithMeta>(&format!(
        "SELECT {} FROM comments c \
         WHERE c.parent_id = $1 \
         ORDER BY c.created_at ASC LIMIT $3 OFFSET $4",
        COMMENT_META_COLUMNS
    ))
    .bind(parent.id)
    .bind(viewer.user_id())
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE parent_id = $1")
        .bind(parent.id)
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        Paginated::new(replies, total, &pq),
        "Comment replies fetched successfully",
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(add_comment)
        .service(video_comments)
        .service(update_comment)
        .service(delete_comment)
        .service(add_reply)
        .service(comment_replies);
}
