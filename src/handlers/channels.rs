use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::ApiError;
use crate::media;
use crate::models::{Channel, CreateChannelRequest, UpdateChannelRequest, Video, CATEGORIES};
use crate::pagination::{PageQuery, Paginated};
use crate::responses;
use crate::AppState;

const MAX_CHANNELS_PER_USER: i64 = 3;
const MAX_HANDLE_LENGTH: usize = 30;

fn valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LENGTH
        && handle
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn valid_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

async fn load_channel(pool: &sqlx::PgPool, channel_id: i32) -> Result<Channel, ApiError> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Channel not found".to_string()))
}

#[post("/api/v1/channels")]
async fn create_channel(
    user: AuthUser,
    req: web::Json<CreateChannelRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let name = req.name.trim().to_string();
    let handle = req.handle.trim().to_lowercase();
    if name.is_empty() || handle.is_empty() {
        return Err(ApiError::BadRequest(
            "Channel name and handle are required".to_string(),
        ));
    }
    if !valid_handle(&handle) {
        return Err(ApiError::BadRequest(
            "Channel handle may only contain letters, numbers, '_' and '-'".to_string(),
        ));
    }
    let category = req.category.clone().unwrap_or_else(|| "Other".to_string());
    if !valid_category(&category) {
        return Err(ApiError::BadRequest("Invalid category".to_string()));
    }

    let state = state.lock().await;

    let existing = sqlx::query("SELECT id FROM channels WHERE handle = $1")
        .bind(&handle)
        .fetch_optional(&state.db_pool)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Channel handle already exists".to_string()));
    }

    let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels WHERE owner_id = $1")
        .bind(user.0.id)
        .fetch_one(&state.db_pool)
        .await?;
    if owned >= MAX_CHANNELS_PER_USER {
        return Err(ApiError::BadRequest(
            "Maximum 3 channels allowed per user".to_string(),
        ));
    }

    let channel = sqlx::query_as::<_, Channel>(
        "INSERT INTO channels (name, handle, description, category, owner_id) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(&name)
    .bind(&handle)
    .bind(req.description.clone().unwrap_or_default())
    .bind(&category)
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::created(channel, "Channel created successfully"))
}

#[get("/api/v1/channels/my")]
async fn my_channels(
    user: AuthUser,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let channels = sqlx::query_as::<_, Channel>(
        "SELECT * FROM channels WHERE owner_id = $1 ORDER BY is_default DESC, created_at DESC",
    )
    .bind(user.0.id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(responses::ok(channels, "User channels fetched successfully"))
}

#[get("/api/v1/channels/handle/{handle}")]
async fn channel_by_handle(
    path: web::Path<String>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let handle = path.into_inner().to_lowercase();
    let state = state.lock().await;
    let channel = sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE handle = $1")
        .bind(&handle)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Channel not found".to_string()))?;

    Ok(responses::ok(channel, "Channel fetched successfully"))
}

#[get("/api/v1/channels/{channelId}")]
async fn channel_by_id(
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let channel = load_channel(&state.db_pool, path.into_inner()).await?;
    Ok(responses::ok(channel, "Channel fetched successfully"))
}

#[put("/api/v1/channels/{channelId}")]
async fn update_channel(
    user: AuthUser,
    path: web::Path<i32>,
    req: web::Json<UpdateChannelRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let channel = load_channel(&state.db_pool, path.into_inner()).await?;
    if channel.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only update your own channels".to_string(),
        ));
    }

    let name = req.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let description = req.description.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let category = req.category.as_deref().filter(|s| !s.is_empty());
    if let Some(cat) = category {
        if !valid_category(cat) {
            return Err(ApiError::BadRequest("Invalid category".to_string()));
        }
    }

    let updated = sqlx::query_as::<_, Channel>(
        "UPDATE channels SET name = COALESCE($1, name), \
         description = COALESCE($2, description), \
         category = COALESCE($3, category) \
         WHERE id = $4 RETURNING *",
    )
    .bind(name)
    .bind(description)
    .bind(category)
    .bind(channel.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(updated, "Channel updated successfully"))
}

#[put("/api/v1/channels/{channelId}/avatar")]
async fn update_channel_avatar(
    user: AuthUser,
    path: web::Path<i32>,
    payload: Multipart,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let staged = media::stage_multipart(payload).await?;
    let file = staged
        .files
        .get("avatar")
        .ok_or_else(|| ApiError::BadRequest("Avatar image is required".to_string()))?;

    let state = state.lock().await;
    let channel = load_channel(&state.db_pool, path.into_inner()).await?;
    if channel.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only update your own channels".to_string(),
        ));
    }

    let key = media::store_object(&state.s3_client, "channel-avatars", file).await?;
    let updated =
        sqlx::query_as::<_, Channel>("UPDATE channels SET avatar = $1 WHERE id = $2 RETURNING *")
            .bind(&key)
            .bind(channel.id)
            .fetch_one(&state.db_pool)
            .await?;

    Ok(responses::ok(updated, "Channel avatar updated successfully"))
}

#[put("/api/v1/channels/{channelId}/banner")]
async fn update_channel_banner(
    user: AuthUser,
    path: web::Path<i32>,
    payload: Multipart,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let staged = media::stage_multipart(payload).await?;
    let file = staged
        .files
        .get("banner")
        .ok_or_else(|| ApiError::BadRequest("Banner image is required".to_string()))?;

    let state = state.lock().await;
    let channel = load_channel(&state.db_pool, path.into_inner()).await?;
    if channel.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only update your own channels".to_string(),
        ));
    }

    let key = media::store_object(&state.s3_client, "banners", file).await?;
    let updated =
        sqlx::query_as::<_, Channel>("UPDATE channels SET banner = $1 WHERE id = $2 RETURNING *")
            .bind(&key)
            .bind(channel.id)
            .fetch_one(&state.db_pool)
            .await?;

    Ok(responses::ok(updated, "Channel banner updated successfully"))
}

#[delete("/api/v1/channels/{channelId}")]
async fn delete_channel(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let channel = load_channel(&state.db_pool, path.into_inner()).await?;
    if channel.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only delete your own channels".to_string(),
        ));
    }
    if channel.is_default {
        return Err(ApiError::BadRequest("Cannot delete default channel".to_string()));
    }

    let videos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE channel_id = $1")
        .bind(channel.id)
        .fetch_one(&state.db_pool)
        .await?;
    if videos > 0 {
        return Err(ApiError::BadRequest(
            "Cannot delete channel with existing videos. Please delete all videos first."
                .to_string(),
        ));
    }

    sqlx::query("DELETE FROM channels WHERE id = $1")
        .bind(channel.id)
        .execute(&state.db_pool)
        .await?;

    Ok(responses::ok(json!(null), "Channel deleted successfully"))
}

#[derive(Debug, Deserialize)]
struct VisibilityQuery {
    visibility: Option<String>,
}

#[get("/api/v1/channels/{channelId}/videos")]
async fn channel_videos(
    viewer: MaybeAuthUser,
    path: web::Path<i32>,
    pq: web::Query<PageQuery>,
    vq: web::Query<VisibilityQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;
    let channel = load_channel(&state.db_pool, path.into_inner()).await?;

    // Non-owners only ever see public videos; the owner may narrow to a
    // specific visibility or pass "all".
    let is_owner = viewer.user_id() == Some(channel.owner_id);
    let visibility_filter = if is_owner {
        match vq.visibility.as_deref().unwrap_or("public") {
            "all" => None,
            v => Some(v.to_string()),
        }
    } else {
        Some("public".to_string())
    };

    let videos = sqlx::query_as::<_, Video>(
        "SELECT * FROM videos WHERE channel_id = $1 \
         AND ($2::text IS NULL OR visibility = $2) \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(channel.id)
    .bind(&visibility_filter)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM videos WHERE channel_id = $1 \
         AND ($2::text IS NULL OR visibility = $2)",
    )
    .bind(channel.id)
    .bind(&visibility_filter)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(videos, total, &pq),
        "Channel videos fetched successfully",
    ))
}

#[get("/api/v1/channels/{channelId}/analytics")]
async fn channel_analytics(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let channel = load_channel(&state.db_pool, path.into_inner()).await?;
    if channel.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only view analytics for your own channels".to_string(),
        ));
    }

    let (total_videos, total_views, total_likes, avg_views): (i64, i64, i64, f64) =
        sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(views), 0)::int8, \
             COALESCE(SUM(likes_count), 0)::int8, COALESCE(AVG(views), 0)::float8 \
             FROM videos WHERE channel_id = $1",
        )
        .bind(channel.id)
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        json!({
            "channel": {
                "name": channel.name,
                "subscribersCount": channel.subscribers_count,
                "videosCount": channel.videos_count,
                "totalViews": channel.total_views,
            },
            "videos": {
                "totalVideos": total_videos,
                "totalViews": total_views,
                "totalLikes": total_likes,
                "avgViews": avg_views,
            },
        }),
        "Channel analytics fetched successfully",
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // "my" and "handle/{handle}" are registered ahead of "{channelId}" so
    // the literal segments match first.
    cfg.service(create_channel)
        .service(my_channels)
        .service(channel_by_handle)
        .service(channel_videos)
        .service(channel_analytics)
        .service(channel_by_id)
        .service(update_channel)
        .service(update_channel_avatar)
        .service(update_channel_banner)
        .service(delete_channel);
}
