use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{delete, get, post, put, web, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::ApiError;
use crate::media;
use crate::models::{
    parse_tags, Channel, UpdateVideoRequest, Video, CATEGORIES, VIDEO_VISIBILITIES,
};
use crate::pagination::{PageQuery, Paginated};
use crate::responses;
use crate::services::bucket_name;
use crate::video_utils;
use crate::AppState;

async fn load_video(pool: &sqlx::PgPool, video_id: i32) -> Result<Video, ApiError> {
    sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Video not found".to_string()))
}

fn check_visibility(video: &Video, viewer: &MaybeAuthUser) -> Result<(), ApiError> {
    // Unlisted videos stay reachable by id; private ones are owner-only.
    if video.visibility == "private" && viewer.user_id() != Some(video.owner_id) {
        return Err(ApiError::Forbidden("This video is private".to_string()));
    }
    Ok(())
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mpeg") => "video/mpeg",
        Some("mkv") => "video/x-matroska",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[post("/api/v1/videos")]
async fn upload_video(
    user: AuthUser,
    payload: Multipart,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let staged = media::stage_multipart(payload).await?;

    let title = staged
        .field("title")
        .ok_or_else(|| ApiError::BadRequest("Title and description are required".to_string()))?
        .to_string();
    let description = staged
        .field("description")
        .ok_or_else(|| ApiError::BadRequest("Title and description are required".to_string()))?
        .to_string();
    let channel_id: i32 = staged
        .field("channelId")
        .ok_or_else(|| ApiError::BadRequest("Channel ID is required".to_string()))?
        .parse()
        .map_err(|_| ApiError::BadRequest("Channel ID must be a number".to_string()))?;

    if !staged.files.contains_key("videoFile") || !staged.files.contains_key("thumbnail") {
        return Err(ApiError::BadRequest(
            "Video and thumbnail are required".to_string(),
        ));
    }

    let visibility = staged.field("visibility").unwrap_or("public").to_string();
    if !VIDEO_VISIBILITIES.contains(&visibility.as_str()) {
        return Err(ApiError::BadRequest("Invalid visibility".to_string()));
    }
    let category = staged.field("category").unwrap_or("Other").to_string();
    if !CATEGORIES.contains(&category.as_str()) {
        return Err(ApiError::BadRequest("Invalid category".to_string()));
    }
    let tags = staged.field("tags").map(parse_tags).unwrap_or_default();

    let state = state.lock().await;

    let channel = sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Channel not found".to_string()))?;
    if channel.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only upload videos to your own channels".to_string(),
        ));
    }

    let video_file = staged.file("videoFile")?;
    let thumbnail = staged.file("thumbnail")?;

    // The upload blocks on the media store; duration probing degrades to 0
    // when ffprobe cannot make sense of the bytes.
    let video_key = media::store_object(&state.s3_client, "videos", video_file).await?;
    let thumbnail_key = media::store_object(&state.s3_client, "thumbnails", thumbnail).await?;
    let duration = video_utils::probe_duration(&video_file.bytes).await.unwrap_or(0);

    let video = sqlx::query_as::<_, Video>(
        "INSERT INTO videos (title, description, video_url, thumbnail_url, duration, \
         visibility, category, tags, owner_id, channel_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(&title)
    .bind(&description)
    .bind(&video_key)
    .bind(&thumbnail_key)
    .bind(duration)
    .bind(&visibility)
    .bind(&category)
    .bind(&tags)
    .bind(user.0.id)
    .bind(channel.id)
    .fetch_one(&state.db_pool)
    .await?;

    sqlx::query("UPDATE channels SET videos_count = videos_count + 1 WHERE id = $1")
        .bind(channel.id)
        .execute(&state.db_pool)
        .await?;

    info!("User {} uploaded video {} to channel {}", user.0.id, video.id, channel.id);

    Ok(responses::created(video, "Video uploaded successfully"))
}

#[derive(Debug, Deserialize)]
struct CategoryQuery {
    category: Option<String>,
}

#[get("/api/v1/videos")]
async fn list_videos(
    pq: web::Query<PageQuery>,
    cq: web::Query<CategoryQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let category = cq.into_inner().category.filter(|c| c != "all");
    let state = state.lock().await;

    let videos = sqlx::query_as::<_, Video>(
        "SELECT * FROM videos WHERE visibility = 'public' \
         AND ($1::text IS NULL OR category = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(&category)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM videos WHERE visibility = 'public' \
         AND ($1::text IS NULL OR category = $1)",
    )
    .bind(&category)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(videos, total, &pq),
        "Videos fetched successfully",
    ))
}

#[get("/api/v1/videos/category/{category}")]
async fn videos_by_category(
    path: web::Path<String>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let category = path.into_inner();
    let state = state.lock().await;

    let videos = sqlx::query_as::<_, Video>(
        "SELECT * FROM videos WHERE visibility = 'public' AND category = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(&category)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM videos WHERE visibility = 'public' AND category = $1",
    )
    .bind(&category)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(videos, total, &pq),
        "Category videos fetched successfully",
    ))
}

#[get("/api/v1/videos/user/{userId}")]
async fn user_videos(
    viewer: MaybeAuthUser,
    path: web::Path<i32>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let user_id = path.into_inner();
    // Owners see their whole catalog, everyone else only public uploads.
    let visibility_filter = if viewer.user_id() == Some(user_id) {
        None
    } else {
        Some("public".to_string())
    };
    let state = state.lock().await;

    let videos = sqlx::query_as::<_, Video>(
        "SELECT * FROM videos WHERE owner_id = $1 \
         AND ($2::text IS NULL OR visibility = $2) \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(user_id)
    .bind(&visibility_filter)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM videos WHERE owner_id = $1 \
         AND ($2::text IS NULL OR visibility = $2)",
    )
    .bind(user_id)
    .bind(&visibility_filter)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(videos, total, &pq),
        "User videos fetched successfully",
    ))
}

#[get("/api/v1/videos/{videoId}")]
async fn get_video(
    viewer: MaybeAuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let mut video = load_video(&state.db_pool, path.into_inner()).await?;
    check_visibility(&video, &viewer)?;

    sqlx::query("UPDATE videos SET views = views + 1 WHERE id = $1")
        .bind(video.id)
        .execute(&state.db_pool)
        .await?;
    sqlx::query("UPDATE channels SET total_views = total_views + 1 WHERE id = $1")
        .bind(video.channel_id)
        .execute(&state.db_pool)
        .await?;
    video.views += 1;

    let mut is_liked = false;
    if let Some(viewer_id) = viewer.user_id() {
        // Re-watching bumps the entry back to the top of the history.
        sqlx::query(
            "INSERT INTO watch_history (user_id, video_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, video_id) DO UPDATE SET watched_at = now()",
        )
        .bind(viewer_id)
        .bind(video.id)
        .execute(&state.db_pool)
        .await?;

        is_liked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE video_id = $1 AND user_id = $2)",
        )
        .bind(video.id)
        .bind(viewer_id)
        .fetch_one(&state.db_pool)
        .await?;
    }

    Ok(responses::ok(
        json!({ "video": video, "isLikedByUser": is_liked }),
        "Video fetched successfully",
    ))
}

#[put("/api/v1/videos/{videoId}")]
async fn update_video(
    user: AuthUser,
    path: web::Path<i32>,
    req: web::Json<UpdateVideoRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let video = load_video(&state.db_pool, path.into_inner()).await?;
    if video.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only update your own videos".to_string(),
        ));
    }

    let title = req.title.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let description = req.description.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let tags = req.tags.as_deref().map(parse_tags);
    let category = req.category.as_deref().filter(|s| !s.is_empty());
    if let Some(cat) = category {
        if !CATEGORIES.contains(&cat) {
            return Err(ApiError::BadRequest("Invalid category".to_string()));
        }
    }
    let visibility = req.visibility.as_deref().filter(|s| !s.is_empty());
    if let Some(vis) = visibility {
        if !VIDEO_VISIBILITIES.contains(&vis) {
            return Err(ApiError::BadRequest("Invalid visibility".to_string()));
        }
    }

    let updated = sqlx::query_as::<_, Video>(
        "UPDATE videos SET title = COALESCE($1, title), \
         description = COALESCE($2, description), \
         tags = COALESCE($3::text[], tags), \
         category = COALESCE($4, category), \
         visibility = COALESCE($5, visibility) \
         WHERE id = $6 RETURNING *",
    )
    .bind(title)
    .bind(description)
    .bind(&tags)
    .bind(category)
    .bind(visibility)
    .bind(video.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(updated, "Video updated successfully"))
}

#[delete("/api/v1/videos/{videoId}")]
async fn delete_video(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let video = load_video(&state.db_pool, path.into_inner()).await?;
    if video.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only delete your own videos".to_string(),
        ));
    }

    // Comments, likes and watch-history rows fall with the video via FK
    // cascade.
    sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(video.id)
        .execute(&state.db_pool)
        .await?;
    sqlx::query("UPDATE channels SET videos_count = GREATEST(videos_count - 1, 0) WHERE id = $1")
        .bind(video.channel_id)
        .execute(&state.db_pool)
        .await?;

    Ok(responses::ok(json!(null), "Video deleted successfully"))
}

#[get("/api/v1/videos/{videoId}/stream")]
async fn stream_video(
    viewer: MaybeAuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let video = load_video(&state.db_pool, path.into_inner()).await?;
    check_visibility(&video, &viewer)?;

    let output = state
        .s3_client
        .get_object()
        .bucket(bucket_name())
        .key(&video.video_url)
        .send()
        .await
        .map_err(|e| ApiError::Media(format!("get_object {} failed: {:?}", video.video_url, e)))?;

    let body = output
        .body
        .collect()
        .await
        .map_err(|e| ApiError::Media(format!("reading {} failed: {:?}", video.video_url, e)))?
        .into_bytes();

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&video.video_url))
        .append_header((header::ACCEPT_RANGES, "bytes"))
        .body(body))
}

#[get("/api/v1/thumbnails/{key:.*}")]
async fn get_thumbnail(
    path: web::Path<String>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let key = path.into_inner();
    let s3_key = if key.starts_with("thumbnails/") {
        key
    } else {
        format!("thumbnails/{}", key)
    };

    let state = state.lock().await;
    let output = state
        .s3_client
        .get_object()
        .bucket(bucket_name())
        .key(&s3_key)
        .send()
        .await
        .map_err(|_| ApiError::NotFound("Thumbnail not found".to_string()))?;

    let body = output
        .body
        .collect()
        .await
        .map_err(|e| ApiError::Media(format!("reading {} failed: {:?}", s3_key, e)))?
        .into_bytes();

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&s3_key))
        .body(body))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Literal segments ("category", "user") are registered ahead of the
    // {videoId} matcher.
    cfg.service(upload_video)
        .service(list_videos)
        .service(videos_by_category)
        .service(user_videos)
        .service(stream_video)
        .service(get_video)
        .service(update_video)
        .service(delete_video)
        .service(get_thumbnail);
}
