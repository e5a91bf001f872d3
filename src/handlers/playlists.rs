use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::ApiError;
use crate::models::{AddPlaylistVideoRequest, CreatePlaylistRequest, Playlist, Video};
use crate::pagination::{PageQuery, Paginated};
use crate::responses;
use crate::AppState;

async fn load_playlist(pool: &sqlx::PgPool, playlist_id: i32) -> Result<Playlist, ApiError> {
    sqlx::query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = $1")
        .bind(playlist_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Playlist not found".to_string()))
}

async fn playlist_videos_ordered(
    pool: &sqlx::PgPool,
    playlist_id: i32,
) -> Result<Vec<Video>, ApiError> {
    Ok(sqlx::query_as::<_, Video>(
        "SELECT v.* FROM videos v JOIN playlist_videos pv ON pv.video_id = v.id \
         WHERE pv.playlist_id = $1 ORDER BY pv.position",
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await?)
}

#[post("/api/v1/playlists")]
async fn create_playlist(
    user: AuthUser,
    req: web::Json<CreatePlaylistRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Playlist name is required".to_string()));
    }

    let state = state.lock().await;
    let playlist = sqlx::query_as::<_, Playlist>(
        "INSERT INTO playlists (name, description, owner_id, is_public) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&name)
    .bind(req.description.clone().unwrap_or_default())
    .bind(user.0.id)
    .bind(req.is_public.unwrap_or(true))
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::created(playlist, "Playlist created successfully"))
}

#[get("/api/v1/playlists")]
async fn list_playlists(
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;

    let playlists = sqlx::query_as::<_, Playlist>(
        "SELECT * FROM playlists WHERE is_public ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlists WHERE is_public")
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        Paginated::new(playlists, total, &pq),
        "Playlists fetched successfully",
    ))
}

#[get("/api/v1/playlists/user/{userId}")]
async fn user_playlists(
    viewer: MaybeAuthUser,
    path: web::Path<i32>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let user_id = path.into_inner();
    // Private playlists only show up on the owner's own listing.
    let include_private = viewer.user_id() == Some(user_id);
    let state = state.lock().await;

    let playlists = sqlx::query_as::<_, Playlist>(
        "SELECT * FROM playlists WHERE owner_id = $1 AND (is_public OR $2) \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(user_id)
    .bind(include_private)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM playlists WHERE owner_id = $1 AND (is_public OR $2)",
    )
    .bind(user_id)
    .bind(include_private)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(
        Paginated::new(playlists, total, &pq),
        "Playlists fetched successfully",
    ))
}

#[delete("/api/v1/playlists/{playlistId}")]
async fn delete_playlist(
    user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    let playlist = load_playlist(&state.db_pool, path.into_inner()).await?;
    if playlist.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only delete your own playlists".to_string(),
        ));
    }

    sqlx::query("DELETE FROM playlists WHERE id = $1")
        .bind(playlist.id)
        .execute(&state.db_pool)
        .await?;

    Ok(responses::ok(json!(null), "Playlist deleted successfully"))
}

#[post("/api/v1/playlists/{playlistId}/videos")]
async fn add_playlist_video(
    user: AuthUser,
    path: web::Path<i32>,
    req: web::Json<AddPlaylistVideoRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let video_id = req
        .video_id
        .ok_or_else(|| ApiError::BadRequest("Video ID is required".to_string()))?;

    let state = state.lock().await;
    let playlist = load_playlist(&state.db_pool, path.into_inner()).await?;
    if playlist.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only modify your own playlists".to_string(),
        ));
    }

    let video = sqlx::query("SELECT id FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(&state.db_pool)
        .await?;
    if video.is_none() {
        return Err(ApiError::NotFound("Video not found".to_string()));
    }

    let already = sqlx::query(
        "SELECT video_id FROM playlist_videos WHERE playlist_id = $1 AND video_id = $2",
    )
    .bind(playlist.id)
    .bind(video_id)
    .fetch_optional(&state.db_pool)
    .await?;
    if already.is_some() {
        return Err(ApiError::BadRequest(
            "Video already exists in playlist".to_string(),
        ));
    }

    // Append at the end of the playlist.
    sqlx::query(
        "INSERT INTO playlist_videos (playlist_id, video_id, position) \
         SELECT $1, $2, COALESCE(MAX(position) + 1, 0) FROM playlist_videos WHERE playlist_id = $1",
    )
    .bind(playlist.id)
    .bind(video_id)
    .execute(&state.db_pool)
    .await?;

    let videos = playlist_videos_ordered(&state.db_pool, playlist.id).await?;
    Ok(responses::ok(
        json!({ "playlist": playlist, "videos": videos }),
        "Video added to playlist successfully",
    ))
}

#[delete("/api/v1/playlists/{playlistId}/videos/{videoId}")]
async fn remove_playlist_video(
    user: AuthUser,
    path: web::Path<(i32, i32)>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let (playlist_id, video_id) = path.into_inner();
    let state = state.lock().await;
    let playlist = load_playlist(&state.db_pool, playlist_id).await?;
    if playlist.owner_id != user.0.id {
        return Err(ApiError::Forbidden(
            "You can only modify your own playlists".to_string(),
        ));
    }

    sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = $1 AND video_id = $2")
        .bind(playlist.id)
        .bind(video_id)
        .execute(&state.db_pool)
        .await?;

    let videos = playlist_videos_ordered(&state.db_pool, playlist.id).await?;
    Ok(responses::ok(
        json!({ "playlist": playlist, "videos": videos }),
        "Video removed from playlist successfully",
    ))
}

#[get("/api/v1/playlists/{playlistId}/videos")]
async fn playlist_videos(
    viewer: MaybeAuthUser,
    path: web::Path<i32>,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;
    let playlist = load_playlist(&state.db_pool, path.into_inner()).await?;
    if !playlist.is_public && viewer.user_id() != Some(playlist.owner_id) {
        return Err(ApiError::Forbidden("This playlist is private".to_string()));
    }

    let videos = sqlx::query_as::<_, Video>(
        "SELECT v.* FROM videos v JOIN playlist_videos pv ON pv.video_id = v.id \
         WHERE pv.playlist_id = $1 ORDER BY pv.position LIMIT $2 OFFSET $3",
    )
    .bind(playlist.id)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM playlist_videos WHERE playlist_id = $1")
            .bind(playlist.id)
            .fetch_one(&state.db_pool)
            .await?;

    let page = Paginated::new(videos, total, &pq);
    Ok(responses::ok(
        json!({ "playlist": playlist, "videos": page }),
        "Playlist videos fetched successfully",
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_playlist)
        .service(list_playlists)
        .service(user_playlists)
        .service(delete_playlist)
        .service(add_playlist_video)
        .service(remove_playlist_video)
        .service(playlist_videos);
}
