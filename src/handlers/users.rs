use actix_multipart::Multipart;
use actix_web::{get, post, put, web, HttpRequest, HttpResponse};
use log::{error, info};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{self, AuthUser};
use crate::errors::ApiError;
use crate::media;
use crate::models::{
    ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest, UpdateUserRequest, User,
    UserRecord, Video,
};
use crate::pagination::{PageQuery, Paginated};
use crate::responses::{self, ApiResponse};
use crate::AppState;

const USER_RETURNING: &str = "id, username, email, fullname, avatar, cover_image, created_at";

#[post("/api/v1/users/register")]
async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let fullname = req.fullname.trim().to_string();
    let username = req.username.trim().to_lowercase();
    let email = req.email.trim().to_lowercase();
    if fullname.is_empty() || username.is_empty() || email.is_empty() || req.password.trim().is_empty()
    {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    }

    let state = state.lock().await;

    let existing = sqlx::query("SELECT id FROM users WHERE username = $1 OR email = $2")
        .bind(&username)
        .bind(&email)
        .fetch_optional(&state.db_pool)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let hashed_password = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)?;
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, fullname, password) VALUES ($1, $2, $3, $4) \
         RETURNING {}",
        USER_RETURNING
    ))
    .bind(&username)
    .bind(&email)
    .bind(&fullname)
    .bind(&hashed_password)
    .fetch_one(&state.db_pool)
    .await?;

    // Every account starts with a default channel named after its owner.
    // Registration still succeeds if this insert fails.
    let channel_result = sqlx::query(
        "INSERT INTO channels (name, handle, description, owner_id, is_default, avatar) \
         VALUES ($1, $2, $3, $4, TRUE, $5)",
    )
    .bind(&user.fullname)
    .bind(&user.username)
    .bind(format!("Welcome to {}'s channel!", user.fullname))
    .bind(user.id)
    .bind(&user.avatar)
    .execute(&state.db_pool)
    .await;
    if let Err(e) = channel_result {
        error!("Failed to create default channel for user {}: {:?}", user.id, e);
    }

    let accesstoken = auth::issue_access_token(&user)?;
    let refreshtoken = auth::issue_refresh_token(user.id)?;
    sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
        .bind(&refreshtoken)
        .bind(user.id)
        .execute(&state.db_pool)
        .await?;

    info!("Registered user {} ({})", user.username, user.id);

    Ok(HttpResponse::Created()
        .cookie(auth::auth_cookie(auth::ACCESS_COOKIE, &accesstoken))
        .cookie(auth::auth_cookie(auth::REFRESH_COOKIE, &refreshtoken))
        .json(ApiResponse::new(201, user, "User registered successfully")))
}

#[post("/api/v1/users/login")]
async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;

    let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = $1")
        .bind(req.email.trim().to_lowercase())
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    if !bcrypt::verify(&req.password, &record.password)? {
        return Err(ApiError::Unauthorized("Invalid password".to_string()));
    }

    let user = record.into_user();
    let accesstoken = auth::issue_access_token(&user)?;
    let refreshtoken = auth::issue_refresh_token(user.id)?;
    sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
        .bind(&refreshtoken)
        .bind(user.id)
        .execute(&state.db_pool)
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(auth::auth_cookie(auth::ACCESS_COOKIE, &accesstoken))
        .cookie(auth::auth_cookie(auth::REFRESH_COOKIE, &refreshtoken))
        .json(ApiResponse::new(200, user, "User logged in successfully")))
}

#[post("/api/v1/users/logout")]
async fn logout(
    user: AuthUser,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let state = state.lock().await;
    sqlx::query("UPDATE users SET refresh_token = NULL WHERE id = $1")
        .bind(user.0.id)
        .execute(&state.db_pool)
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(auth::clear_cookie(auth::ACCESS_COOKIE))
        .cookie(auth::clear_cookie(auth::REFRESH_COOKIE))
        .json(ApiResponse::new(200, json!(null), "User logged out successfully")))
}

#[post("/api/v1/users/refreshToken")]
async fn refresh_token(
    http_req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let incoming = http_req
        .cookie(auth::REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.as_ref().and_then(|b| b.refreshtoken.clone()))
        .ok_or_else(|| ApiError::Unauthorized("Refresh token not found".to_string()))?;

    let claims = auth::verify_refresh_token(&incoming)?;

    let state = state.lock().await;
    let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1")
        .bind(claims.user_id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    // Logout clears the stored token, so anything stale is rejected here.
    if record.refresh_token.as_deref() != Some(incoming.as_str()) {
        return Err(ApiError::Unauthorized("Invalid refresh token".to_string()));
    }

    let user = record.into_user();
    let accesstoken = auth::issue_access_token(&user)?;
    let refreshtoken = auth::issue_refresh_token(user.id)?;
    sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
        .bind(&refreshtoken)
        .bind(user.id)
        .execute(&state.db_pool)
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(auth::auth_cookie(auth::ACCESS_COOKIE, &accesstoken))
        .cookie(auth::auth_cookie(auth::REFRESH_COOKIE, &refreshtoken))
        .json(ApiResponse::new(
            200,
            json!({ "accesstoken": accesstoken, "refreshtoken": refreshtoken }),
            "Access token refreshed",
        )))
}

#[get("/api/v1/users/currentUser")]
async fn current_user(user: AuthUser) -> Result<HttpResponse, ApiError> {
    Ok(responses::ok(user.0, "Current user fetched successfully"))
}

#[post("/api/v1/users/changePassword")]
async fn change_password(
    user: AuthUser,
    req: web::Json<ChangePasswordRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    if req.old_password.trim().is_empty() || req.new_password.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Old and new passwords are required".to_string(),
        ));
    }

    let state = state.lock().await;
    let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1")
        .bind(user.0.id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !bcrypt::verify(&req.old_password, &record.password)? {
        return Err(ApiError::Unauthorized("Old password is incorrect".to_string()));
    }

    let hashed_password = bcrypt::hash(&req.new_password, bcrypt::DEFAULT_COST)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(&hashed_password)
        .bind(user.0.id)
        .execute(&state.db_pool)
        .await?;

    Ok(responses::ok(json!(null), "Password changed successfully"))
}

#[put("/api/v1/users/updateInfo")]
async fn update_info(
    user: AuthUser,
    req: web::Json<UpdateUserRequest>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let fullname = req.fullname.trim().to_string();
    let username = req.username.trim().to_lowercase();
    let email = req.email.trim().to_lowercase();
    if fullname.is_empty() || username.is_empty() || email.is_empty() {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    }

    let state = state.lock().await;

    let taken = sqlx::query("SELECT id FROM users WHERE (username = $1 OR email = $2) AND id <> $3")
        .bind(&username)
        .bind(&email)
        .bind(user.0.id)
        .fetch_optional(&state.db_pool)
        .await?;
    if taken.is_some() {
        return Err(ApiError::Conflict("Username or email already in use".to_string()));
    }

    let updated = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET fullname = $1, username = $2, email = $3 WHERE id = $4 RETURNING {}",
        USER_RETURNING
    ))
    .bind(&fullname)
    .bind(&username)
    .bind(&email)
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(updated, "User information updated successfully"))
}

#[put("/api/v1/users/avatar")]
async fn update_avatar(
    user: AuthUser,
    payload: Multipart,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let staged = media::stage_multipart(payload).await?;
    let file = staged
        .files
        .get("avatar")
        .ok_or_else(|| ApiError::BadRequest("Avatar image is required".to_string()))?;

    let state = state.lock().await;
    let key = media::store_object(&state.s3_client, "avatars", file).await?;

    let updated = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET avatar = $1 WHERE id = $2 RETURNING {}",
        USER_RETURNING
    ))
    .bind(&key)
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(updated, "User avatar updated successfully"))
}

#[put("/api/v1/users/coverImage")]
async fn update_cover_image(
    user: AuthUser,
    payload: Multipart,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let staged = media::stage_multipart(payload).await?;
    let file = staged
        .files
        .get("coverImage")
        .ok_or_else(|| ApiError::BadRequest("Cover image is required".to_string()))?;

    let state = state.lock().await;
    let key = media::store_object(&state.s3_client, "covers", file).await?;

    let updated = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET cover_image = $1 WHERE id = $2 RETURNING {}",
        USER_RETURNING
    ))
    .bind(&key)
    .bind(user.0.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(responses::ok(updated, "User cover image updated successfully"))
}

#[get("/api/v1/users/watchHistory")]
async fn watch_history(
    user: AuthUser,
    pq: web::Query<PageQuery>,
    state: web::Data<Arc<Mutex<AppState>>>,
) -> Result<HttpResponse, ApiError> {
    let pq = pq.into_inner();
    let state = state.lock().await;

    let videos = sqlx::query_as::<_, Video>(
        "SELECT v.* FROM videos v JOIN watch_history w ON w.video_id = v.id \
         WHERE w.user_id = $1 ORDER BY w.watched_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.0.id)
    .bind(pq.limit())
    .bind(pq.offset())
    .fetch_all(&state.db_pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watch_history WHERE user_id = $1")
        .bind(user.0.id)
        .fetch_one(&state.db_pool)
        .await?;

    Ok(responses::ok(
        Paginated::new(videos, total, &pq),
        "Watch history fetched successfully",
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(register)
        .service(login)
        .service(logout)
        .service(refresh_token)
        .service(current_user)
        .service(change_password)
        .service(update_info)
        .service(update_avatar)
        .service(update_cover_image)
        .service(watch_history);
}
