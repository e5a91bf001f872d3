use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use std::env;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::ApiError;
use crate::models::{Claims, RefreshClaims, User};
use crate::AppState;

pub const ACCESS_COOKIE: &str = "accesstoken";
pub const REFRESH_COOKIE: &str = "refreshtoken";

const USER_COLUMNS: &str =
    "SELECT id, username, email, fullname, avatar, cover_image, created_at FROM users";

fn access_secret() -> String {
    env::var("JWT_ACCESS_SECRET").unwrap_or_else(|_| "videotube_access_secret_12345".to_string())
}

fn refresh_secret() -> String {
    env::var("JWT_REFRESH_SECRET").unwrap_or_else(|_| "videotube_refresh_secret_12345".to_string())
}

fn access_expiry_hours() -> i64 {
    env::var("ACCESS_TOKEN_EXPIRY_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(24)
}

fn refresh_expiry_days() -> i64 {
    env::var("REFRESH_TOKEN_EXPIRY_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}

fn is_production() -> bool {
    env::var("APP_ENV").map(|v| v == "production").unwrap_or(false)
}

pub fn issue_access_token(user: &User) -> Result<String, ApiError> {
    let exp = chrono::Utc::now() + chrono::Duration::hours(access_expiry_hours());
    let claims = Claims {
        user_id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        exp: exp.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(access_secret().as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign access token: {}", e)))
}

pub fn issue_refresh_token(user_id: i32) -> Result<String, ApiError> {
    let exp = chrono::Utc::now() + chrono::Duration::days(refresh_expiry_days());
    let claims = RefreshClaims {
        user_id,
        jti: uuid::Uuid::new_v4().to_string(),
        exp: exp.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(refresh_secret().as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign refresh token: {}", e)))
}

pub fn verify_access_token(token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(access_secret().as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid or expired access token".to_string()))
}

pub fn verify_refresh_token(token: &str) -> Result<RefreshClaims, ApiError> {
    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(refresh_secret().as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid refresh token".to_string()))
}

pub fn auth_cookie(name: &'static str, value: &str) -> Cookie<'static> {
    let max_age = if name == REFRESH_COOKIE {
        CookieDuration::days(refresh_expiry_days())
    } else {
        CookieDuration::hours(access_expiry_hours())
    };
    Cookie::build(name, value.to_string())
        .path("/")
        .http_only(true)
        .secure(is_production())
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .finish()
}

pub fn clear_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .secure(is_production())
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .finish()
}

// Access token from the cookie, falling back to `Authorization: Bearer`.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(String::from)
}

pub async fn fetch_user(pool: &PgPool, user_id: i32) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{} WHERE id = $1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

async fn pool_from_request(req: &HttpRequest) -> Result<PgPool, ApiError> {
    let state = req
        .app_data::<web::Data<Arc<Mutex<AppState>>>>()
        .ok_or_else(|| ApiError::Internal("app state not configured".to_string()))?;
    let state = state.lock().await;
    Ok(state.db_pool.clone())
}

async fn authenticate(req: &HttpRequest) -> Result<User, ApiError> {
    let token = extract_token(req)
        .ok_or_else(|| ApiError::Unauthorized("Missing access token".to_string()))?;
    let claims = verify_access_token(&token)?;
    let pool = pool_from_request(req).await?;
    fetch_user(&pool, claims.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))
}

// The authorization guard: extracting this type rejects the request with
// 401 unless a valid access token resolves to a live user.
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { authenticate(&req).await.map(AuthUser) })
    }
}

// Optional variant: verification failures are swallowed and the request
// proceeds anonymously.
pub struct MaybeAuthUser(pub Option<User>);

impl MaybeAuthUser {
    pub fn user_id(&self) -> Option<i32> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequest for MaybeAuthUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { Ok(MaybeAuthUser(authenticate(&req).await.ok())) })
    }
}
