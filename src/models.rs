use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Public representation of a user. The password hash and refresh token live
// only in UserRecord and are never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, FromRow)]
pub struct UserRecord {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password: String,
    pub avatar: String,
    pub cover_image: String,
    pub refresh_token: Option<String>,
    pub created_at: NaiveDateTime,
}

impl UserRecord {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            fullname: self.fullname,
            avatar: self.avatar,
            cover_image: self.cover_image,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub id: i32,
    pub name: String,
    pub handle: String,
    pub description: String,
    pub owner_id: i32,
    pub avatar: String,
    pub banner: String,
    pub subscribers_count: i32,
    pub videos_count: i32,
    pub total_views: i64,
    pub is_verified: bool,
    pub is_default: bool,
    pub category: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Video {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub duration: i32,
    pub views: i32,
    pub likes_count: i32,
    pub visibility: String,
    pub category: String,
    pub tags: Vec<String>,
    pub owner_id: i32,
    pub channel_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i32,
    pub content: String,
    pub video_id: i32,
    pub owner_id: i32,
    pub parent_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

// Comment row plus the per-entry metadata comment listings report.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithMeta {
    pub id: i32,
    pub content: String,
    pub video_id: i32,
    pub owner_id: i32,
    pub parent_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub likes_count: i64,
    pub replies_count: i64,
    pub is_liked_by_user: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: i32,
    pub subscriber_id: i32,
    pub channel_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub owner_id: i32,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tweet {
    pub id: i32,
    pub content: String,
    pub owner_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Liker {
    pub user_id: i32,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
    pub liked_at: NaiveDateTime,
}

// Claims embedded in the short-lived access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub exp: usize,
}

// The refresh token carries the user id plus a unique jti so every issued
// token is distinct, even within the same second.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: i32,
    pub jti: String,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refreshtoken: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub fullname: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub handle: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub category: Option<String>,
    pub visibility: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "isPublic")]
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddPlaylistVideoRequest {
    #[serde(rename = "videoId")]
    pub video_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TweetRequest {
    pub content: String,
}

pub const VIDEO_VISIBILITIES: [&str; 3] = ["public", "unlisted", "private"];

pub const CATEGORIES: [&str; 9] = [
    "Gaming",
    "Music",
    "Sports",
    "News",
    "Entertainment",
    "Education",
    "Technology",
    "Lifestyle",
    "Other",
];

// Tags arrive as one comma-separated field: "a, b" -> ["a", "b"].
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}
