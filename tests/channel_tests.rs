use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use dotenv::dotenv;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use videotube_backend::handlers;
use videotube_backend::services;
use videotube_backend::AppState;

async fn setup_test_app(
    pool: PgPool,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse,
    Error = actix_web::Error,
> {
    dotenv().ok();
    let s3_client = services::init_s3_client().await;
    let app_state = Arc::new(Mutex::new(AppState {
        db_pool: pool,
        s3_client,
    }));
    test::init_service(
        App::new()
            .app_data(web::Data::new(app_state))
            .configure(handlers::configure_routes)
            .default_service(web::route().to(handlers::not_found)),
    )
    .await
}

// Registers a fresh user and returns (user_id, access_token).
async fn register_test_user(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
) -> (i32, String) {
    let unique_id = Uuid::new_v4().to_string();
    let req = test::TestRequest::post()
        .uri("/api/v1/users/register")
        .set_json(json!({
            "fullname": format!("Test User {}", &unique_id[..8]),
            "username": format!("testuser_{}", &unique_id[..8]),
            "email": format!("test_{}@example.com", &unique_id[..8]),
            "password": "password123",
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let token = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("accesstoken="))
        .map(|v| v.split(';').next().unwrap_or("").to_string())
        .expect("accesstoken cookie missing");
    let body: serde_json::Value = test::read_body_json(resp).await;
    (body["data"]["id"].as_i64().unwrap() as i32, token)
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

async fn seed_video(
    pool: &PgPool,
    owner_id: i32,
    channel_id: i32,
    title: &str,
    visibility: &str,
) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO videos (title, description, video_url, thumbnail_url, owner_id, channel_id, visibility) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(title)
    .bind("seeded for tests")
    .bind(format!("videos/{}.mp4", Uuid::new_v4()))
    .bind(format!("thumbnails/{}.jpg", Uuid::new_v4()))
    .bind(owner_id)
    .bind(channel_id)
    .bind(visibility)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test]
async fn test_channel_cap_and_single_default(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (user_id, token) = register_test_user(&app).await;

    // The default channel counts against the 3-channel cap.
    for handle in ["second-channel", "third-channel"] {
        let req = test::TestRequest::post()
            .uri("/api/v1/channels")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Extra", "handle": handle }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::post()
        .uri("/api/v1/channels")
        .insert_header(bearer(&token))
        .set_json(json!({ "name": "One Too Many", "handle": "fourth-channel" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body["message"].as_str().unwrap(),
        "Maximum 3 channels allowed per user"
    );

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels WHERE owner_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, 3);

    // Exactly one of them is the default.
    let defaults: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM channels WHERE owner_id = $1 AND is_default")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(defaults, 1);
}

#[sqlx::test]
async fn test_handle_validation_and_conflict(pool: PgPool) {
    let app = setup_test_app(pool).await;
    let (_, token_a) = register_test_user(&app).await;
    let (_, token_b) = register_test_user(&app).await;

    let bad_req = test::TestRequest::post()
        .uri("/api/v1/channels")
        .insert_header(bearer(&token_a))
        .set_json(json!({ "name": "Bad", "handle": "not a handle!" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, bad_req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let ok_req = test::TestRequest::post()
        .uri("/api/v1/channels")
        .insert_header(bearer(&token_a))
        .set_json(json!({ "name": "Gaming Hub", "handle": "Gaming-Hub" }))
        .to_request();
    let ok_resp = test::call_service(&app, ok_req).await;
    assert_eq!(ok_resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(ok_resp).await;
    // Handles are stored lowercased.
    assert_eq!(body["data"]["handle"].as_str().unwrap(), "gaming-hub");

    let dup_req = test::TestRequest::post()
        .uri("/api/v1/channels")
        .insert_header(bearer(&token_b))
        .set_json(json!({ "name": "Copycat", "handle": "gaming-hub" }))
        .to_request();
    let dup_resp = test::call_service(&app, dup_req).await;
    assert_eq!(dup_resp.status(), StatusCode::CONFLICT);
}

#[sqlx::test]
async fn test_update_channel_ownership(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (owner_id, _) = register_test_user(&app).await;
    let (_, intruder_token) = register_test_user(&app).await;

    let channel_id: i32 =
        sqlx::query_scalar("SELECT id FROM channels WHERE owner_id = $1 AND is_default")
            .bind(owner_id)
            .fetch_one(&pool)
            .await
            .unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/channels/{}", channel_id))
        .insert_header(bearer(&intruder_token))
        .set_json(json!({ "name": "Hijacked" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The row is unchanged after the rejected mutation.
    let name: String = sqlx::query_scalar("SELECT name FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_ne!(name, "Hijacked");
}

#[sqlx::test]
async fn test_delete_channel_rules(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (user_id, token) = register_test_user(&app).await;

    let default_id: i32 =
        sqlx::query_scalar("SELECT id FROM channels WHERE owner_id = $1 AND is_default")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();

    // The default channel cannot be deleted.
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/channels/{}", default_id))
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    // A channel holding videos cannot be deleted either.
    let create_req = test::TestRequest::post()
        .uri("/api/v1/channels")
        .insert_header(bearer(&token))
        .set_json(json!({ "name": "Disposable", "handle": "disposable" }))
        .to_request();
    let create_resp = test::call_service(&app, create_req).await;
    let body: serde_json::Value = test::read_body_json(create_resp).await;
    let channel_id = body["data"]["id"].as_i64().unwrap() as i32;

    let video_id = seed_video(&pool, user_id, channel_id, "Blocker", "public").await;
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/channels/{}", channel_id))
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    // Once empty it goes away.
    sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(video_id)
        .execute(&pool)
        .await
        .unwrap();
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/channels/{}", channel_id))
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[sqlx::test]
async fn test_channel_videos_visibility(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (user_id, token) = register_test_user(&app).await;

    let channel_id: i32 =
        sqlx::query_scalar("SELECT id FROM channels WHERE owner_id = $1 AND is_default")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();

    seed_video(&pool, user_id, channel_id, "Public Video", "public").await;
    seed_video(&pool, user_id, channel_id, "Secret Video", "private").await;

    // Anonymous viewers only see public videos.
    let anon_req = test::TestRequest::get()
        .uri(&format!("/api/v1/channels/{}/videos", channel_id))
        .to_request();
    let anon_resp = test::call_service(&app, anon_req).await;
    assert_eq!(anon_resp.status(), StatusCode::OK);
    let anon_json: serde_json::Value = test::read_body_json(anon_resp).await;
    assert_eq!(anon_json["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(
        anon_json["data"]["items"][0]["title"].as_str().unwrap(),
        "Public Video"
    );

    // The owner can ask for everything.
    let owner_req = test::TestRequest::get()
        .uri(&format!("/api/v1/channels/{}/videos?visibility=all", channel_id))
        .insert_header(bearer(&token))
        .to_request();
    let owner_resp = test::call_service(&app, owner_req).await;
    let owner_json: serde_json::Value = test::read_body_json(owner_resp).await;
    assert_eq!(owner_json["data"]["total"].as_i64().unwrap(), 2);
}

#[sqlx::test]
async fn test_channel_analytics_owner_only(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (user_id, token) = register_test_user(&app).await;
    let (_, other_token) = register_test_user(&app).await;

    let channel_id: i32 =
        sqlx::query_scalar("SELECT id FROM channels WHERE owner_id = $1 AND is_default")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();

    let forbidden_req = test::TestRequest::get()
        .uri(&format!("/api/v1/channels/{}/analytics", channel_id))
        .insert_header(bearer(&other_token))
        .to_request();
    assert_eq!(
        test::call_service(&app, forbidden_req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/channels/{}/analytics", channel_id))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["data"]["videos"]["totalVideos"].as_i64().unwrap(), 0);
}
