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

async fn default_channel_id(pool: &PgPool, user_id: i32) -> i32 {
    sqlx::query_scalar("SELECT id FROM channels WHERE owner_id = $1 AND is_default")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn assert_counter_consistent(pool: &PgPool, channel_id: i32) {
    let counter: i32 = sqlx::query_scalar("SELECT subscribers_count FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_one(pool)
        .await
        .unwrap();
    let recount: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE channel_id = $1")
            .bind(channel_id)
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(counter as i64, recount);
}

#[sqlx::test]
async fn test_subscribe_and_unsubscribe(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (creator_id, _) = register_test_user(&app).await;
    let (_, fan_token) = register_test_user(&app).await;
    let channel_id = default_channel_id(&pool, creator_id).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/subscriptions/subscribe/{}", channel_id))
        .insert_header(bearer(&fan_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_counter_consistent(&pool, channel_id).await;

    // Subscribing twice is rejected outright, not toggled.
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/subscriptions/subscribe/{}", channel_id))
        .insert_header(bearer(&fan_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body["message"].as_str().unwrap(),
        "Already subscribed to this channel"
    );
    assert_counter_consistent(&pool, channel_id).await;

    let status_req = test::TestRequest::get()
        .uri(&format!("/api/v1/subscriptions/status/{}", channel_id))
        .insert_header(bearer(&fan_token))
        .to_request();
    let body: serde_json::Value =
        test::read_body_json(test::call_service(&app, status_req).await).await;
    assert_eq!(body["data"]["isSubscribed"], json!(true));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/subscriptions/unsubscribe/{}", channel_id))
        .insert_header(bearer(&fan_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert_counter_consistent(&pool, channel_id).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/subscriptions/unsubscribe/{}", channel_id))
        .insert_header(bearer(&fan_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body["message"].as_str().unwrap(),
        "Not subscribed to this channel"
    );
}

#[sqlx::test]
async fn test_subscribe_missing_channel(pool: PgPool) {
    let app = setup_test_app(pool).await;
    let (_, token) = register_test_user(&app).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/subscriptions/subscribe/999999")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn test_subscription_listings(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (creator_id, _) = register_test_user(&app).await;
    let (fan_id, fan_token) = register_test_user(&app).await;
    let channel_id = default_channel_id(&pool, creator_id).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/subscriptions/subscribe/{}", channel_id))
        .insert_header(bearer(&fan_token))
        .to_request();
    test::call_service(&app, req).await;

    let subs_req = test::TestRequest::get()
        .uri("/api/v1/subscriptions/user-subscriptions")
        .insert_header(bearer(&fan_token))
        .to_request();
    let body: serde_json::Value =
        test::read_body_json(test::call_service(&app, subs_req).await).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(
        body["data"]["items"][0]["id"].as_i64().unwrap() as i32,
        channel_id
    );

    let fans_req = test::TestRequest::get()
        .uri(&format!(
            "/api/v1/subscriptions/channel-subscribers/{}",
            channel_id
        ))
        .to_request();
    let body: serde_json::Value =
        test::read_body_json(test::call_service(&app, fans_req).await).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(
        body["data"]["items"][0]["id"].as_i64().unwrap() as i32,
        fan_id
    );
}

#[sqlx::test]
async fn test_subscription_feed_is_public_only(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (creator_id, _) = register_test_user(&app).await;
    let (_, fan_token) = register_test_user(&app).await;
    let channel_id = default_channel_id(&pool, creator_id).await;

    for (title, visibility) in [("Feed Video", "public"), ("Hidden Video", "private")] {
        sqlx::query(
            "INSERT INTO videos (title, description, video_url, thumbnail_url, owner_id, channel_id, visibility) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(title)
        .bind("seeded for tests")
        .bind(format!("videos/{}.mp4", Uuid::new_v4()))
        .bind(format!("thumbnails/{}.jpg", Uuid::new_v4()))
        .bind(creator_id)
        .bind(channel_id)
        .bind(visibility)
        .execute(&pool)
        .await
        .unwrap();
    }

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/subscriptions/subscribe/{}", channel_id))
        .insert_header(bearer(&fan_token))
        .to_request();
    test::call_service(&app, req).await;

    let feed_req = test::TestRequest::get()
        .uri("/api/v1/subscriptions/feed")
        .insert_header(bearer(&fan_token))
        .to_request();
    let body: serde_json::Value =
        test::read_body_json(test::call_service(&app, feed_req).await).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(
        body["data"]["items"][0]["title"].as_str().unwrap(),
        "Feed Video"
    );
}
