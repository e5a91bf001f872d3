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
    fullname: &str,
) -> (i32, String) {
    let unique_id = Uuid::new_v4().to_string();
    let req = test::TestRequest::post()
        .uri("/api/v1/users/register")
        .set_json(json!({
            "fullname": fullname,
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

async fn seed_video(
    pool: &PgPool,
    owner_id: i32,
    title: &str,
    description: &str,
    tags: &[&str],
    visibility: &str,
) {
    let channel_id: i32 =
        sqlx::query_scalar("SELECT id FROM channels WHERE owner_id = $1 AND is_default")
            .bind(owner_id)
            .fetch_one(pool)
            .await
            .unwrap();
    let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    sqlx::query(
        "INSERT INTO videos (title, description, video_url, thumbnail_url, tags, owner_id, channel_id, visibility) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(title)
    .bind(description)
    .bind(format!("videos/{}.mp4", Uuid::new_v4()))
    .bind(format!("thumbnails/{}.jpg", Uuid::new_v4()))
    .bind(&tags)
    .bind(owner_id)
    .bind(channel_id)
    .bind(visibility)
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test]
async fn test_search_videos_by_title_description_and_tags(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (user_id, _) = register_test_user(&app, "Search Seeder").await;

    seed_video(&pool, user_id, "Video About Cats", "felines at play", &[], "public").await;
    seed_video(&pool, user_id, "Other Video", "this one is about programming", &[], "public").await;
    seed_video(&pool, user_id, "Tagged Video", "nothing in the text", &["rust", "backend"], "public").await;

    let req = test::TestRequest::get()
        .uri("/api/v1/search/videos?q=cats")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(
        body["data"]["items"][0]["title"].as_str().unwrap(),
        "Video About Cats"
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/search/videos?q=programming")
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(body["data"]["items"][0]["title"].as_str().unwrap(), "Other Video");

    let req = test::TestRequest::get()
        .uri("/api/v1/search/videos?q=rust")
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(body["data"]["items"][0]["title"].as_str().unwrap(), "Tagged Video");
}

#[sqlx::test]
async fn test_search_is_case_insensitive_and_public_only(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (user_id, _) = register_test_user(&app, "Search Seeder").await;

    seed_video(&pool, user_id, "UPPERCASE TITLE", "whatever", &[], "public").await;
    seed_video(&pool, user_id, "uppercase private", "whatever", &[], "private").await;

    let req = test::TestRequest::get()
        .uri("/api/v1/search/videos?q=uppercase")
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(
        body["data"]["items"][0]["title"].as_str().unwrap(),
        "UPPERCASE TITLE"
    );
}

#[sqlx::test]
async fn test_search_requires_query(pool: PgPool) {
    let app = setup_test_app(pool).await;

    for uri in [
        "/api/v1/search/videos",
        "/api/v1/search/channels?q=%20",
        "/api/v1/search/users",
        "/api/v1/search/global",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {}",
            uri
        );
    }
}

#[sqlx::test]
async fn test_search_videos_no_results(pool: PgPool) {
    let app = setup_test_app(pool).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/search/videos?q=nonexistent")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 0);
    assert_eq!(body["data"]["totalPages"].as_i64().unwrap(), 0);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[sqlx::test]
async fn test_search_channels_ranked_by_subscribers(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (_user_id, token) = register_test_user(&app, "Channel Seeder").await;

    for (handle, subs) in [("cooking-basics", 5), ("cooking-pro", 50)] {
        let req = test::TestRequest::post()
            .uri("/api/v1/channels")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .set_json(json!({ "name": "Cooking", "handle": handle }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_i64().unwrap() as i32;
        sqlx::query("UPDATE channels SET subscribers_count = $1 WHERE id = $2")
            .bind(subs)
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/search/channels?q=cooking")
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 2);
    assert_eq!(
        body["data"]["items"][0]["handle"].as_str().unwrap(),
        "cooking-pro"
    );
}

#[sqlx::test]
async fn test_search_users_and_global(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (user_id, _) = register_test_user(&app, "Grace Hopper").await;
    register_test_user(&app, "Unrelated Person").await;

    seed_video(&pool, user_id, "Hopper Documentary", "history", &[], "public").await;

    let req = test::TestRequest::get()
        .uri("/api/v1/search/users?q=hopper")
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 1);
    assert_eq!(
        body["data"]["items"][0]["fullname"].as_str().unwrap(),
        "Grace Hopper"
    );
    // Password material never leaks through search either.
    assert!(body["data"]["items"][0].get("password").is_none());

    let req = test::TestRequest::get()
        .uri("/api/v1/search/global?q=hopper")
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["videos"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["users"].as_array().unwrap().len(), 1);
    // The auto-created default channel is named after the fullname, so it
    // matches too.
    assert_eq!(body["data"]["channels"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["query"].as_str().unwrap(), "hopper");
}

#[sqlx::test]
async fn test_search_pagination(pool: PgPool) {
    let app = setup_test_app(pool.clone()).await;
    let (user_id, _) = register_test_user(&app, "Pagination Seeder").await;

    for i in 0..7 {
        seed_video(&pool, user_id, &format!("common title {}", i), "x", &[], "public").await;
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/search/videos?q=common&page=2&limit=3")
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["total"].as_i64().unwrap(), 7);
    assert_eq!(body["data"]["totalPages"].as_i64().unwrap(), 3);
    assert_eq!(body["data"]["currentPage"].as_i64().unwrap(), 2);
}
