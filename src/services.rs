use aws_config;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use log::{error, info};
use sqlx::{PgPool, Pool, Postgres};
use std::env;

pub async fn init_db_pool() -> Pool<Postgres> {
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to database")
}

pub fn bucket_name() -> String {
    env::var("MINIO_BUCKET").unwrap_or_else(|_| "videotube".to_string())
}

pub async fn init_s3_client() -> Client {
    let sdk_config = aws_config::from_env().load().await;
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

    if let Ok(endpoint) = env::var("MINIO_ENDPOINT") {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint).force_path_style(true);
    }

    let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minio".to_string());
    let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minio123".to_string());
    let credentials = Credentials::new(access_key, secret_key, None, None, "env");
    s3_config_builder = s3_config_builder.credentials_provider(credentials);

    if let Some(region) = sdk_config.region() {
        s3_config_builder = s3_config_builder.region(region.clone());
    } else {
        s3_config_builder = s3_config_builder.region(Region::new("us-east-1"));
    }

    Client::from_conf(s3_config_builder.build())
}

// Media objects (videos, thumbnails, avatars, banners) all live in one
// bucket; make sure it exists before serving traffic.
pub async fn ensure_bucket_exists(client: &Client) {
    let bucket = bucket_name();
    if client.head_bucket().bucket(&bucket).send().await.is_ok() {
        return;
    }
    match client.create_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("Created media bucket {}", bucket),
        Err(e) => error!("Failed to create media bucket {}: {:?}", bucket, e),
    }
}
