use actix_multipart::Multipart;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::env;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::services::bucket_name;

// Upload staging is in-memory: parts are buffered, then forwarded to the
// media bucket. 256 MiB default cap per part.
fn max_upload_bytes() -> usize {
    env::var("MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(256 * 1024 * 1024)
}

pub struct StagedFile {
    pub content_type: String,
    pub ext: String,
    pub bytes: Vec<u8>,
}

pub struct StagedUpload {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, StagedFile>,
}

impl StagedUpload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn file(&self, name: &str) -> Result<&StagedFile, ApiError> {
        self.files
            .get(name)
            .ok_or_else(|| ApiError::BadRequest(format!("{} file is required", name)))
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/mpeg" => "mpeg",
        "video/x-matroska" => "mkv",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}

// Walk the multipart payload, collecting text fields and file parts. A part
// counts as a file when its content disposition carries a filename.
pub async fn stage_multipart(mut payload: Multipart) -> Result<StagedUpload, ApiError> {
    let limit = max_upload_bytes();
    let mut staged = StagedUpload {
        fields: HashMap::new(),
        files: HashMap::new(),
    };

    while let Ok(Some(mut field)) = payload.try_next().await {
        let disposition = field.content_disposition();
        let name = match disposition.get_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let is_file = disposition.get_filename().is_some();
        let content_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| ApiError::BadRequest(format!("Malformed multipart payload: {}", e)))?;
            if data.len() + chunk.len() > limit {
                return Err(ApiError::BadRequest("Uploaded file is too large".to_string()));
            }
            data.extend_from_slice(&chunk);
        }

        if is_file {
            let ext = extension_for(&content_type).to_string();
            staged.files.insert(
                name,
                StagedFile {
                    content_type,
                    ext,
                    bytes: data,
                },
            );
        } else {
            let text = String::from_utf8(data)
                .map_err(|_| ApiError::BadRequest("Form fields must be UTF-8".to_string()))?;
            staged.fields.insert(name, text);
        }
    }

    Ok(staged)
}

// Store a staged part under a fresh uuid key and return the key.
pub async fn store_object(
    client: &Client,
    prefix: &str,
    file: &StagedFile,
) -> Result<String, ApiError> {
    let key = format!("{}/{}.{}", prefix, Uuid::new_v4(), file.ext);
    client
        .put_object()
        .bucket(bucket_name())
        .key(&key)
        .content_type(&file.content_type)
        .body(ByteStream::from(file.bytes.clone()))
        .send()
        .await
        .map_err(|e| ApiError::Media(format!("put_object {} failed: {:?}", key, e)))?;
    Ok(key)
}
