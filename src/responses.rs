use actix_web::HttpResponse;
use serde::Serialize;

// Every successful response goes out in the same envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T, message: &str) -> Self {
        ApiResponse {
            status_code,
            data,
            message: message.to_string(),
            success: status_code < 400,
        }
    }
}

pub fn ok<T: Serialize>(data: T, message: &str) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::new(200, data, message))
}

pub fn created<T: Serialize>(data: T, message: &str) -> HttpResponse {
    HttpResponse::Created().json(ApiResponse::new(201, data, message))
}
