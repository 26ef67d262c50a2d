use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct PresignUploadRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1, max = 128))]
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub url: String,
    pub key: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct PresignDownloadQuery {
    pub key: String,
}
