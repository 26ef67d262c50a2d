use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApplicationRequest {
    #[validate(length(min = 1))]
    pub service_id: String,
    /// Answers keyed by field name; free-form until submit.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationRequest {
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListApplicationsQuery {
    pub status: Option<String>,
    pub service_id: Option<String>,
    #[serde(flatten)]
    pub pagination: super::Pagination,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(min = 1))]
    pub status: String,
    #[validate(length(max = 2000))]
    pub remarks: Option<String>,
}
