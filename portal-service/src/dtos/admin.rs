use serde::Deserialize;
use validator::Validate;

use crate::models::Role;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
    /// Case-insensitive substring match on email or full name.
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: super::Pagination,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub permissions: Option<Vec<String>>,
    pub allowed_services: Option<Vec<String>>,
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
}
