pub mod admin;
pub mod applications;
pub mod auth;
pub mod settings;
pub mod transactions;
pub mod uploads;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> i64 {
    25
}

/// Shared pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, 200)
    }

    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1) * self.limit() as u64
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_and_skips() {
        let p = Pagination {
            page: 3,
            per_page: 1000,
        };
        assert_eq!(p.limit(), 200);
        assert_eq!(p.skip(), 400);

        let first = Pagination {
            page: 0,
            per_page: 10,
        };
        assert_eq!(first.skip(), 0);
    }
}
