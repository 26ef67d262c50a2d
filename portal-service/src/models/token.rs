//! Short-lived auth artifacts: email verification codes and refresh sessions.

use bson::DateTime;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    /// Six decimal digits, mailed to the citizen.
    pub code: String,
    pub expires_at: DateTime,
    pub created_at: DateTime,
}

impl VerificationCode {
    pub fn new(user_id: Uuid, email: String, code: String, ttl_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            email,
            code,
            expires_at: DateTime::from_chrono(now + Duration::hours(ttl_hours)),
            created_at: DateTime::from_chrono(now),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.to_chrono() < Utc::now()
    }
}

/// Server-side record backing a refresh token, keyed by the token's `jti`.
/// Logout deletes the record, revoking refresh immediately; access tokens simply
/// age out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime,
    pub created_at: DateTime,
}

impl RefreshSession {
    pub fn new(jti: String, user_id: Uuid, ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: jti,
            user_id,
            expires_at: DateTime::from_chrono(now + Duration::days(ttl_days)),
            created_at: DateTime::from_chrono(now),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.to_chrono() < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_code_is_not_expired() {
        let code = VerificationCode::new(Uuid::new_v4(), "a@b.ph".to_string(), "123456".to_string(), 24);
        assert!(!code.is_expired());
    }

    #[test]
    fn zero_ttl_session_is_expired() {
        let session = RefreshSession::new("jti-1".to_string(), Uuid::new_v4(), 0);
        // expires_at == created_at, so any later instant is past expiry
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(session.is_expired());
    }
}
