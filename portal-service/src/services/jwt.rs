use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::Role;

/// JWT service for access/refresh token pairs.
///
/// HS256 with a shared secret: the portal is the only issuer and verifier, so
/// asymmetric keys buy nothing here.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Claims for access tokens (short-lived)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub jti: String,
}

/// Claims for refresh tokens (long-lived)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Token ID (matches the refresh_sessions record)
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token pair returned to the client alongside the http-only cookies.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    pub fn generate_access_token(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    pub fn generate_refresh_token(
        &self,
        user_id: &str,
        token_id: &str,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(self.refresh_token_expiry_days);

        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            jti: token_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))
    }

    /// Generate both tokens; the returned id keys the refresh_sessions record.
    pub fn generate_token_pair(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
    ) -> Result<(String, String, String), anyhow::Error> {
        let access_token = self.generate_access_token(user_id, email, role)?;
        let refresh_token_id = Uuid::new_v4().to_string();
        let refresh_token = self.generate_refresh_token(user_id, &refresh_token_id)?;

        Ok((access_token, refresh_token, refresh_token_id))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        Ok(token_data.claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<RefreshTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid refresh token: {}", e))?;

        Ok(token_data.claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    pub fn refresh_token_expiry_days(&self) -> i64 {
        self.refresh_token_expiry_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: Secret::new("test-signing-secret-0123456789".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = JwtService::new(&test_config());

        let token = service
            .generate_access_token("user_123", "juan@example.com", Role::User)
            .unwrap();
        assert!(!token.is_empty());

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.email, "juan@example.com");
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let service = JwtService::new(&test_config());

        let token = service
            .generate_refresh_token("user_123", "session_abc")
            .unwrap();
        let claims = service.validate_refresh_token(&token).unwrap();
        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.jti, "session_abc");
    }

    #[test]
    fn test_token_pair_generation() {
        let service = JwtService::new(&test_config());

        let (access, refresh, refresh_id) = service
            .generate_token_pair("user_123", "juan@example.com", Role::Admin)
            .unwrap();

        let access_claims = service.validate_access_token(&access).unwrap();
        assert_eq!(access_claims.role, Role::Admin);

        let refresh_claims = service.validate_refresh_token(&refresh).unwrap();
        assert_eq!(refresh_claims.jti, refresh_id);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let service = JwtService::new(&test_config());
        let other = JwtService::new(&JwtConfig {
            secret: Secret::new("a-different-secret-entirely".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        });

        let token = service
            .generate_access_token("user_123", "juan@example.com", Role::User)
            .unwrap();
        assert!(other.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let service = JwtService::new(&test_config());
        let token = service
            .generate_refresh_token("user_123", "session_abc")
            .unwrap();
        // A refresh token lacks the email claim of an access token.
        assert!(service.validate_access_token(&token).is_err());
    }
}
