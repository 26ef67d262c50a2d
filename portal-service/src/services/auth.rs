//! Registration, email verification, login, refresh, logout, and profile flows.

use bson::doc;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::auth::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, RegisterResponse, UpdateProfileRequest,
    VerifyEmailRequest,
};
use crate::models::{RefreshSession, SanitizedUser, User, VerificationCode};
use crate::services::database::is_duplicate_key_error;
use crate::services::{EmailProvider, JwtService, PortalDb, ServiceError, TokenResponse};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

const VERIFICATION_CODE_TTL_HOURS: i64 = 24;

#[derive(Clone)]
pub struct AuthService {
    db: PortalDb,
    jwt: JwtService,
    email: Arc<dyn EmailProvider>,
}

impl AuthService {
    pub fn new(db: PortalDb, jwt: JwtService, email: Arc<dyn EmailProvider>) -> Self {
        Self { db, jwt, email }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ServiceError> {
        let email = req.email.trim().to_lowercase();

        let password_hash = hash_password(&Password::new(req.password))?;
        let user = User::new(email.clone(), password_hash.into_string(), req.full_name);

        // The unique email index is the arbiter under concurrent registration.
        if let Err(e) = self.db.users().insert_one(&user, None).await {
            if is_duplicate_key_error(&e) {
                return Err(ServiceError::EmailAlreadyRegistered);
            }
            return Err(e.into());
        }

        self.issue_verification_code(&user).await?;

        Ok(RegisterResponse {
            user: user.sanitized(),
            message: "Registered. Check your email for the verification code.".to_string(),
        })
    }

    async fn issue_verification_code(&self, user: &User) -> Result<(), ServiceError> {
        let code = generate_code();
        let record = VerificationCode::new(
            user.id,
            user.email.clone(),
            code.clone(),
            VERIFICATION_CODE_TTL_HOURS,
        );

        // Replace any outstanding code for this email.
        self.db
            .verification_codes()
            .delete_many(doc! { "email": &user.email }, None)
            .await?;
        self.db
            .verification_codes()
            .insert_one(&record, None)
            .await?;

        // Best-effort: registration stands even when the mail bounces.
        if let Err(e) = self.email.send_verification_code(&user.email, &code).await {
            tracing::warn!(error = %e, email = %user.email, "Verification email failed");
        }
        Ok(())
    }

    pub async fn verify_email(&self, req: VerifyEmailRequest) -> Result<SanitizedUser, ServiceError> {
        let email = req.email.trim().to_lowercase();

        let user = self
            .db
            .users()
            .find_one(doc! { "email": &email }, None)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let record = self
            .db
            .verification_codes()
            .find_one(doc! { "email": &email }, None)
            .await?
            .ok_or(ServiceError::InvalidCode)?;

        if record.is_expired() {
            return Err(ServiceError::CodeExpired);
        }
        if record.code != req.code {
            return Err(ServiceError::InvalidCode);
        }

        self.db
            .users()
            .update_one(
                doc! { "_id": user.id.to_string() },
                doc! { "$set": { "email_verified": true, "updated_at": bson::DateTime::now() } },
                None,
            )
            .await?;
        self.db
            .verification_codes()
            .delete_one(doc! { "_id": record.id.to_string() }, None)
            .await?;

        let mut verified = user;
        verified.email_verified = true;
        Ok(verified.sanitized())
    }

    pub async fn resend_code(&self, email: &str) -> Result<(), ServiceError> {
        let email = email.trim().to_lowercase();
        let user = self
            .db
            .users()
            .find_one(doc! { "email": &email }, None)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if user.email_verified {
            return Err(ServiceError::InvalidParameter(
                "email is already verified".to_string(),
            ));
        }

        self.issue_verification_code(&user).await
    }

    pub async fn login(
        &self,
        req: LoginRequest,
    ) -> Result<(SanitizedUser, TokenResponse), ServiceError> {
        let email = req.email.trim().to_lowercase();

        let user = self
            .db
            .users()
            .find_one(doc! { "email": &email }, None)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        verify_password(
            &Password::new(req.password),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        let tokens = self.issue_token_pair(&user).await?;
        Ok((user.sanitized(), tokens))
    }

    async fn issue_token_pair(&self, user: &User) -> Result<TokenResponse, ServiceError> {
        let (access_token, refresh_token, refresh_id) =
            self.jwt
                .generate_token_pair(&user.id.to_string(), &user.email, user.role)?;

        let session = RefreshSession::new(
            refresh_id,
            user.id,
            self.jwt.refresh_token_expiry_days(),
        );
        self.db.refresh_sessions().insert_one(&session, None).await?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
        })
    }

    /// Rotate a refresh token: the presented token's session must still exist
    /// and be unexpired; it is replaced by the new session.
    pub async fn refresh(
        &self,
        refresh_token: &str,
    ) -> Result<(SanitizedUser, TokenResponse), ServiceError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|_| ServiceError::InvalidToken)?;

        let session = self
            .db
            .refresh_sessions()
            .find_one(doc! { "_id": &claims.jti }, None)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        if session.is_expired() {
            self.db
                .refresh_sessions()
                .delete_one(doc! { "_id": &claims.jti }, None)
                .await?;
            return Err(ServiceError::InvalidToken);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::InvalidToken)?;
        let user = self
            .db
            .users()
            .find_one(doc! { "_id": user_id.to_string() }, None)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        self.db
            .refresh_sessions()
            .delete_one(doc! { "_id": &claims.jti }, None)
            .await?;

        let tokens = self.issue_token_pair(&user).await?;
        Ok((user.sanitized(), tokens))
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), ServiceError> {
        if let Ok(claims) = self.jwt.validate_refresh_token(refresh_token) {
            self.db
                .refresh_sessions()
                .delete_one(doc! { "_id": &claims.jti }, None)
                .await?;
        }
        // An invalid token still logs out: the cookies get cleared either way.
        Ok(())
    }

    // ==================== Profile ====================

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.db
            .users()
            .find_one(doc! { "_id": user_id.to_string() }, None)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<SanitizedUser, ServiceError> {
        let mut user = self.get_user(user_id).await?;

        if let Some(full_name) = req.full_name {
            user.full_name = full_name;
        }
        user.updated_at = bson::DateTime::now();

        self.db
            .users()
            .replace_one(doc! { "_id": user.id.to_string() }, &user, None)
            .await?;
        Ok(user.sanitized())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        let user = self.get_user(user_id).await?;

        verify_password(
            &Password::new(req.current_password),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        let new_hash = hash_password(&Password::new(req.new_password))?;
        self.db
            .users()
            .update_one(
                doc! { "_id": user.id.to_string() },
                doc! { "$set": {
                    "password_hash": new_hash.as_str(),
                    "updated_at": bson::DateTime::now(),
                } },
                None,
            )
            .await?;

        // Revoke outstanding refresh sessions; live access tokens age out.
        self.db
            .refresh_sessions()
            .delete_many(doc! { "user_id": user.id.to_string() }, None)
            .await?;
        Ok(())
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
