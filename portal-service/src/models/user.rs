//! Citizen and administrator accounts.

use bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    /// Named admin capabilities, e.g. "settings:write" or "transactions:review".
    pub permissions: Vec<String>,
    /// Allowed-service scope: which service categories' transactions this admin
    /// may see. Empty means unrestricted.
    pub allowed_services: Vec<String>,
    pub email_verified: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    pub fn new(email: String, password_hash: String, full_name: String) -> Self {
        let now = DateTime::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            full_name,
            role: Role::User,
            permissions: Vec::new(),
            allowed_services: Vec::new(),
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == Role::SuperAdmin || self.permissions.iter().any(|p| p == permission)
    }

    /// Projection safe to return to API callers (no password hash).
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser {
            id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            permissions: self.permissions.clone(),
            allowed_services: self.allowed_services.clone(),
            email_verified: self.email_verified,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub allowed_services: Vec<String>,
    pub email_verified: bool,
    pub created_at: DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_defaults_to_unverified_citizen() {
        let user = User::new(
            "juan@example.com".to_string(),
            "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
            "Juan dela Cruz".to_string(),
        );
        assert_eq!(user.role, Role::User);
        assert!(!user.email_verified);
        assert!(user.allowed_services.is_empty());
    }

    #[test]
    fn super_admin_implies_every_permission() {
        let mut user = User::new(
            "admin@lgu.gov.ph".to_string(),
            "hash".to_string(),
            "City Admin".to_string(),
        );
        user.role = Role::SuperAdmin;
        assert!(user.has_permission("settings:write"));

        user.role = Role::Admin;
        assert!(!user.has_permission("settings:write"));
        user.permissions.push("settings:write".to_string());
        assert!(user.has_permission("settings:write"));
    }

    #[test]
    fn sanitized_user_has_no_password_hash() {
        let user = User::new(
            "juan@example.com".to_string(),
            "secret-hash".to_string(),
            "Juan dela Cruz".to_string(),
        );
        let json = serde_json::to_value(user.sanitized()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "juan@example.com");
    }
}
