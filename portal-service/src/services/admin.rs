//! Administrative user management.

use bson::doc;
use futures::TryStreamExt;
use uuid::Uuid;

use crate::dtos::admin::{ListUsersQuery, UpdateUserRequest};
use crate::dtos::Paginated;
use crate::models::{Role, SanitizedUser, User};
use crate::services::{PortalDb, ServiceError};

#[derive(Clone)]
pub struct AdminService {
    db: PortalDb,
}

impl AdminService {
    pub fn new(db: PortalDb) -> Self {
        Self { db }
    }

    pub async fn list_users(
        &self,
        query: &ListUsersQuery,
    ) -> Result<Paginated<SanitizedUser>, ServiceError> {
        let mut filter = doc! {};
        if let Some(role) = query.role.as_deref().filter(|r| !r.is_empty()) {
            filter.insert("role", role);
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = regex_escape(search.trim());
            filter.insert(
                "$or",
                vec![
                    doc! { "email": { "$regex": &pattern, "$options": "i" } },
                    doc! { "full_name": { "$regex": &pattern, "$options": "i" } },
                ],
            );
        }

        let total = self
            .db
            .users()
            .count_documents(filter.clone(), None)
            .await?;

        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(query.pagination.skip())
            .limit(query.pagination.limit())
            .build();
        let users: Vec<User> = self
            .db
            .users()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;

        Ok(Paginated {
            items: users.iter().map(User::sanitized).collect(),
            total,
            page: query.pagination.page,
            per_page: query.pagination.limit(),
        })
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<SanitizedUser, ServiceError> {
        let user = self
            .db
            .users()
            .find_one(doc! { "_id": user_id.to_string() }, None)
            .await?
            .ok_or(ServiceError::UserNotFound)?;
        Ok(user.sanitized())
    }

    /// Role and permission grants require the caller to be a super admin;
    /// ordinary admins may only edit the profile fields.
    pub async fn update_user(
        &self,
        actor: &User,
        user_id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<SanitizedUser, ServiceError> {
        let mut user = self
            .db
            .users()
            .find_one(doc! { "_id": user_id.to_string() }, None)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let grants_requested =
            req.role.is_some() || req.permissions.is_some() || req.allowed_services.is_some();
        if grants_requested && actor.role != Role::SuperAdmin {
            return Err(ServiceError::Forbidden(
                "only a super admin may change roles or grants".to_string(),
            ));
        }

        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(permissions) = req.permissions {
            user.permissions = permissions;
        }
        if let Some(allowed_services) = req.allowed_services {
            user.allowed_services = allowed_services;
        }
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

    pub async fn delete_user(&self, actor: &User, user_id: Uuid) -> Result<(), ServiceError> {
        if actor.role != Role::SuperAdmin {
            return Err(ServiceError::Forbidden(
                "only a super admin may delete users".to_string(),
            ));
        }
        if actor.id == user_id {
            return Err(ServiceError::InvalidParameter(
                "cannot delete your own account".to_string(),
            ));
        }

        let result = self
            .db
            .users()
            .delete_one(doc! { "_id": user_id.to_string() }, None)
            .await?;
        if result.deleted_count == 0 {
            return Err(ServiceError::UserNotFound);
        }

        self.db
            .refresh_sessions()
            .delete_many(doc! { "user_id": user_id.to_string() }, None)
            .await?;
        Ok(())
    }
}

/// Escape regex metacharacters so user search input matches literally.
fn regex_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_escape_neutralizes_metacharacters() {
        assert_eq!(regex_escape("a.b+c"), "a\\.b\\+c");
        assert_eq!(regex_escape("plain"), "plain");
        assert_eq!(regex_escape("(x|y)"), "\\(x\\|y\\)");
    }
}
