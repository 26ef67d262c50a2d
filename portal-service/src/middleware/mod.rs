pub mod auth;

pub use auth::{admin_middleware, auth_middleware, AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
