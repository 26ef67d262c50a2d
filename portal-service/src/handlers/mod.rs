pub mod admin_transactions;
pub mod admin_users;
pub mod applications;
pub mod auth;
pub mod settings;
pub mod transactions;
pub mod uploads;
