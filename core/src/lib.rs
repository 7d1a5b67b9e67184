pub mod auth;
pub mod error;
pub mod letters;
pub mod moderation;
pub mod roles;
