pub mod auth;
pub mod email_verification;
pub mod file;
pub mod password_reset;
pub mod plan;
pub mod profile;
pub mod progress;
pub mod water;
