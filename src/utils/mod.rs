pub mod auth;
pub mod jwt;
pub mod mailer;
pub mod password;
pub mod validation;
