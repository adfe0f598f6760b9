//! Outbound email. Delivery itself is a collaborator behind [`Mailer`].

use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Returns `true` once the message has been handed off for delivery.
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool;
}

/// Writes messages to the log instead of delivering them. Used when no mail
/// transport is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        log::info!("Email to {}: {}", to, subject);
        log::debug!("Email body: {}", body);
        true
    }
}
