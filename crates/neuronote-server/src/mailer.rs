//! Outgoing mail seam. Delivery itself is out of scope; the default mailer
//! only logs.

use neuronote_core::Result;
use neuronote_store::User;
use tracing::{debug, info};

pub trait Mailer: Send + Sync {
    /// Deliver a password reset token to `user`.
    fn send_password_reset(&self, user: &User, token: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_password_reset(&self, user: &User, token: &str) -> Result<()> {
        info!("Password reset issued for {} <{}>", user.username, user.email);
        debug!("Reset token for {}: {}", user.username, token);
        Ok(())
    }
}
