//! Investor notifications.
//!
//! Delivery is best-effort: the service reports a failed notification and
//! carries on, the transition it announces has already been committed.
use super::config::NotificationConfig;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Records each delivery as a tracing event in place of a mail transport.
#[derive(Debug, Clone)]
pub struct TracingNotifier {
    sender: String,
    enabled: bool,
}

impl TracingNotifier {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            enabled: true,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            sender: config.sender.clone(),
            enabled: config.enabled,
        }
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        if !self.enabled {
            debug!(to = %notification.recipient, "notifications disabled, dropping message");
            return Ok(());
        }
        if !notification.recipient.contains('@') {
            anyhow::bail!("invalid recipient address '{}'", notification.recipient);
        }

        info!(
            from = %self.sender,
            to = %notification.recipient,
            subject = %notification.subject,
            with_attachment = notification.attachment.is_some(),
            "notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(recipient: &str) -> Notification {
        Notification {
            recipient: recipient.into(),
            subject: "Loan Agreement".into(),
            body: "Thank you".into(),
            attachment: None,
        }
    }

    #[test]
    fn rejects_malformed_recipient() {
        let notifier = TracingNotifier::new("loans@ledger.example");

        assert!(notifier.notify(&message("ana@example.com")).is_ok());
        assert!(notifier.notify(&message("not-an-address")).is_err());
    }

    #[test]
    fn disabled_notifier_drops_everything() {
        let config = NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        };
        let notifier = TracingNotifier::from_config(&config);

        assert!(notifier.notify(&message("not-an-address")).is_ok());
    }
}
