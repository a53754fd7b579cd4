use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notify failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Notification sink boundary. Fire-and-forget from the engine's
/// perspective: failures are logged by callers, never retried here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, subject: &str, body: &str)
    -> Result<(), NotifyError>;
}

/// Sink that writes notifications to the log. Stands in for an SMTP
/// transport in deployments that have none configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!("notify {recipient}: {subject} — {body}");
        Ok(())
    }
}

/// One delivered notification, as observed by a hub subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Broadcast hub keyed by recipient address. Subscribers get every
/// notification addressed to them; sending to an address nobody watches
/// is a no-op.
pub struct HubNotifier {
    channels: DashMap<String, broadcast::Sender<Delivery>>,
}

impl Default for HubNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HubNotifier {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a recipient. Creates the channel if needed.
    pub fn subscribe(&self, recipient: &str) -> broadcast::Receiver<Delivery> {
        let sender = self
            .channels
            .entry(recipient.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }
}

#[async_trait]
impl Notifier for HubNotifier {
    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        if let Some(sender) = self.channels.get(recipient) {
            let _ = sender.send(Delivery {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = HubNotifier::new();
        let mut rx = hub.subscribe("alice@example.com");

        hub.notify("alice@example.com", "Hello", "body")
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.subject, "Hello");
        assert_eq!(received.body, "body");
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = HubNotifier::new();
        // No subscriber — should not panic or error
        hub.notify("nobody@example.com", "Hello", "body")
            .await
            .unwrap();
    }
}
