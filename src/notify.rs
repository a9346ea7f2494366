//! 📣 Completion notifications
//!
//! Best-effort fan-out of finished analyses to connected websocket clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Wire shape: `{"event": "analysis_complete", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Notification {
    AnalysisComplete(AnalysisComplete),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisComplete {
    pub job_id: String,
    pub token_name: String,
    pub token_symbol: String,
    pub acronym: String,
    pub wallets_found: usize,
    pub token_id: Option<i64>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// In-process broadcast channel; each websocket connection holds a receiver
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotifier {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        match self.sender.send(notification) {
            Ok(receivers) => debug!("📣 Notification sent to {} subscribers", receivers),
            // Nobody listening is not a failure
            Err(_) => debug!("📣 Notification dropped, no subscribers"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Notification {
        Notification::AnalysisComplete(AnalysisComplete {
            job_id: "ab12cd34".to_string(),
            token_name: "Wrapped SOL".to_string(),
            token_symbol: "WSOL".to_string(),
            acronym: "WS".to_string(),
            wallets_found: 7,
            token_id: Some(42),
        })
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["event"], "analysis_complete");
        assert_eq!(json["data"]["job_id"], "ab12cd34");
        assert_eq!(json["data"]["acronym"], "WS");
        assert_eq!(json["data"]["wallets_found"], 7);
        assert_eq!(json["data"]["token_id"], 42);
    }

    #[tokio::test]
    async fn test_subscribers_receive() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        notifier.deliver(sample()).await.unwrap();
        assert_eq!(rx1.recv().await.unwrap(), sample());
        assert_eq!(rx2.recv().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_no_subscribers_is_ok() {
        let notifier = BroadcastNotifier::new(8);
        assert!(notifier.deliver(sample()).await.is_ok());
    }
}
