//! Fan-out of app events to connected clients

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::models::app::AppStatus;
use crate::queue::job::AppCommand;

const DEFAULT_CAPACITY: usize = 256;

/// Event topic; only app events exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    App,
}

/// Payload of an app event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEventData {
    pub app_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_status: Option<AppStatus>,
}

/// `{type: "app", event, data: {appId, error?, appStatus?}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEvent {
    #[serde(rename = "type")]
    pub topic: Topic,
    pub event: String,
    pub data: AppEventData,
}

impl AppEvent {
    fn new(event: String, app_id: &str) -> Self {
        Self {
            topic: Topic::App,
            event,
            data: AppEventData {
                app_id: app_id.to_string(),
                error: None,
                app_status: None,
            },
        }
    }

    pub fn status_change(app_id: &str, status: Option<AppStatus>) -> Self {
        let mut event = Self::new("status_change".to_string(), app_id);
        event.data.app_status = status;
        event
    }

    pub fn success(command: AppCommand, app_id: &str) -> Self {
        Self::new(format!("{}_success", command), app_id)
    }

    pub fn error(command: AppCommand, app_id: &str, error: impl Into<String>) -> Self {
        let mut event = Self::new(format!("{}_error", command), app_id);
        event.data.error = Some(error.into());
        event
    }
}

/// Broadcasts every event to every subscriber, without filtering
pub struct Broadcaster {
    sender: RwLock<Option<broadcast::Sender<AppEvent>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// `None` once the broadcaster has been shut down
    pub fn subscribe(&self) -> Option<broadcast::Receiver<AppEvent>> {
        let sender = self.sender.read().ok()?;
        sender.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Publish an event; dropped silently when nobody listens
    pub fn send(&self, event: AppEvent) {
        let Ok(sender) = self.sender.read() else {
            return;
        };
        if let Some(sender) = sender.as_ref() {
            let delivered = sender.send(event.clone()).unwrap_or(0);
            debug!(
                "Broadcast {} for {} to {} clients",
                event.event, event.data.app_id, delivered
            );
        }
    }

    pub fn client_count(&self) -> usize {
        match self.sender.read() {
            Ok(sender) => sender.as_ref().map_or(0, broadcast::Sender::receiver_count),
            Err(_) => 0,
        }
    }

    /// Close the channel; subscribers observe the end of the stream
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.write() {
            if sender.take().is_some() {
                info!("Notification broadcaster closed");
            }
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
