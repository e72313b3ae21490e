//! Best-effort notification fan-out. Channel failures are logged and
//! skipped; a slow or failing channel never delays rotation.

use crate::config::{ChannelConfig, ChannelKind, NotificationConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Lifecycle notifications a channel can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RotationScheduled,
    RotationStarted,
    RotationCompleted,
    RotationFailed,
    ExpiryWarning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RotationScheduled => "rotation_scheduled",
            NotificationKind::RotationStarted => "rotation_started",
            NotificationKind::RotationCompleted => "rotation_completed",
            NotificationKind::RotationFailed => "rotation_failed",
            NotificationKind::ExpiryWarning => "expiry_warning",
        }
    }
}

pub struct NotificationDispatcher {
    config: Option<NotificationConfig>,
    http: reqwest::Client,
}

impl NotificationDispatcher {
    pub fn new(config: Option<NotificationConfig>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub(crate) fn subscribed(&self, kind: NotificationKind) -> bool {
        self.config
            .as_ref()
            .map(|c| c.events.contains(&kind))
            .unwrap_or(false)
    }

    /// Fan a payload out to every configured channel. Fire-and-forget:
    /// each send runs on its own task.
    pub fn dispatch(&self, kind: NotificationKind, mut payload: Value) {
        if !self.subscribed(kind) {
            return;
        }
        let Some(config) = &self.config else {
            return;
        };

        payload["event_kind"] = json!(kind.as_str());

        for channel in config.channels.iter().cloned() {
            let http = self.http.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                deliver(http, channel, kind, payload).await;
            });
        }
    }
}

async fn deliver(http: reqwest::Client, channel: ChannelConfig, kind: NotificationKind, payload: Value) {
    let outcome = match channel.channel {
        ChannelKind::Webhook => post_webhook(&http, &channel, &payload).await,
        ChannelKind::Slack => post_slack(&http, &channel, kind, &payload).await,
        // Transports for these are the embedder's; record the dispatch.
        ChannelKind::Email | ChannelKind::Pagerduty => {
            debug!(
                channel = ?channel.channel,
                kind = kind.as_str(),
                "notification delegated to external transport"
            );
            Ok(())
        }
    };

    if let Err(e) = outcome {
        warn!(
            channel = ?channel.channel,
            kind = kind.as_str(),
            error = %e,
            "notification channel failed"
        );
    }
}

async fn post_webhook(
    http: &reqwest::Client,
    channel: &ChannelConfig,
    payload: &Value,
) -> anyhow::Result<()> {
    let url = channel
        .settings
        .get("url")
        .ok_or_else(|| anyhow::anyhow!("webhook channel requires a url setting"))?;
    http.post(url)
        .json(payload)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

async fn post_slack(
    http: &reqwest::Client,
    channel: &ChannelConfig,
    kind: NotificationKind,
    payload: &Value,
) -> anyhow::Result<()> {
    let url = channel
        .settings
        .get("url")
        .ok_or_else(|| anyhow::anyhow!("slack channel requires a url setting"))?;
    let secret_id = payload["secretId"].as_str().unwrap_or("unknown");
    let body = json!({
        "text": format!("[{}] secret {}", kind.as_str(), secret_id),
        "attachments": [{ "text": payload.to_string() }],
    });
    http.post(url).json(&body).send().await?.error_for_status()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config_for(kinds: Vec<NotificationKind>, channel: ChannelConfig) -> NotificationConfig {
        NotificationConfig {
            channels: vec![channel],
            events: kinds,
        }
    }

    #[test]
    fn test_no_config_means_no_subscription() {
        let dispatcher = NotificationDispatcher::new(None);
        assert!(!dispatcher.subscribed(NotificationKind::RotationCompleted));
    }

    #[test]
    fn test_subscription_filtering() {
        let dispatcher = NotificationDispatcher::new(Some(config_for(
            vec![NotificationKind::RotationFailed],
            ChannelConfig::webhook("http://localhost/hook"),
        )));

        assert!(dispatcher.subscribed(NotificationKind::RotationFailed));
        assert!(!dispatcher.subscribed(NotificationKind::RotationCompleted));
        assert!(!dispatcher.subscribed(NotificationKind::ExpiryWarning));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&NotificationKind::ExpiryWarning).unwrap();
        assert_eq!(json, "\"expiry_warning\"");
        assert_eq!(NotificationKind::RotationStarted.as_str(), "rotation_started");
    }

    #[tokio::test]
    async fn test_webhook_delivery() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let dispatcher = NotificationDispatcher::new(Some(config_for(
            vec![NotificationKind::RotationCompleted],
            ChannelConfig::webhook(format!("{}/hook", server.url())),
        )));

        dispatcher.dispatch(
            NotificationKind::RotationCompleted,
            json!({"secretId": "db.pw", "newVersion": 2}),
        );

        // delivery runs on a spawned task
        for _ in 0..100 {
            if hook.matched_async().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn test_unsubscribed_kind_is_dropped() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .expect(0)
            .create_async()
            .await;

        let dispatcher = NotificationDispatcher::new(Some(config_for(
            vec![NotificationKind::RotationCompleted],
            ChannelConfig::webhook(format!("{}/hook", server.url())),
        )));

        dispatcher.dispatch(NotificationKind::ExpiryWarning, json!({"secretId": "db.pw"}));
        tokio::time::sleep(Duration::from_millis(50)).await;
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_propagate() {
        let dispatcher = NotificationDispatcher::new(Some(config_for(
            vec![NotificationKind::RotationFailed],
            // nothing listens here; the send fails and is swallowed
            ChannelConfig::webhook("http://127.0.0.1:1/hook"),
        )));

        dispatcher.dispatch(NotificationKind::RotationFailed, json!({"secretId": "db.pw"}));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
