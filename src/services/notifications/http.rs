use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Notification, Notifier};

#[derive(Debug, Deserialize)]
struct DirectoryUser {
    #[serde(alias = "nombre")]
    name: Option<String>,
    #[serde(alias = "telefono")]
    phone: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    client_id: &'a str,
    phone: &'a str,
    message: String,
}

/// Resolves the client through the user directory and hands the rendered
/// message to the notification service, which owns the actual delivery queue.
pub struct HttpNotifier {
    notification_url: String,
    users_service_url: Option<String>,
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(notification_url: String, users_service_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            notification_url,
            users_service_url,
            client,
        }
    }

    async fn lookup_user(&self, client_id: &str) -> anyhow::Result<Option<DirectoryUser>> {
        let Some(base) = &self.users_service_url else {
            return Ok(None);
        };
        let url = format!("{}/{}", base.trim_end_matches('/'), client_id);

        let res = self
            .client
            .get(&url)
            .header("X-Internal-Call", "true")
            .send()
            .await
            .context("failed to reach user directory")?;

        if res.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(client_id, "client not found in user directory");
            return Ok(None);
        }

        let user = res
            .error_for_status()
            .context("user directory returned error")?
            .json::<DirectoryUser>()
            .await
            .context("invalid user directory response")?;
        Ok(Some(user))
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let user = self.lookup_user(&notification.client_id).await?;

        let phone = user
            .as_ref()
            .and_then(|u| u.phone.as_deref())
            .filter(|p| !p.is_empty());
        let Some(phone) = phone else {
            tracing::warn!(client_id = %notification.client_id, "client has no phone, skipping notification");
            return Ok(());
        };

        let body = OutboundMessage {
            client_id: &notification.client_id,
            phone,
            message: notification.render(user.as_ref().and_then(|u| u.name.as_deref())),
        };

        self.client
            .post(&self.notification_url)
            .json(&body)
            .send()
            .await
            .context("failed to publish notification")?
            .error_for_status()
            .context("notification service returned error")?;

        tracing::info!(client_id = %notification.client_id, phone, "notification published");
        Ok(())
    }
}
