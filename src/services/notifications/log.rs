use async_trait::async_trait;

use super::{Notification, Notifier};

/// Used when no delivery endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            client_id = %notification.client_id,
            appointment_id = %notification.appointment.id,
            message = %notification.render(None),
            "notification (log only)"
        );
        Ok(())
    }
}
