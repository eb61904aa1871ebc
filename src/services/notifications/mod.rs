pub mod http;
pub mod log;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::Appointment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingCreated,
    Reassigned,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub client_id: String,
    pub appointment: Appointment,
}

impl Notification {
    pub fn booking_created(appointment: &Appointment) -> Self {
        Self {
            kind: NotificationKind::BookingCreated,
            client_id: appointment.client_id.clone(),
            appointment: appointment.clone(),
        }
    }

    pub fn reassigned(appointment: &Appointment) -> Self {
        Self {
            kind: NotificationKind::Reassigned,
            client_id: appointment.client_id.clone(),
            appointment: appointment.clone(),
        }
    }

    /// Message text sent to the client. `client_name` comes from the user
    /// directory when it could be resolved.
    pub fn render(&self, client_name: Option<&str>) -> String {
        let name = client_name.filter(|n| !n.is_empty()).unwrap_or("there");
        let when = self.appointment.scheduled_at.format("%Y-%m-%d %H:%M");
        match self.kind {
            NotificationKind::BookingCreated => format!(
                "Hi {name}! Your appointment has been booked.\n\n\
                 Date and time: {when}\n\n\
                 Thanks for booking with us, see you soon!"
            ),
            NotificationKind::Reassigned => format!(
                "Hi {name}! A slot opened up and you were next on the waitlist.\n\n\
                 Your new appointment: {when}\n\n\
                 Please confirm it at least a couple of hours ahead."
            ),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Hands notifications to a background worker through a bounded queue.
/// Dispatching never blocks and never reports failure to the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Spawns the delivery worker on the current tokio runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(delivery_loop(notifier, rx));
        Self { tx }
    }

    pub fn dispatch(&self, notification: Notification) {
        let appointment_id = notification.appointment.id.clone();
        if let Err(e) = self.tx.try_send(notification) {
            tracing::warn!(
                appointment_id = %appointment_id,
                error = %e,
                "dropping notification"
            );
        }
    }
}

async fn delivery_loop(notifier: Arc<dyn Notifier>, mut rx: mpsc::Receiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        match notifier.notify(&notification).await {
            Ok(()) => tracing::debug!(
                client_id = %notification.client_id,
                kind = ?notification.kind,
                "notification delivered"
            ),
            Err(e) => tracing::error!(
                client_id = %notification.client_id,
                appointment_id = %notification.appointment.id,
                error = %e,
                "notification failed"
            ),
        }
    }
}
