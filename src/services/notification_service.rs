//! Notificaciones al usuario (toasts)
//!
//! Cada notificación se loguea y se publica en un canal broadcast; la UI (o
//! el binario) se suscribe. Sin suscriptores la notificación solo queda en el log.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::utils::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn success(&self, title: &str, message: impl Into<String>) {
        let message = message.into();
        log::info!("✅ {}: {}", title, message);
        self.publish(NotificationKind::Success, title, message);
    }

    pub fn info(&self, title: &str, message: impl Into<String>) {
        let message = message.into();
        log::info!("ℹ️ {}: {}", title, message);
        self.publish(NotificationKind::Info, title, message);
    }

    /// Notificar un fallo: el detalle va al log, el usuario ve el mensaje genérico
    pub fn error(&self, title: &str, error: &AppError) {
        log::error!("❌ {}: {}", title, error);
        self.publish(NotificationKind::Error, title, error.user_message());
    }

    fn publish(&self, kind: NotificationKind, title: &str, message: String) {
        // sin receptores el envío falla; no es un error
        let _ = self.sender.send(Notification {
            kind,
            title: title.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_shows_generic_message() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        notifier.error("Update failed", &AppError::ExternalApi("row-level security violation".to_string()));

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.kind, NotificationKind::Error);
        assert_eq!(notification.message, "Something went wrong. Please try again");
    }

    #[test]
    fn test_publish_without_subscribers() {
        Notifier::new().success("Vehicle added", "2021 Toyota Hilux");
    }
}
