//! Notifications delivered to an operator chat.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use herald_core::{
    formatting::escape_html,
    notify::{Notification, NotificationLevel, Notifier},
};

use crate::api::{MessageExtras, TelegramApi, TelegramTarget};

pub struct TelegramNotifier<A> {
    api: Arc<A>,
    target: TelegramTarget,
}

impl<A: TelegramApi> TelegramNotifier<A> {
    pub fn new(api: Arc<A>, target: TelegramTarget) -> Self {
        Self { api, target }
    }
}

fn render(n: &Notification) -> String {
    let icon = match n.level {
        NotificationLevel::Success => "✅",
        NotificationLevel::Failure => "❌",
        NotificationLevel::Info => "ℹ️",
    };
    format!(
        "{icon} <b>{}</b>\n{}",
        escape_html(&n.title),
        escape_html(&n.body)
    )
}

#[async_trait]
impl<A: TelegramApi + 'static> Notifier for TelegramNotifier<A> {
    async fn notify(&self, notification: Notification) {
        let html = render(&notification);
        if let Err(e) = self
            .api
            .send_message(&self.target, &html, &MessageExtras::default())
            .await
        {
            warn!(error = %e, title = %notification.title, "failed to deliver notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::{Call, FakeApi};

    fn target() -> TelegramTarget {
        TelegramTarget {
            bot_token: "t".to_string(),
            chat_id: "42".to_string(),
            thread_id: None,
        }
    }

    #[tokio::test]
    async fn escapes_user_text() {
        let api = Arc::new(FakeApi::default());
        let notifier = TelegramNotifier::new(api.clone(), target());

        notifier
            .notify(Notification::failure(
                "Scheduled post failed",
                "Q&A <draft>: Bad Request",
            ))
            .await;

        match &api.calls()[0] {
            Call::Message { chat_id, text, .. } => {
                assert_eq!(chat_id, "42");
                assert_eq!(
                    text,
                    "❌ <b>Scheduled post failed</b>\nQ&amp;A &lt;draft&gt;: Bad Request"
                );
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let api = Arc::new(FakeApi::default());
        api.fail_with("Unauthorized");
        let notifier = TelegramNotifier::new(api.clone(), target());

        notifier.notify(Notification::info("hi", "there")).await;
        assert_eq!(api.calls().len(), 1);
    }
}
