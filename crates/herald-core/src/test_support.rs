//! Shared fakes for unit tests.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    domain::{Destination, ImageRef, ProviderKind, SendOptions, TelegramCredentials},
    gateway::DestinationGateway,
    notify::{Notification, Notifier},
    Error, Result,
};

#[derive(Clone, Debug)]
pub struct SentChunk {
    pub destination_id: String,
    pub text: String,
    pub image: Option<ImageRef>,
    pub opts: SendOptions,
}

/// Records every send; destinations listed in `failing` reject every chunk.
#[derive(Default)]
pub struct FakeGateway {
    sent: Mutex<Vec<SentChunk>>,
    failing: Mutex<HashSet<String>>,
    tests: Mutex<usize>,
    gate: Mutex<Option<Arc<Notify>>>,
    entered: Arc<Notify>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, destination_id: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(destination_id.to_string());
    }

    /// Block sends until `release_sends` is called.
    pub fn hold_sends(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }

    /// Let the held send through and stop holding later ones.
    pub fn release_sends(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.notify_one();
        }
    }

    /// Signalled when a send reaches the gateway.
    pub fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    pub fn sent(&self) -> Vec<SentChunk> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|c| c.text).collect()
    }

    pub fn connection_tests(&self) -> usize {
        *self.tests.lock().unwrap()
    }
}

#[async_trait]
impl DestinationGateway for FakeGateway {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Telegram
    }

    fn sanitize(&self, text: &str) -> String {
        crate::formatting::sanitize_telegram_html(text)
    }

    async fn send_chunk(
        &self,
        destination: &Destination,
        text: &str,
        image: Option<&ImageRef>,
        opts: &SendOptions,
    ) -> Result<()> {
        self.entered.notify_one();
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.sent.lock().unwrap().push(SentChunk {
            destination_id: destination.id.clone(),
            text: text.to_string(),
            image: image.cloned(),
            opts: opts.clone(),
        });

        if self.failing.lock().unwrap().contains(&destination.id) {
            return Err(Error::Delivery("Bad Request: chat not found".to_string()));
        }
        Ok(())
    }

    async fn test_connection(&self, _destination: &Destination) -> Result<()> {
        *self.tests.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
    arrived: Notify,
}

impl RecordingNotifier {
    pub fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    /// Wait until at least `n` notifications arrived; panics after five seconds.
    pub async fn wait_for(&self, n: usize) -> Vec<Notification> {
        let wait = async {
            loop {
                let seen = self.seen();
                if seen.len() >= n {
                    return seen;
                }
                self.arrived.notified().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("expected {n} notifications, got {:?}", self.seen()))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
        self.arrived.notify_one();
    }
}

/// Never finishes delivering a notification.
pub struct StuckNotifier;

#[async_trait]
impl Notifier for StuckNotifier {
    async fn notify(&self, _notification: Notification) {
        std::future::pending::<()>().await;
    }
}

pub fn telegram_destination(id: &str) -> Destination {
    Destination::telegram(
        id,
        format!("Channel {id}"),
        TelegramCredentials {
            bot_token: format!("token-{id}"),
            channel_id: format!("@{id}"),
            message_thread_id: None,
        },
    )
}
