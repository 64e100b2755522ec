use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{Destination, DestinationCredentials, ImageRef, ProviderKind, SendOptions},
    gateway::port::DestinationGateway,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between any two sends through this gateway.
    pub global_min_interval: Duration,
    /// Minimum spacing between sends that land in the same chat or page.
    pub per_address_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // Telegram allows ~30 messages/s per bot and ~1/s into one chat.
        Self {
            global_min_interval: Duration::from_millis(40),
            per_address_min_interval: Duration::from_millis(1050),
        }
    }
}

/// Where a destination's messages actually land.
///
/// Two destinations pointing at the same channel (say, different topics)
/// share the channel's flood limit, so they pace together.
fn delivery_address(destination: &Destination) -> String {
    match &destination.credentials {
        DestinationCredentials::Telegram(c) => format!("telegram:{}", c.channel_id.trim()),
        DestinationCredentials::Facebook { page_id, .. } => format!("facebook:{page_id}"),
        DestinationCredentials::WordPress { site_url, .. } => {
            format!("wordpress:{}", site_url.trim_end_matches('/'))
        }
    }
}

/// Earliest start times still free, for the gateway as a whole and per address.
#[derive(Debug)]
struct SendSlots {
    next_any: Instant,
    next_by_address: HashMap<String, Instant>,
}

impl SendSlots {
    fn new(now: Instant) -> Self {
        Self {
            next_any: now,
            next_by_address: HashMap::new(),
        }
    }

    /// Book the earliest start that respects both spacings; returns how long to wait.
    fn book(&mut self, address: &str, cfg: &ThrottleConfig, now: Instant) -> Duration {
        let address_free = self
            .next_by_address
            .get(address)
            .copied()
            .unwrap_or(now);
        let start = now.max(self.next_any).max(address_free);

        self.next_any = start + cfg.global_min_interval;
        self.next_by_address
            .insert(address.to_string(), start + cfg.per_address_min_interval);
        self.next_by_address.retain(|_, free| *free > now);

        start - now
    }
}

/// Gateway decorator that spaces out deliveries.
///
/// The scheduler and a manual publish can interleave against the same channel;
/// this keeps their combined rate under the provider's flood limits.
pub struct ThrottledGateway {
    inner: Arc<dyn DestinationGateway>,
    cfg: ThrottleConfig,
    slots: Mutex<SendSlots>,
}

impl ThrottledGateway {
    pub fn new(inner: Arc<dyn DestinationGateway>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            slots: Mutex::new(SendSlots::new(Instant::now())),
        }
    }

    async fn wait_turn(&self, destination: &Destination) {
        let address = delivery_address(destination);
        let wait = self
            .slots
            .lock()
            .await
            .book(&address, &self.cfg, Instant::now());
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl DestinationGateway for ThrottledGateway {
    fn provider(&self) -> ProviderKind {
        self.inner.provider()
    }

    fn sanitize(&self, text: &str) -> String {
        self.inner.sanitize(text)
    }

    async fn send_chunk(
        &self,
        destination: &Destination,
        text: &str,
        image: Option<&ImageRef>,
        opts: &SendOptions,
    ) -> Result<()> {
        self.wait_turn(destination).await;
        self.inner.send_chunk(destination, text, image, opts).await
    }

    async fn test_connection(&self, destination: &Destination) -> Result<()> {
        self.wait_turn(destination).await;
        self.inner.test_connection(destination).await
    }
}
