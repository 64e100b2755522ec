//! Publish router: fans one post out across destinations and their gateways.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    domain::{Destination, ImageRef, PublishOptions, SendOptions},
    formatting::strip_tags,
    gateway::{DestinationGateway, GatewayRegistry},
    splitter::split_into_parts,
};

/// Result of one destination + part send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub destination_id: String,
    pub destination_name: String,
    pub part_index: usize,
    pub error: Option<String>,
}

impl DeliveryAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// In-memory aggregate of one publish run. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Part sends that succeeded, summed over all destinations.
    pub success_count: usize,
    pub attempts: Vec<DeliveryAttempt>,
}

impl PublishOutcome {
    fn record(&mut self, destination: &Destination, part_index: usize, error: Option<String>) {
        if error.is_none() {
            self.success_count += 1;
        }
        self.attempts.push(DeliveryAttempt {
            destination_id: destination.id.clone(),
            destination_name: destination.name.clone(),
            part_index,
            error,
        });
    }

    /// Distinct destinations that accepted at least one part.
    pub fn destinations_reached(&self) -> usize {
        let mut ids: Vec<&str> = self
            .attempts
            .iter()
            .filter(|a| a.succeeded())
            .map(|a| a.destination_id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    pub fn first_error(&self) -> Option<&str> {
        self.attempts.iter().find_map(|a| a.error.as_deref())
    }
}

pub struct PublishRouter {
    registry: Arc<GatewayRegistry>,
    part_delay: Duration,
}

impl PublishRouter {
    pub fn new(registry: Arc<GatewayRegistry>, part_delay: Duration) -> Self {
        Self {
            registry,
            part_delay,
        }
    }

    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    /// Delimiter parts as `gateway` would send them; blanks left by sanitizing are dropped.
    fn parts_for(gateway: &dyn DestinationGateway, content: &str) -> Vec<String> {
        split_into_parts(content)
            .iter()
            .map(|p| gateway.sanitize(p))
            .filter(|p| !strip_tags(p).trim().is_empty())
            .collect()
    }

    /// True when no destination with a registered gateway would receive a single part.
    pub fn nothing_to_send(&self, content: &str, destinations: &[Destination]) -> bool {
        destinations
            .iter()
            .filter_map(|d| self.registry.resolve(d.provider).ok())
            .all(|gateway| Self::parts_for(gateway.as_ref(), content).is_empty())
    }

    /// Send `content` to every destination, destinations outer and parts inner.
    ///
    /// A failing destination never stops the others. Within one destination a
    /// failed part aborts that destination's remaining parts so parts always
    /// arrive in order. The image rides on the first part only; `opts` (buttons,
    /// silent) on the last part only.
    pub async fn publish(
        &self,
        content: &str,
        image: Option<&ImageRef>,
        destinations: &[Destination],
        opts: &PublishOptions,
    ) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();

        for destination in destinations {
            let gateway = match self.registry.resolve(destination.provider) {
                Ok(g) => g,
                Err(e) => {
                    warn!(destination = %destination.id, error = %e, "no gateway for destination");
                    outcome.record(destination, 0, Some(e.to_string()));
                    continue;
                }
            };

            if destination.credentials.provider() != destination.provider {
                let msg = format!(
                    "destination {} is tagged {} but carries {} credentials",
                    destination.id,
                    destination.provider,
                    destination.credentials.provider()
                );
                warn!(destination = %destination.id, "{msg}");
                outcome.record(destination, 0, Some(msg));
                continue;
            }

            let parts = Self::parts_for(gateway.as_ref(), content);
            let last = parts.len().saturating_sub(1);

            for (idx, part) in parts.iter().enumerate() {
                if idx > 0 && !self.part_delay.is_zero() {
                    sleep(self.part_delay).await;
                }

                let part_image = if idx == 0 { image } else { None };
                let send_opts = if idx == last {
                    SendOptions::from(opts)
                } else {
                    SendOptions::default()
                };

                match gateway
                    .send_chunk(destination, part, part_image, &send_opts)
                    .await
                {
                    Ok(()) => {
                        info!(destination = %destination.id, part = idx, "part delivered");
                        outcome.record(destination, idx, None);
                    }
                    Err(e) => {
                        warn!(destination = %destination.id, part = idx, error = %e, "part delivery failed");
                        outcome.record(destination, idx, Some(e.to_string()));
                        break;
                    }
                }
            }
        }

        outcome
    }
}
