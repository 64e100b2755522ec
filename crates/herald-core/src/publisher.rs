//! Publish orchestrator: the single entry point for "publish this post now".
//!
//! One invocation walks VALIDATING → RESOLVING_DESTINATIONS → SENDING →
//! FINALIZING and ends either published (at least one part delivered) or
//! failed. Nothing is retried here.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    destinations::resolve_destinations,
    domain::{DraftStatus, ImageRef, PublishOptions, TelegramCredentials},
    locks::DraftLocks,
    router::{PublishOutcome, PublishRouter},
    splitter::{char_len, split_into_parts},
    store::AccountStore,
    Error, Result,
};

/// Pre-flight ceiling on total content length, independent of per-chunk limits.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 5000;

#[derive(Clone, Debug, Default)]
pub struct PublishRequest {
    /// Draft whose status flips to `published` on success.
    pub draft_id: Option<String>,
    pub content: String,
    pub image: Option<ImageRef>,
    /// Falls back to the publisher defaults.
    pub options: Option<PublishOptions>,
}

#[derive(Clone, Debug)]
pub struct PublishReport {
    pub success_count: usize,
    pub destinations_reached: usize,
    pub message: String,
    pub outcome: PublishOutcome,
}

pub struct Publisher {
    store: Arc<dyn AccountStore>,
    router: Arc<PublishRouter>,
    locks: Arc<DraftLocks>,
    legacy: Option<TelegramCredentials>,
    defaults: PublishOptions,
    max_content_length: usize,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn AccountStore>,
        router: Arc<PublishRouter>,
        locks: Arc<DraftLocks>,
    ) -> Self {
        Self {
            store,
            router,
            locks,
            legacy: None,
            defaults: PublishOptions::default(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }

    pub fn with_legacy(mut self, legacy: Option<TelegramCredentials>) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_defaults(mut self, defaults: PublishOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_max_content_length(mut self, max: usize) -> Self {
        self.max_content_length = max;
        self
    }

    /// Publish a stored draft by id.
    pub async fn publish_draft(&self, draft_id: &str) -> Result<PublishReport> {
        let draft = self
            .store
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("draft {draft_id}")))?;

        self.publish(PublishRequest {
            draft_id: Some(draft.id.clone()),
            image: draft.image(),
            content: draft.content,
            options: None,
        })
        .await
    }

    pub async fn publish(&self, req: PublishRequest) -> Result<PublishReport> {
        self.validate(&req.content)?;

        let _guard = match req.draft_id.as_deref() {
            Some(id) => Some(self.locks.try_lock(id).ok_or_else(|| {
                Error::Busy(format!("draft {id} is already being published"))
            })?),
            None => None,
        };

        let all = self.store.list_destinations().await?;
        let destinations = resolve_destinations(&all, self.legacy.as_ref());
        if destinations.is_empty() {
            warn!("publish rejected: no destination configured");
            return Err(Error::no_destination());
        }
        if self.router.nothing_to_send(&req.content, &destinations) {
            return Err(Error::Validation(
                "post has no text left after formatting".to_string(),
            ));
        }

        let opts = req.options.unwrap_or_else(|| self.defaults.clone());
        let outcome = self
            .router
            .publish(&req.content, req.image.as_ref(), &destinations, &opts)
            .await;

        if outcome.success_count == 0 {
            let reason = outcome
                .first_error()
                .unwrap_or("no destination accepted the post")
                .to_string();
            warn!(draft_id = ?req.draft_id, error = %reason, "publish failed on every destination");
            return Err(Error::Delivery(reason));
        }

        let reached = outcome.destinations_reached();
        let mut message = format!("Published to {}", plural_destinations(reached));

        if let Some(id) = req.draft_id.as_deref() {
            if let Err(e) = self
                .store
                .set_draft_status(id, DraftStatus::Published, None)
                .await
            {
                // The post is out; report success but flag the stale status.
                error!(draft_id = %id, error = %e, "failed to mark draft published");
                message.push_str(&format!(" (draft status not saved: {e})"));
            }
        }

        info!(draft_id = ?req.draft_id, destinations = reached, parts = outcome.success_count, "published");
        Ok(PublishReport {
            success_count: outcome.success_count,
            destinations_reached: reached,
            message,
            outcome,
        })
    }

    /// Send a diagnostic message to one destination (or the legacy fallback).
    pub async fn test_connection(&self, destination_id: &str) -> Result<()> {
        let all = self.store.list_destinations().await?;
        let destination = all
            .into_iter()
            .find(|d| d.id == destination_id)
            .or_else(|| {
                resolve_destinations(&[], self.legacy.as_ref())
                    .into_iter()
                    .find(|d| d.id == destination_id)
            })
            .ok_or_else(|| Error::NotFound(format!("destination {destination_id}")))?;

        let gateway = self.router.registry().resolve(destination.provider)?;
        gateway.test_connection(&destination).await
    }

    fn validate(&self, content: &str) -> Result<()> {
        if split_into_parts(content).is_empty() {
            return Err(Error::Validation("post content is empty".to_string()));
        }
        let len = char_len(content);
        if len > self.max_content_length {
            return Err(Error::Validation(format!(
                "post is too long: {len} characters (limit {})",
                self.max_content_length
            )));
        }
        Ok(())
    }
}

pub(crate) fn plural_destinations(n: usize) -> String {
    if n == 1 {
        "1 destination".to_string()
    } else {
        format!("{n} destinations")
    }
}
