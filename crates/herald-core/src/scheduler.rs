//! Scheduler loop for due drafts.
//!
//! - Polls the account store on a fixed interval (plus one immediate check)
//! - Publishes every due draft sequentially through the publish router
//! - Never overlaps itself: a tick that finds the previous one still running is skipped
//! - Re-reads each draft under its lock, so a draft published meanwhile is not sent again
//! - Failed drafts stay `scheduled` and are retried on a later tick
//! - Notifications are fire-and-forget and never hold up the next draft

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    destinations::resolve_destinations,
    domain::{Draft, DraftStatus, PublishOptions, TelegramCredentials},
    locks::DraftLocks,
    notify::{Notification, Notifier},
    publisher::plural_destinations,
    router::PublishRouter,
    splitter::split_into_parts,
    store::{now_ms, AccountStore},
    Error, Result,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub legacy: Option<TelegramCredentials>,
    pub options: PublishOptions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            legacy: None,
            options: PublishOptions::default(),
        }
    }
}

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The previous tick was still running; nothing was done.
    pub overlapped: bool,
    pub due: usize,
    pub published: usize,
    pub failed: usize,
    /// Due drafts held by a concurrent manual publish, no longer due when
    /// re-read, or already delivered and only waiting on their status write.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct PostScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    store: Arc<dyn AccountStore>,
    router: Arc<PublishRouter>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<DraftLocks>,
    cfg: SchedulerConfig,
    running: AtomicBool,
    /// Delivered drafts whose `published` status could not be saved.
    unsaved: Mutex<HashSet<String>>,
}

/// Clears the running flag however the tick ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PostScheduler {
    pub fn new(
        store: Arc<dyn AccountStore>,
        router: Arc<PublishRouter>,
        notifier: Arc<dyn Notifier>,
        locks: Arc<DraftLocks>,
        cfg: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                router,
                notifier,
                locks,
                cfg,
                running: AtomicBool::new(false),
                unsaved: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Whether a tick is executing right now.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Run the polling loop until `cancel` fires.
    ///
    /// The first interval tick completes immediately, which gives the eager
    /// check on activation.
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();
        let period = self.inner.cfg.interval;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = period.as_millis() as u64, "scheduler started");
            loop {
                tokio::select! {
                  _ = cancel.cancelled() => break,
                  _ = tick.tick() => {
                    if let Err(e) = scheduler.tick().await {
                      error!(error = %e, "scheduler tick failed");
                    }
                  }
                }
            }
            info!("scheduler stopped");
        })
    }

    pub async fn tick(&self) -> Result<TickReport> {
        self.tick_at(now_ms()).await
    }

    pub async fn tick_at(&self, now_ms: i64) -> Result<TickReport> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("previous tick still running; skipping");
            return Ok(TickReport {
                overlapped: true,
                ..Default::default()
            });
        }
        let _running = RunningGuard(&self.inner.running);

        let due: Vec<String> = self
            .inner
            .store
            .list_drafts()
            .await?
            .into_iter()
            .filter(|d| d.is_due(now_ms))
            .map(|d| d.id)
            .collect();

        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            return Ok(report);
        }

        info!(count = due.len(), "publishing due drafts");
        for draft_id in due {
            let Some(_guard) = self.inner.locks.try_lock(&draft_id) else {
                debug!(draft_id = %draft_id, "draft is being published elsewhere; skipping");
                report.skipped += 1;
                continue;
            };

            if self.retry_unsaved(&draft_id).await {
                report.skipped += 1;
                continue;
            }

            // The listing may be stale by now; only the stored draft counts.
            let draft = match self.inner.store.get_draft(&draft_id).await {
                Ok(Some(d)) if d.is_due(now_ms) => d,
                Ok(_) => {
                    debug!(draft_id = %draft_id, "draft is no longer due; skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(draft_id = %draft_id, error = %e, "failed to reload draft");
                    report.failed += 1;
                    continue;
                }
            };

            match self.publish_due(&draft).await {
                Ok(reached) => {
                    report.published += 1;
                    self.notify(Notification::success(
                        "Scheduled post published",
                        format!(
                            "{} ({})",
                            draft.display_title(),
                            plural_destinations(reached)
                        ),
                    ));
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(draft_id = %draft.id, error = %e, "scheduled publish failed");
                    self.notify(Notification::failure(
                        "Scheduled post failed",
                        format!("{}: {e}", draft.display_title()),
                    ));
                }
            }
        }

        Ok(report)
    }

    fn notify(&self, notification: Notification) {
        let notifier = self.inner.notifier.clone();
        tokio::spawn(async move { notifier.notify(notification).await });
    }

    fn unsaved(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner.unsaved.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Retry only the status write for a draft that already went out.
    ///
    /// Returns `false` when the draft is not waiting on one.
    async fn retry_unsaved(&self, draft_id: &str) -> bool {
        if !self.unsaved().contains(draft_id) {
            return false;
        }
        match self
            .inner
            .store
            .set_draft_status(draft_id, DraftStatus::Published, None)
            .await
        {
            Ok(()) => {
                self.unsaved().remove(draft_id);
                info!(draft_id = %draft_id, "saved published status");
            }
            Err(e) => {
                warn!(draft_id = %draft_id, error = %e, "still unable to save published status");
            }
        }
        true
    }

    /// Publish one due draft; returns the number of destinations reached.
    async fn publish_due(&self, draft: &Draft) -> Result<usize> {
        if split_into_parts(&draft.content).is_empty() {
            return Err(Error::Validation("post content is empty".to_string()));
        }

        let all = self.inner.store.list_destinations().await?;
        let destinations = resolve_destinations(&all, self.inner.cfg.legacy.as_ref());
        if destinations.is_empty() {
            return Err(Error::no_destination());
        }
        if self
            .inner
            .router
            .nothing_to_send(&draft.content, &destinations)
        {
            return Err(Error::Validation(
                "post has no text left after formatting".to_string(),
            ));
        }

        let image = draft.image();
        let outcome = self
            .inner
            .router
            .publish(
                &draft.content,
                image.as_ref(),
                &destinations,
                &self.inner.cfg.options,
            )
            .await;

        if outcome.success_count == 0 {
            return Err(Error::Delivery(
                outcome
                    .first_error()
                    .unwrap_or("no destination accepted the post")
                    .to_string(),
            ));
        }

        if let Err(e) = self
            .inner
            .store
            .set_draft_status(&draft.id, DraftStatus::Published, None)
            .await
        {
            // The post is out; never send it again, only retry the write.
            error!(draft_id = %draft.id, error = %e, "failed to mark draft published");
            self.unsaved().insert(draft.id.clone());
        }
        info!(draft_id = %draft.id, parts = outcome.success_count, "scheduled draft published");
        Ok(outcome.destinations_reached())
    }
}

// === Tests ===
