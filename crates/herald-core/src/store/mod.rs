//! Account store port: drafts and destinations owned outside the publishing core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Destination, Draft, DraftStatus},
    Error, Result,
};

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Keyed store for drafts and destinations.
///
/// The publishing core reads drafts and destinations and only writes back
/// `status`/`scheduled_at` after an attempt.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn list_drafts(&self) -> Result<Vec<Draft>>;
    async fn get_draft(&self, id: &str) -> Result<Option<Draft>>;
    async fn upsert_draft(&self, draft: Draft) -> Result<()>;
    async fn set_draft_status(
        &self,
        id: &str,
        status: DraftStatus,
        scheduled_at: Option<i64>,
    ) -> Result<()>;

    async fn list_destinations(&self) -> Result<Vec<Destination>>;
    async fn upsert_destination(&self, destination: Destination) -> Result<()>;
}

/// Serialized shape shared by the store implementations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub drafts: Vec<Draft>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

impl StoreData {
    fn upsert_draft(&mut self, mut draft: Draft) {
        draft.updated_at = now_ms();
        match self.drafts.iter_mut().find(|d| d.id == draft.id) {
            Some(existing) => *existing = draft,
            None => self.drafts.push(draft),
        }
    }

    fn set_draft_status(
        &mut self,
        id: &str,
        status: DraftStatus,
        scheduled_at: Option<i64>,
    ) -> Result<()> {
        let draft = self
            .drafts
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::NotFound(format!("draft {id}")))?;
        draft.status = status;
        draft.scheduled_at = scheduled_at;
        draft.updated_at = now_ms();
        Ok(())
    }

    fn upsert_destination(&mut self, destination: Destination) {
        match self
            .destinations
            .iter_mut()
            .find(|d| d.id == destination.id)
        {
            Some(existing) => *existing = destination,
            None => self.destinations.push(destination),
        }
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
