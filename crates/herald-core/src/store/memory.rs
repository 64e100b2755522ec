use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{Destination, Draft, DraftStatus},
    store::{AccountStore, StoreData},
    Result,
};

/// In-process store, used by tests and embedders that sync elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
}

impl MemoryStore {
    pub fn new(data: StoreData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn list_drafts(&self) -> Result<Vec<Draft>> {
        Ok(self.data.lock().await.drafts.clone())
    }

    async fn get_draft(&self, id: &str) -> Result<Option<Draft>> {
        let data = self.data.lock().await;
        Ok(data.drafts.iter().find(|d| d.id == id).cloned())
    }

    async fn upsert_draft(&self, draft: Draft) -> Result<()> {
        self.data.lock().await.upsert_draft(draft);
        Ok(())
    }

    async fn set_draft_status(
        &self,
        id: &str,
        status: DraftStatus,
        scheduled_at: Option<i64>,
    ) -> Result<()> {
        self.data
            .lock()
            .await
            .set_draft_status(id, status, scheduled_at)
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>> {
        Ok(self.data.lock().await.destinations.clone())
    }

    async fn upsert_destination(&self, destination: Destination) -> Result<()> {
        self.data.lock().await.upsert_destination(destination);
        Ok(())
    }
}
