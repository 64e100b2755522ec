use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{Destination, Draft, DraftStatus},
    store::{AccountStore, StoreData},
    Result,
};

/// Local-first store backed by one JSON document `{ drafts, destinations }`.
///
/// Every read reloads the file so edits made by other processes are seen on
/// the next scheduler tick. Writes are serialized and replace the file atomically.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreData> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(txt) if txt.trim().is_empty() => Ok(StoreData::default()),
            Ok(txt) => Ok(serde_json::from_str(&txt)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, data: &StoreData) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let txt = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, txt).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T> + Send) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        let out = f(&mut data)?;
        self.save(&data).await?;
        Ok(out)
    }
}

#[async_trait]
impl AccountStore for JsonFileStore {
    async fn list_drafts(&self) -> Result<Vec<Draft>> {
        Ok(self.load().await?.drafts)
    }

    async fn get_draft(&self, id: &str) -> Result<Option<Draft>> {
        Ok(self.load().await?.drafts.into_iter().find(|d| d.id == id))
    }

    async fn upsert_draft(&self, draft: Draft) -> Result<()> {
        self.update(|data| {
            data.upsert_draft(draft);
            Ok(())
        })
        .await
    }

    async fn set_draft_status(
        &self,
        id: &str,
        status: DraftStatus,
        scheduled_at: Option<i64>,
    ) -> Result<()> {
        self.update(|data| data.set_draft_status(id, status, scheduled_at))
            .await
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>> {
        Ok(self.load().await?.destinations)
    }

    async fn upsert_destination(&self, destination: Destination) -> Result<()> {
        self.update(|data| {
            data.upsert_destination(destination);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DestinationCredentials, ProviderKind, TelegramCredentials};

    fn tmp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("herald-{name}-{}-{nanos}.json", std::process::id()))
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let store = JsonFileStore::new(tmp_path("missing"));
        assert!(store.list_drafts().await.unwrap().is_empty());
        assert!(store.list_destinations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_survive_a_fresh_store_instance() {
        let path = tmp_path("roundtrip");
        let store = JsonFileStore::new(&path);

        store
            .upsert_draft(Draft::new("d1", "topic", "body"))
            .await
            .unwrap();
        store
            .upsert_destination(Destination {
                id: "tg".to_string(),
                provider: ProviderKind::Telegram,
                name: "Main".to_string(),
                is_active: true,
                credentials: DestinationCredentials::Telegram(TelegramCredentials {
                    bot_token: "t".to_string(),
                    channel_id: "@main".to_string(),
                    message_thread_id: None,
                }),
            })
            .await
            .unwrap();
        store
            .set_draft_status("d1", DraftStatus::Scheduled, Some(1_700_000_000_000))
            .await
            .unwrap();

        let reopened = JsonFileStore::new(&path);
        let drafts = reopened.list_drafts().await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].status, DraftStatus::Scheduled);
        assert_eq!(drafts[0].scheduled_at, Some(1_700_000_000_000));
        assert_eq!(reopened.list_destinations().await.unwrap()[0].id, "tg");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn picks_up_external_edits() {
        let path = tmp_path("external");
        let store = JsonFileStore::new(&path);
        assert!(store.list_drafts().await.unwrap().is_empty());

        std::fs::write(
            &path,
            r#"{"drafts":[{"id":"ext","topic":"t","content":"hi","status":"scheduled","scheduled_at":5}]}"#,
        )
        .unwrap();
        let drafts = store.list_drafts().await.unwrap();
        assert_eq!(drafts[0].id, "ext");
        assert!(drafts[0].is_due(5));

        let _ = std::fs::remove_file(&path);
    }
}
