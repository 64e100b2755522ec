use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-draft advisory locks shared by manual publishing and the scheduler.
///
/// Holding the guard marks the draft as in flight; dropping it releases.
#[derive(Default)]
pub struct DraftLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DraftLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire without waiting; `None` means another run owns the draft.
    pub fn try_lock(&self, draft_id: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Drop entries nobody holds so the map does not grow with every draft id.
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(draft_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.try_lock_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_draft_fails_until_released() {
        let locks = DraftLocks::new();
        let guard = locks.try_lock("d1").unwrap();
        assert!(locks.try_lock("d1").is_none());
        assert!(locks.try_lock("d2").is_some());

        drop(guard);
        assert!(locks.try_lock("d1").is_some());
    }
}
