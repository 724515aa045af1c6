use super::kv::KvStore;
use crate::error::StoreError;
use crate::profile::types::VoiceProfile;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::watch;

const PROFILE_KEY: &str = "voice_profile";

/// Owner of the persisted voice profile.
///
/// Holds the current profile in a hot-swappable pointer for cheap reads from
/// the generation path, persists it as a single named record in the host's
/// key-value store, and broadcasts a version bump on every change so
/// multiple UI surfaces stay in sync.
pub struct ProfileStore {
    store: Arc<dyn KvStore>,
    current: ArcSwapOption<VoiceProfile>,
    version_tx: watch::Sender<u64>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            store,
            current: ArcSwapOption::empty(),
            version_tx,
        }
    }

    /// Loads the persisted record into the in-memory slot. Call once at
    /// startup; a missing record leaves the slot empty.
    pub async fn load(&self) -> Result<Option<Arc<VoiceProfile>>, StoreError> {
        let Some(value) = self.store.get(PROFILE_KEY).await? else {
            return Ok(None);
        };
        let profile: VoiceProfile = serde_json::from_value(value)
            .map_err(|e| StoreError::Decode(PROFILE_KEY.into(), e.to_string()))?;
        let profile = Arc::new(profile);
        self.current.store(Some(Arc::clone(&profile)));
        self.notify();
        Ok(Some(profile))
    }

    pub async fn save(&self, profile: VoiceProfile) -> Result<Arc<VoiceProfile>, StoreError> {
        let value = serde_json::to_value(&profile)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store.set(PROFILE_KEY, value).await?;

        let profile = Arc::new(profile);
        self.current.store(Some(Arc::clone(&profile)));
        self.notify();
        Ok(profile)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(PROFILE_KEY).await?;
        self.current.store(None);
        self.notify();
        Ok(())
    }

    /// Cheap read of the current profile; `None` when the user has not
    /// trained one yet.
    pub fn current(&self) -> Option<Arc<VoiceProfile>> {
        self.current.load_full()
    }

    /// Change-notification handle. The value is a monotonically increasing
    /// version; receivers re-read [`current`](Self::current) when it bumps.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    fn notify(&self) {
        self.version_tx.send_modify(|version| *version += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::MemoryStore;
    use crate::style::compute_metrics;

    fn profile() -> VoiceProfile {
        VoiceProfile::from_metrics(2, compute_metrics(&["First sample.", "Second sample."]))
    }

    #[tokio::test]
    async fn save_then_current_and_reload() {
        let kv = Arc::new(MemoryStore::new());
        let store = ProfileStore::new(Arc::clone(&kv) as Arc<dyn KvStore>);
        assert!(store.current().is_none());

        store.save(profile()).await.unwrap();
        assert_eq!(store.current().unwrap().sample_count, 2);

        // A second store over the same backend sees the persisted record.
        let reloaded = ProfileStore::new(kv as Arc<dyn KvStore>);
        assert!(reloaded.current().is_none());
        let loaded = reloaded.load().await.unwrap();
        assert_eq!(loaded.unwrap().sample_count, 2);
    }

    #[tokio::test]
    async fn change_notification_bumps_version() {
        let store = ProfileStore::new(Arc::new(MemoryStore::new()));
        let mut rx = store.subscribe();
        let before = *rx.borrow_and_update();

        store.save(profile()).await.unwrap();
        rx.changed().await.unwrap();
        assert!(*rx.borrow() > before);
    }

    #[tokio::test]
    async fn clear_empties_slot_and_record() {
        let store = ProfileStore::new(Arc::new(MemoryStore::new()));
        store.save(profile()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.current().is_none());
        assert!(store.load().await.unwrap().is_none());
    }
}
