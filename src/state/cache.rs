use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::group::GroupState;

/// Registry of per-group state slots.
///
/// Each chat id owns exactly one slot for the process lifetime. The slot is
/// created atomically on first access; hydration from storage happens later,
/// under the slot's own mutex, so concurrent first accesses serialize on the
/// lock and exactly one of them performs the load. The mutex also scopes
/// every check/commit/persist sequence for that group, while leaving other
/// groups free to proceed concurrently.
pub struct GroupCache {
    slots: DashMap<i64, Arc<Mutex<GroupState>>>,
}

impl GroupCache {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Get or create the slot for a chat id. The returned state may not be
    /// hydrated yet; callers go through `AppState::lock_group`.
    pub(crate) fn slot(&self, chat_id: i64) -> Arc<Mutex<GroupState>> {
        self.slots
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(GroupState::vacant(chat_id))))
            .clone()
    }

    /// Chat ids currently resident in memory, persisted or not.
    pub fn resident_ids(&self) -> Vec<i64> {
        self.slots.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of groups currently resident in memory.
    pub fn resident_count(&self) -> usize {
        self.slots.len()
    }
}

impl Default for GroupCache {
    fn default() -> Self {
        Self::new()
    }
}
