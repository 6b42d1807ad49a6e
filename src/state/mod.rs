/// Per-group slot registry with hydrate-once discipline.
pub mod cache;
/// Runtime group model and evaluation report types.
pub mod group;

use std::sync::Arc;

use tokio::sync::{OwnedMutexGuard, RwLock, watch};
use tracing::{error, warn};

use crate::{config::AppConfig, dao::group_store::GroupStore, oracle::SubmissionOracle};

use self::{cache::GroupCache, group::GroupState};

/// Shared handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the group cache, the installed storage
/// backend, the submission oracle, and runtime configuration.
pub struct AppState {
    config: AppConfig,
    group_store: RwLock<Option<Arc<dyn GroupStore>>>,
    oracle: Arc<dyn SubmissionOracle>,
    groups: GroupCache,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be
    /// cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed.
    pub fn new(config: AppConfig, oracle: Arc<dyn SubmissionOracle>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            group_store: RwLock::new(None),
            oracle,
            groups: GroupCache::new(),
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the submission oracle.
    pub fn oracle(&self) -> Arc<dyn SubmissionOracle> {
        self.oracle.clone()
    }

    /// Obtain a handle to the current group store, if one is installed.
    pub async fn group_store(&self) -> Option<Arc<dyn GroupStore>> {
        let guard = self.group_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new group store implementation and leave degraded mode.
    pub async fn install_group_store(&self, store: Arc<dyn GroupStore>) {
        {
            let mut guard = self.group_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current group store and enter degraded mode.
    pub async fn clear_group_store(&self) {
        {
            let mut guard = self.group_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.group_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub(crate) async fn update_degraded(&self, value: bool) {
        if self.is_degraded().await == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Lock a group's slot, hydrating it from storage on first access.
    ///
    /// Every caller for the same chat id observes the same state instance,
    /// and the returned guard serializes the whole check/commit/persist
    /// sequence against concurrent triggers for that group. A store read
    /// failure degrades to a fresh, empty-roster state; the cache stays
    /// authoritative afterwards, so the store is never re-read for this
    /// chat within the process lifetime.
    pub async fn lock_group(&self, chat_id: i64) -> OwnedMutexGuard<GroupState> {
        let slot = self.groups.slot(chat_id);
        let mut guard = slot.lock_owned().await;

        if !guard.hydrated {
            match self.group_store().await {
                Some(store) => match store.load_group(chat_id).await {
                    Ok(Some(entity)) => guard.absorb(entity),
                    Ok(None) => {}
                    Err(err) => {
                        error!(
                            chat_id,
                            error = %err,
                            "failed to hydrate group from storage; starting from an empty roster"
                        );
                    }
                },
                None => {
                    warn!(
                        chat_id,
                        "storage unavailable during hydration; starting from an empty roster"
                    );
                }
            }
            guard.hydrated = true;
        }

        guard
    }

    /// Number of groups currently held in the in-memory cache.
    pub fn resident_group_count(&self) -> usize {
        self.groups.resident_count()
    }

    /// Every chat id this process knows about: ids listed by the store
    /// unioned with ids already resident in memory but not yet persisted.
    pub async fn known_chat_ids(&self) -> Vec<i64> {
        let mut ids = match self.group_store().await {
            Some(store) => match store.list_group_ids().await {
                Ok(ids) => ids,
                Err(err) => {
                    warn!(error = %err, "failed to list group ids from storage; sweeping resident groups only");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        ids.extend(self.groups.resident_ids());
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
