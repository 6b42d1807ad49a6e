#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::GroupEntity;
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for group streak state.
///
/// `save_group` carries upsert semantics keyed by `chat_id`: the first save
/// for a chat creates the record, later saves replace it.
pub trait GroupStore: Send + Sync {
    fn load_group(&self, chat_id: i64) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>>;
    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_group_ids(&self) -> BoxFuture<'static, StorageResult<Vec<i64>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
