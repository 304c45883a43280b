//! Cycle History Storage
//!
//! Append-only log of irrigation cycles. The store owns id assignment: ids start
//! at 1 and grow by one per append, with no gaps. A record becomes visible to
//! readers only once it is durable.

pub mod json_store;

pub use json_store::JsonHistoryStore;

use crate::models::{CycleDraft, CycleRecord};
use crate::types::AppResult;
use async_trait::async_trait;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Assign the next id, persist the record and return the id.
    /// A persistence failure is returned to the caller and nothing is stored.
    async fn append(&self, draft: CycleDraft) -> AppResult<u64>;

    /// Most recently appended record
    async fn get_last(&self) -> Option<CycleRecord>;

    /// Up to `window` most recent records, oldest first
    async fn get_recent(&self, window: usize) -> Vec<CycleRecord>;

    /// Id the next append will receive
    async fn next_id(&self) -> u64;

    async fn is_empty(&self) -> bool {
        self.get_last().await.is_none()
    }
}
