//! UploadStore port - upload レコードの正本（source of truth）
//!
//! Janitor と Resetter が読み書きするのはここで定義した操作だけです。
//! ingestion や worker による書き込みは同じストアに並行して入ってきます。
//!
//! # 設計原則
//! - 状態を変える操作はすべて条件付き（compare-and-swap）
//! - 競合に負けたら `Ok(false)`。エラーにはしない
//! - グローバルロックは取らない

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EvictionCandidate, LiveState, ProcessingClaim, StoreError, UploadId};

#[async_trait]
pub trait UploadStore: Send + Sync {
    /// 指定 ID のレコード状態のスナップショット。存在しない ID は結果に含まれない
    async fn live_states(
        &self,
        ids: &[UploadId],
    ) -> Result<HashMap<UploadId, LiveState>, StoreError>;

    /// `processing_started_at < cutoff` の processing レコード
    async fn stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ProcessingClaim>, StoreError>;

    /// processing → queued。観測した `started_at` のまま processing の場合に限り適用
    async fn requeue_if_unchanged(&self, claim: &ProcessingClaim) -> Result<bool, StoreError>;

    /// completed かつ未 evict のレコード（順序は問わない）
    async fn evictable_uploads(&self) -> Result<Vec<EvictionCandidate>, StoreError>;

    /// completed かつ未 evict の場合に限り evict 済みにする
    async fn mark_evicted(&self, id: UploadId, at: DateTime<Utc>) -> Result<bool, StoreError>;
}
