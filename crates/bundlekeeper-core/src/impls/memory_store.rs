//! InMemoryUploadStore - 開発用・テスト用のレコードストア
//!
//! # 学習ポイント
//! - tokio::sync::Mutex 1 つで全レコードを守る（ロック中に await しない）
//! - 条件付き更新は UploadRecord のメソッドにそのまま委譲する
//! - ingestion / worker 側の遷移（create, claim, complete, fail）も持つので、
//!   ループを外側から動かすテストが書ける

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    EvictionCandidate, LiveState, ProcessingClaim, StorageArea, StoreError, UploadId,
    UploadRecord, UploadState,
};
use crate::ports::{IdGenerator, SystemClock, UlidGenerator, UploadStore};

/// InMemoryUploadStore は HashMap<UploadId, UploadRecord> を正本として持つ
pub struct InMemoryUploadStore {
    records: Mutex<HashMap<UploadId, UploadRecord>>,
    id_gen: Arc<dyn IdGenerator>,
    /// true の間、UploadStore の操作はすべて Unavailable を返す
    unavailable: AtomicBool,
}

impl InMemoryUploadStore {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UlidGenerator::new(SystemClock)))
    }

    pub fn with_id_generator(id_gen: Arc<dyn IdGenerator>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            id_gen,
            unavailable: AtomicBool::new(false),
        }
    }

    /// 障害注入: ストアが落ちている状態を再現する
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".into()));
        }
        Ok(())
    }

    /// ingestion: 新しい upload を queued で作る
    pub async fn create(&self, uploaded_at: DateTime<Utc>) -> UploadId {
        let id = self.id_gen.generate_upload_id();
        self.insert(UploadRecord::new(id, uploaded_at)).await;
        id
    }

    /// 既存レコードをそのまま取り込む（起動時の adopt など）
    pub async fn insert(&self, record: UploadRecord) {
        self.records.lock().await.insert(record.id, record);
    }

    pub async fn get(&self, id: UploadId) -> Option<UploadRecord> {
        self.records.lock().await.get(&id).cloned()
    }

    /// レコードの外部削除（retention ポリシーなど）
    pub async fn delete(&self, id: UploadId) -> Option<UploadRecord> {
        self.records.lock().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn count_in_state(&self, state: UploadState) -> usize {
        self.records
            .lock()
            .await
            .values()
            .filter(|r| r.state == state)
            .count()
    }

    /// worker: queued → processing
    pub async fn claim(&self, id: UploadId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.update(id, |record| record.claim(at)).await
    }

    /// worker: processing → completed。bundle パスは layout に従う
    pub async fn complete(&self, id: UploadId) -> Result<bool, StoreError> {
        let bundle_path = StorageArea::Bundles.relative_path(id);
        self.update(id, |record| record.complete(bundle_path)).await
    }

    /// worker: processing → errored
    pub async fn fail(&self, id: UploadId) -> Result<bool, StoreError> {
        self.update(id, |record| record.fail()).await
    }

    async fn update(
        &self,
        id: UploadId,
        apply: impl FnOnce(&mut UploadRecord) -> bool,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        Ok(apply(record))
    }
}

impl Default for InMemoryUploadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadStore for InMemoryUploadStore {
    async fn live_states(
        &self,
        ids: &[UploadId],
    ) -> Result<HashMap<UploadId, LiveState>, StoreError> {
        self.check_available()?;
        let records = self.records.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).map(|r| (*id, r.live_state())))
            .collect())
    }

    async fn stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ProcessingClaim>, StoreError> {
        self.check_available()?;
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| r.state == UploadState::Processing)
            .filter_map(|r| {
                let started_at = r.processing_started_at?;
                (started_at < cutoff).then_some(ProcessingClaim {
                    id: r.id,
                    started_at,
                })
            })
            .collect())
    }

    async fn requeue_if_unchanged(&self, claim: &ProcessingClaim) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        // レコードが消えていても競合負けと同じ扱い
        Ok(records
            .get_mut(&claim.id)
            .is_some_and(|r| r.requeue_if_started_at(claim.started_at)))
    }

    async fn evictable_uploads(&self) -> Result<Vec<EvictionCandidate>, StoreError> {
        self.check_available()?;
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| r.is_evictable())
            .filter_map(|r| {
                Some(EvictionCandidate {
                    id: r.id,
                    uploaded_at: r.uploaded_at,
                    bundle_path: r.bundle_path.clone()?,
                    size_bytes: None,
                })
            })
            .collect())
    }

    async fn mark_evicted(&self, id: UploadId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        Ok(records.get_mut(&id).is_some_and(|r| r.mark_evicted(at)))
    }
}
