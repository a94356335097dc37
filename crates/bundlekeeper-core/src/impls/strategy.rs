//! Janitor のデフォルト戦略
//!
//! - StoreLiveStates: UploadStore にそのまま問い合わせる LiveStateProvider
//! - OldestUploadFirst: uploaded_at が古い順（FIFO）。デフォルトの EvictionPolicy
//! - LargestBundleFirst: bundle が大きい順。同サイズなら古い順

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{EvictionCandidate, LiveState, StoreError, UploadId};
use crate::ports::{EvictionPolicy, LiveStateProvider, UploadStore};

pub struct StoreLiveStates {
    store: Arc<dyn UploadStore>,
}

impl StoreLiveStates {
    pub fn new(store: Arc<dyn UploadStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LiveStateProvider for StoreLiveStates {
    async fn live_states(
        &self,
        ids: &[UploadId],
    ) -> Result<HashMap<UploadId, LiveState>, StoreError> {
        self.store.live_states(ids).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OldestUploadFirst;

impl EvictionPolicy for OldestUploadFirst {
    fn name(&self) -> &'static str {
        "oldest_upload_first"
    }

    fn order(&self, mut candidates: Vec<EvictionCandidate>) -> Vec<EvictionCandidate> {
        // 同時刻は ID 順にして並びを決定的にする
        candidates.sort_by_key(|c| (c.uploaded_at, c.id));
        candidates
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LargestBundleFirst;

impl EvictionPolicy for LargestBundleFirst {
    fn name(&self) -> &'static str {
        "largest_bundle_first"
    }

    fn order(&self, mut candidates: Vec<EvictionCandidate>) -> Vec<EvictionCandidate> {
        // サイズ不明（ディスク上に見当たらない）ものは最後
        candidates.sort_by_key(|c| (Reverse(c.size_bytes.unwrap_or(0)), c.uploaded_at, c.id));
        candidates
    }
}
