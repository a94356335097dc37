//! Janitor に注入する戦略（strategy）
//!
//! - LiveStateProvider: orphan 判定用の「生きている」レコード状態を返す
//! - EvictionPolicy: 空き容量が足りないときに evict する順番を決める
//!
//! デフォルト実装は impls::strategy にあり、テストでは差し替えられる。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{EvictionCandidate, LiveState, StoreError, UploadId};

#[async_trait]
pub trait LiveStateProvider: Send + Sync {
    /// bundle ファイルから読み取った ID について、レコード側の状態を返す
    async fn live_states(
        &self,
        ids: &[UploadId],
    ) -> Result<HashMap<UploadId, LiveState>, StoreError>;
}

/// EvictionPolicy は evict 候補を並べ替えるだけの純粋な関数
///
/// 先頭から順に evict される。副作用（削除・レコード更新）は Janitor が持つ。
pub trait EvictionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn order(&self, candidates: Vec<EvictionCandidate>) -> Vec<EvictionCandidate>;
}
