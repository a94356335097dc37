//! Report - サイクルごとの結果
//!
//! Janitor の各フェーズは独立に失敗しうるので、最初のエラーで打ち切らずに
//! フェーズごとの結果（タグ付き）を 1 つのレポートにまとめる。

use thiserror::Error;

use super::disk::DiskUsage;
use super::errors::{ErrorKind, FileStoreError, StoreError};

/// Janitor のフェーズ（実行順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    RemoveOldUploadFiles,
    RemoveOrphanedBundleFiles,
    FreeSpace,
}

impl Phase {
    pub const ALL: [Phase; 3] = [
        Phase::RemoveOldUploadFiles,
        Phase::RemoveOrphanedBundleFiles,
        Phase::FreeSpace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::RemoveOldUploadFiles => "remove_old_upload_files",
            Phase::RemoveOrphanedBundleFiles => "remove_orphaned_bundle_files",
            Phase::FreeSpace => "free_space",
        }
    }
}

/// フェーズ失敗の原因
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Files(#[from] FileStoreError),
}

impl PhaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PhaseError::Store(e) => e.kind(),
            PhaseError::Files(e) => e.kind(),
        }
    }
}

/// 1 フェーズの結果
#[derive(Debug)]
pub enum PhaseOutcome {
    /// 目的を達成した（`removed` は削除/evict した件数）
    Completed { removed: u64 },
    /// freeSpace 専用: evict できる bundle が尽きても目標に届かなかった
    Shortfall { removed: u64, usage: DiskUsage },
    Failed(PhaseError),
}

impl PhaseOutcome {
    pub fn removed(&self) -> u64 {
        match self {
            PhaseOutcome::Completed { removed } | PhaseOutcome::Shortfall { removed, .. } => {
                *removed
            }
            PhaseOutcome::Failed(_) => 0,
        }
    }

    pub fn error(&self) -> Option<&PhaseError> {
        match self {
            PhaseOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Janitor 1 サイクル分のレポート
#[derive(Debug)]
pub struct JanitorReport {
    pub old_uploads: PhaseOutcome,
    pub orphaned_bundles: PhaseOutcome,
    pub free_space: PhaseOutcome,
}

impl JanitorReport {
    pub fn outcome(&self, phase: Phase) -> &PhaseOutcome {
        match phase {
            Phase::RemoveOldUploadFiles => &self.old_uploads,
            Phase::RemoveOrphanedBundleFiles => &self.orphaned_bundles,
            Phase::FreeSpace => &self.free_space,
        }
    }

    pub fn failed_phases(&self) -> Vec<Phase> {
        Phase::ALL
            .into_iter()
            .filter(|phase| self.outcome(*phase).error().is_some())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_phases().is_empty()
    }
}

/// Resetter 1 サイクル分のレポート
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// queued に戻したレコード数
    pub reset: u64,
    /// 条件付き更新に負けた（既に遷移済みだった）レコード数
    pub skipped: u64,
}
