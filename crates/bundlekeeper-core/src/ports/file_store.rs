//! BundleFileStore port - bundle ディレクトリ（ローカル or ネットワーク）
//!
//! # 実装
//! - LocalBundleDir: tokio::fs + fs2
//! - InMemoryBundleDir: テスト用

use async_trait::async_trait;

use crate::domain::{DiskUsage, FileEntry, FileStoreError, StorageArea};

#[async_trait]
pub trait BundleFileStore: Send + Sync {
    /// area 内の通常ファイル一覧。ディレクトリ自体が無ければ空
    async fn list(&self, area: StorageArea) -> Result<Vec<FileEntry>, FileStoreError>;

    /// 相対パスのファイルを削除
    ///
    /// 既に無い場合は `Ok(false)`（冪等）。削除した場合のみ `Ok(true)`。
    async fn remove(&self, path: &str) -> Result<bool, FileStoreError>;

    /// bundle ディレクトリが載っているボリュームの使用量
    async fn disk_usage(&self) -> Result<DiskUsage, FileStoreError>;
}
