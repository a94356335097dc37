//! InMemoryBundleDir - テスト用の bundle ディレクトリ
//!
//! 容量が固定のボリュームを模倣する。空き容量は
//! `capacity - baseline_used - (管理しているファイルの合計サイズ)` で計算する。

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DiskUsage, FileEntry, FileStoreError, StorageArea};
use crate::ports::BundleFileStore;

#[derive(Debug, Clone)]
struct StoredFile {
    modified_at: DateTime<Utc>,
    size_bytes: u64,
}

pub struct InMemoryBundleDir {
    /// 相対パス → ファイル
    files: Mutex<BTreeMap<String, StoredFile>>,
    capacity_bytes: u64,
    /// bundle 以外がボリュームを使っている分
    baseline_used_bytes: u64,
    fail_removals: AtomicBool,
    fail_listing: Mutex<HashSet<StorageArea>>,
}

impl InMemoryBundleDir {
    pub fn new(capacity_bytes: u64, baseline_used_bytes: u64) -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            capacity_bytes,
            baseline_used_bytes,
            fail_removals: AtomicBool::new(false),
            fail_listing: Mutex::new(HashSet::new()),
        }
    }

    /// 容量が事実上無限のディレクトリ（空き容量で evict が走らない）
    pub fn unbounded() -> Self {
        Self::new(u64::MAX / 2, 0)
    }

    /// worker / ingestion がファイルを書いたことにする
    pub fn put(&self, path: impl Into<String>, size_bytes: u64, modified_at: DateTime<Utc>) {
        self.lock().insert(
            path.into(),
            StoredFile {
                modified_at,
                size_bytes,
            },
        );
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// 障害注入: remove が I/O エラーを返すようにする
    pub fn set_fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    /// 障害注入: 指定エリアの list が I/O エラーを返すようにする
    pub fn set_fail_listing(&self, area: StorageArea, fail: bool) {
        let mut failing = self.fail_listing.lock().unwrap_or_else(|e| e.into_inner());
        if fail {
            failing.insert(area);
        } else {
            failing.remove(&area);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredFile>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BundleFileStore for InMemoryBundleDir {
    async fn list(&self, area: StorageArea) -> Result<Vec<FileEntry>, FileStoreError> {
        let listing_fails = self
            .fail_listing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&area);
        if listing_fails {
            return Err(FileStoreError::io(
                area.dir_name(),
                std::io::Error::other("listing disabled"),
            ));
        }

        let prefix = format!("{}/", area.dir_name());
        Ok(self
            .lock()
            .iter()
            .filter_map(|(path, file)| {
                let name = path.strip_prefix(&prefix)?;
                // サブディレクトリ配下は対象外
                (!name.contains('/')).then(|| FileEntry {
                    name: name.to_string(),
                    path: path.clone(),
                    modified_at: file.modified_at,
                    size_bytes: file.size_bytes,
                })
            })
            .collect())
    }

    async fn remove(&self, path: &str) -> Result<bool, FileStoreError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(FileStoreError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "removal disabled"),
            ));
        }
        Ok(self.lock().remove(path).is_some())
    }

    async fn disk_usage(&self) -> Result<DiskUsage, FileStoreError> {
        let used: u64 = self.lock().values().map(|f| f.size_bytes).sum();
        let free_bytes = self
            .capacity_bytes
            .saturating_sub(self.baseline_used_bytes)
            .saturating_sub(used);
        Ok(DiskUsage {
            total_bytes: self.capacity_bytes,
            free_bytes,
        })
    }
}
