//! LocalBundleDir - ローカルファイルシステム上の bundle ディレクトリ
//!
//! - 一覧と削除は tokio::fs
//! - ボリュームの容量/空きは fs2（ブロッキングなので spawn_blocking）

use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;

use crate::domain::{DiskUsage, FileEntry, FileStoreError, StorageArea};
use crate::ports::BundleFileStore;

#[derive(Debug, Clone)]
pub struct LocalBundleDir {
    root: PathBuf,
}

impl LocalBundleDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// root と `uploads/`, `dbs/` を作っておく
    pub async fn ensure_layout(&self) -> Result<(), FileStoreError> {
        for area in [StorageArea::Uploads, StorageArea::Bundles] {
            let dir = self.root.join(area.dir_name());
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| FileStoreError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 相対パスを root 配下の絶対パスへ。root の外に出るパスは拒否する
    fn resolve(&self, relative: &str) -> Result<PathBuf, FileStoreError> {
        let path = Path::new(relative);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || escapes {
            return Err(FileStoreError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BundleFileStore for LocalBundleDir {
    async fn list(&self, area: StorageArea) -> Result<Vec<FileEntry>, FileStoreError> {
        let dir = self.root.join(area.dir_name());
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FileStoreError::io(&dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| FileStoreError::io(&dir, e))?
        {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // 一覧と stat の間に消えた
                Err(e) if e.kind() == IoErrorKind::NotFound => continue,
                Err(e) => return Err(FileStoreError::io(entry.path(), e)),
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            let modified = metadata
                .modified()
                .map_err(|e| FileStoreError::io(entry.path(), e))?;

            entries.push(FileEntry {
                path: format!("{}/{}", area.dir_name(), name),
                name,
                modified_at: DateTime::<Utc>::from(modified),
                size_bytes: metadata.len(),
            });
        }
        Ok(entries)
    }

    async fn remove(&self, path: &str) -> Result<bool, FileStoreError> {
        let absolute = self.resolve(path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(FileStoreError::io(absolute, e)),
        }
    }

    async fn disk_usage(&self) -> Result<DiskUsage, FileStoreError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let total_bytes = fs2::total_space(&root).map_err(|e| FileStoreError::io(&root, e))?;
            let free_bytes =
                fs2::available_space(&root).map_err(|e| FileStoreError::io(&root, e))?;
            Ok::<_, FileStoreError>(DiskUsage {
                total_bytes,
                free_bytes,
            })
        })
        .await
        .map_err(|e| FileStoreError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn dir() -> (tempfile::TempDir, LocalBundleDir) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LocalBundleDir::new(tmp.path());
        dir.ensure_layout().await.unwrap();
        (tmp, dir)
    }

    #[tokio::test]
    async fn lists_regular_files_only() {
        let (tmp, dir) = dir().await;
        std::fs::write(tmp.path().join("dbs/a.lsif.db"), b"abc").unwrap();
        std::fs::create_dir(tmp.path().join("dbs/nested")).unwrap();

        let entries = dir.list(StorageArea::Bundles).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.lsif.db");
        assert_eq!(entries[0].path, "dbs/a.lsif.db");
        assert_eq!(entries[0].size_bytes, 3);
    }

    #[tokio::test]
    async fn missing_area_lists_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LocalBundleDir::new(tmp.path().join("not-created"));

        assert!(dir.list(StorageArea::Uploads).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (tmp, dir) = dir().await;
        std::fs::write(tmp.path().join("uploads/a.lsif.gz"), b"x").unwrap();

        assert!(dir.remove("uploads/a.lsif.gz").await.unwrap());
        assert!(!dir.remove("uploads/a.lsif.gz").await.unwrap());
        assert!(!tmp.path().join("uploads/a.lsif.gz").exists());
    }

    #[tokio::test]
    async fn remove_rejects_paths_outside_root() {
        let (_tmp, dir) = dir().await;

        for bad in ["../etc/passwd", "/etc/passwd", "dbs/../../x", ""] {
            assert!(
                matches!(dir.remove(bad).await, Err(FileStoreError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn disk_usage_reports_a_real_volume() {
        let (_tmp, dir) = dir().await;
        let usage = dir.disk_usage().await.unwrap();

        assert!(usage.total_bytes > 0);
        assert!(usage.free_bytes <= usage.total_bytes);
    }
}
