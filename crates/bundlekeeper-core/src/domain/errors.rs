//! Errors - エラー型と分類
//!
//! - Transient: ストアやファイルシステムが一時的に使えない。次のサイクルで再試行する
//! - Configuration: 起動時の検証で弾く設定ミス
//!
//! 条件付き更新の競合負け（既に状態が変わっていた）はエラーではなく `Ok(false)` で表す。

use std::path::PathBuf;

use thiserror::Error;

use super::ids::UploadId;

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Configuration,
}

/// レコードストアのエラー
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("upload not found: {0}")]
    NotFound(UploadId),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }
}

/// bundle ディレクトリ操作のエラー
#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("background task failed: {0}")]
    Join(String),
}

impl FileStoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }
}

/// 起動時の設定検証エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("desired percent free must be within 0..=100, got {0}")]
    PercentFreeOutOfRange(u8),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_errors_are_transient() {
        let store = StoreError::Unavailable("down".into());
        let fs = FileStoreError::io(
            "dbs",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );

        assert_eq!(store.kind(), ErrorKind::Transient);
        assert_eq!(fs.kind(), ErrorKind::Transient);
        assert_eq!(
            ConfigError::PercentFreeOutOfRange(101).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn io_error_message_names_the_path() {
        let err = FileStoreError::io(
            "dbs/a.lsif.db",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("dbs/a.lsif.db"));
    }
}
