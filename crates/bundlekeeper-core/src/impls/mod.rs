//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **LocalBundleDir**: ローカルファイルシステムの bundle ディレクトリ（本番用）
//! - **InMemoryBundleDir**: 容量固定の bundle ディレクトリ（テスト用）
//! - **InMemoryUploadStore**: 開発用・テスト用のレコードストア
//! - **StoreLiveStates / OldestUploadFirst / LargestBundleFirst**: Janitor の戦略
//!
//! # 本番用のレコードストア
//! データベース実装はこのクレートの外に置き、UploadStore を実装して注入します。

pub mod local_dir;
pub mod memory_dir;
pub mod memory_store;
pub mod strategy;

// 主要な型を再エクスポート
pub use self::local_dir::LocalBundleDir;
pub use self::memory_dir::InMemoryBundleDir;
pub use self::memory_store::InMemoryUploadStore;
pub use self::strategy::{LargestBundleFirst, OldestUploadFirst, StoreLiveStates};
