//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（レコードストア、bundle ディレクトリ、時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - レコードストアが source of truth（正本）
//! - bundle ディレクトリの削除判断は Janitor だけが行う
//! - 状態変更は条件付き更新のみ

pub mod clock;
pub mod file_store;
pub mod id_generator;
pub mod strategy;
pub mod upload_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::file_store::BundleFileStore;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::strategy::{EvictionPolicy, LiveStateProvider};
pub use self::upload_store::UploadStore;
