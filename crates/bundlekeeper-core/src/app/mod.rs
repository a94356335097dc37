//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて 2 つのバックグラウンドループを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 依存と設定のワイヤリング（起動時検証つき）
//! - **Janitor**: 古い upload・orphan bundle の削除と、空き容量確保のための eviction
//! - **UploadResetter**: 止まった processing レコードを queued に戻す
//! - **LoopGroup**: 起動中ループの停止と join

pub mod builder;
pub mod config;
pub mod janitor_loop;
pub mod metrics;
pub mod resetter_loop;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError, LoopGroup};
pub use self::config::{JanitorConfig, ResetterConfig};
pub use self::janitor_loop::Janitor;
pub use self::metrics::{JanitorCounts, JanitorMetrics, ResetterCounts, ResetterMetrics};
pub use self::resetter_loop::UploadResetter;
