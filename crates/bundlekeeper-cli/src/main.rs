//! bundlekeeper - precise code-intel の bundle ディレクトリを管理するデーモン
//!
//! # フロー
//! 1. 環境変数から設定を読む
//! 2. bundle ディレクトリを用意し、既存 bundle をレコードとして取り込む
//! 3. Janitor と UploadResetter を起動
//! 4. Ctrl-C で停止し、最終カウンタを JSON で出力
//!
//! # スタンドアロンモードの制約
//! レコードストアはプロセス内のメモリだけ。bundle の取り込みは起動時の 1 回で、
//! 起動後に外部の worker が `dbs/` に書いた bundle にはレコードが無い。
//! そのため grace window を過ぎると orphan として削除される。worker と併用する場合は
//! 共有のレコードストアを UploadStore として実装して注入すること。

mod bootstrap;
mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use bundlekeeper_core::app::AppBuilder;
use bundlekeeper_core::impls::{InMemoryUploadStore, LocalBundleDir};

use crate::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let settings = Settings::from_env()?;
    tracing::info!(bundle_dir = %settings.bundle_dir.display(), "Starting bundlekeeper");
    if let Some(addr) = settings.metrics_addr {
        telemetry::install_metrics(addr)?;
    }

    let files = Arc::new(LocalBundleDir::new(&settings.bundle_dir));
    files
        .ensure_layout()
        .await
        .with_context(|| format!("preparing {}", settings.bundle_dir.display()))?;

    let store = Arc::new(InMemoryUploadStore::new());
    let adopted = bootstrap::adopt_existing_bundles(files.as_ref(), &store).await?;
    tracing::info!(adopted, "Registered existing bundles");

    let app = AppBuilder::new()
        .upload_store(store)
        .bundle_files(files)
        .janitor_config(settings.janitor)
        .resetter_config(settings.resetter)
        .build()
        .context("invalid configuration")?;
    let loops = app.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutdown requested, waiting for loops to finish");
    loops.shutdown_and_join().await;

    let counts = serde_json::json!({
        "janitor": app.janitor.metrics().snapshot(),
        "resetter": app.resetter.metrics().snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}
