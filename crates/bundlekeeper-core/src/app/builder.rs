//! AppBuilder - Janitor と Resetter のワイヤリング
//!
//! # 設計原則
//! - 起動時検証（Fail-fast）: 依存の不足や不正な設定は build() で弾く
//! - 戦略・時計は省略可能。省略時はデフォルト実装
//! - App::spawn() で両ループを起動し、LoopGroup で止める

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::config::{JanitorConfig, ResetterConfig};
use super::janitor_loop::Janitor;
use super::resetter_loop::UploadResetter;
use crate::domain::ConfigError;
use crate::ports::{BundleFileStore, Clock, EvictionPolicy, LiveStateProvider, UploadStore};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .upload_store(store)
///     .bundle_files(Arc::new(LocalBundleDir::new("/data/bundles")))
///     .janitor_config(JanitorConfig::default())
///     .build()?;
/// let loops = app.spawn();
/// // ...
/// loops.shutdown_and_join().await;
/// ```
#[derive(Default)]
pub struct AppBuilder {
    store: Option<Arc<dyn UploadStore>>,
    files: Option<Arc<dyn BundleFileStore>>,
    janitor_config: JanitorConfig,
    resetter_config: ResetterConfig,
    clock: Option<Arc<dyn Clock>>,
    eviction: Option<Arc<dyn EvictionPolicy>>,
    live_states: Option<Arc<dyn LiveStateProvider>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing upload store. Call upload_store() before build().")]
    MissingStore,
    #[error("Missing bundle file store. Call bundle_files() before build().")]
    MissingFileStore,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_store(mut self, store: Arc<dyn UploadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn bundle_files(mut self, files: Arc<dyn BundleFileStore>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn janitor_config(mut self, config: JanitorConfig) -> Self {
        self.janitor_config = config;
        self
    }

    pub fn resetter_config(mut self, config: ResetterConfig) -> Self {
        self.resetter_config = config;
        self
    }

    /// 両ループで共有する時計
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn eviction_policy(mut self, eviction: Arc<dyn EvictionPolicy>) -> Self {
        self.eviction = Some(eviction);
        self
    }

    pub fn live_states(mut self, live_states: Arc<dyn LiveStateProvider>) -> Self {
        self.live_states = Some(live_states);
        self
    }

    /// # 検証
    /// - upload_store / bundle_files が設定されているか
    /// - 両方の設定が validate() を通るか
    pub fn build(self) -> Result<App, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let files = self.files.ok_or(BuildError::MissingFileStore)?;
        self.janitor_config.validate()?;
        self.resetter_config.validate()?;

        let mut janitor = Janitor::new(self.janitor_config, Arc::clone(&store), files);
        let mut resetter = UploadResetter::new(self.resetter_config, store);
        if let Some(clock) = self.clock {
            janitor = janitor.with_clock(Arc::clone(&clock));
            resetter = resetter.with_clock(clock);
        }
        if let Some(eviction) = self.eviction {
            janitor = janitor.with_eviction_policy(eviction);
        }
        if let Some(live_states) = self.live_states {
            janitor = janitor.with_live_states(live_states);
        }

        Ok(App {
            janitor: Arc::new(janitor),
            resetter: Arc::new(resetter),
        })
    }
}

/// 組み立て済みの 2 つのループ
pub struct App {
    pub janitor: Arc<Janitor>,
    pub resetter: Arc<UploadResetter>,
}

impl App {
    /// 両ループを tokio タスクとして起動
    pub fn spawn(&self) -> LoopGroup {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let janitor = Arc::clone(&self.janitor);
        let rx = shutdown_rx.clone();
        let janitor_join = tokio::spawn(async move { janitor.run(rx).await });

        let resetter = Arc::clone(&self.resetter);
        let resetter_join = tokio::spawn(async move { resetter.run(shutdown_rx).await });

        LoopGroup {
            shutdown_tx,
            joins: vec![janitor_join, resetter_join],
        }
    }
}

/// 起動中のループのハンドル
/// - `shutdown_tx` を drop してもループは止まる
/// - 実行中のサイクルは中断しない。次のスリープで止まる
pub struct LoopGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl LoopGroup {
    pub fn request_shutdown(&self) {
        // ループが既に終わっていれば receiver はいない
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(error) = join.await {
                tracing::error!(error = %error, "Loop task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UploadState;
    use crate::impls::{InMemoryBundleDir, InMemoryUploadStore, LargestBundleFirst};
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::time::Duration as StdDuration;

    fn deps() -> (Arc<InMemoryUploadStore>, Arc<InMemoryBundleDir>) {
        (
            Arc::new(InMemoryUploadStore::new()),
            Arc::new(InMemoryBundleDir::unbounded()),
        )
    }

    #[test]
    fn build_requires_store() {
        let (_, files) = deps();
        let result = AppBuilder::new().bundle_files(files).build();
        assert!(matches!(result, Err(BuildError::MissingStore)));
    }

    #[test]
    fn build_requires_file_store() {
        let (store, _) = deps();
        let result = AppBuilder::new().upload_store(store).build();
        assert!(matches!(result, Err(BuildError::MissingFileStore)));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let (store, files) = deps();
        let result = AppBuilder::new()
            .upload_store(store)
            .bundle_files(files)
            .janitor_config(JanitorConfig {
                desired_percent_free: 150,
                ..JanitorConfig::default()
            })
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::PercentFreeOutOfRange(150)))
        ));
    }

    #[test]
    fn build_applies_overrides() {
        let (store, files) = deps();
        let app = AppBuilder::new()
            .upload_store(store)
            .bundle_files(files)
            .janitor_config(JanitorConfig {
                desired_percent_free: 25,
                ..JanitorConfig::default()
            })
            .eviction_policy(Arc::new(LargestBundleFirst))
            .build()
            .unwrap();

        assert_eq!(app.janitor.config().desired_percent_free, 25);
        assert_eq!(app.resetter.config(), &ResetterConfig::default());
    }

    #[tokio::test]
    async fn spawned_loops_run_and_shut_down() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let (store, files) = deps();
        files.put("uploads/stale.lsif.gz", 1, t0 - Duration::days(3));
        let stalled = store.create(t0 - Duration::hours(3)).await;
        store.claim(stalled, t0 - Duration::hours(2)).await.unwrap();

        let app = AppBuilder::new()
            .upload_store(store.clone())
            .bundle_files(files.clone())
            .clock(Arc::new(FixedClock::new(t0)))
            .build()
            .unwrap();
        let loops = app.spawn();
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        tokio::time::timeout(StdDuration::from_secs(1), loops.shutdown_and_join())
            .await
            .expect("loops should stop");

        assert!(files.paths().is_empty());
        assert_eq!(store.get(stalled).await.unwrap().state, UploadState::Queued);
        assert_eq!(app.janitor.metrics().snapshot().old_uploads, 1);
        assert_eq!(app.resetter.metrics().snapshot().resets, 1);
    }
}
