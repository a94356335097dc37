//! Janitor - bundle ディレクトリの掃除
//!
//! # フロー（1 サイクル）
//! 1. remove_old_upload_files: MaxUploadAge より古い raw upload を削除
//! 2. remove_orphaned_bundle_files: completed レコードを持たない bundle を削除
//! 3. free_space: 空き容量が目標を下回っていれば、EvictionPolicy の順に bundle を evict
//!
//! 各フェーズは独立に失敗する。失敗はカウントしてログに出し、残りのフェーズは続行する。
//! サイクル中は一切スリープしない（スリープはサイクルの間だけ）。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::config::{JanitorConfig, cutoff};
use super::metrics::JanitorMetrics;
use crate::domain::{JanitorReport, Phase, PhaseError, PhaseOutcome, StorageArea, UploadId};
use crate::impls::{OldestUploadFirst, StoreLiveStates};
use crate::ports::{
    BundleFileStore, Clock, EvictionPolicy, LiveStateProvider, SystemClock, UploadStore,
};

pub struct Janitor {
    config: JanitorConfig,
    store: Arc<dyn UploadStore>,
    files: Arc<dyn BundleFileStore>,
    live_states: Arc<dyn LiveStateProvider>,
    eviction: Arc<dyn EvictionPolicy>,
    clock: Arc<dyn Clock>,
    metrics: Arc<JanitorMetrics>,
}

impl Janitor {
    /// デフォルトの戦略（StoreLiveStates, OldestUploadFirst）と SystemClock で作る
    pub fn new(
        config: JanitorConfig,
        store: Arc<dyn UploadStore>,
        files: Arc<dyn BundleFileStore>,
    ) -> Self {
        Self {
            live_states: Arc::new(StoreLiveStates::new(Arc::clone(&store))),
            eviction: Arc::new(OldestUploadFirst),
            clock: Arc::new(SystemClock),
            metrics: Arc::new(JanitorMetrics::default()),
            config,
            store,
            files,
        }
    }

    pub fn with_live_states(mut self, live_states: Arc<dyn LiveStateProvider>) -> Self {
        self.live_states = live_states;
        self
    }

    pub fn with_eviction_policy(mut self, eviction: Arc<dyn EvictionPolicy>) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> Arc<JanitorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &JanitorConfig {
        &self.config
    }

    /// shutdown が立つまでサイクルを繰り返す
    ///
    /// shutdown はスリープ中にだけ見る。実行中のサイクルは最後まで走る。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval = ?self.config.interval,
            max_upload_age = ?self.config.max_upload_age,
            desired_percent_free = self.config.desired_percent_free,
            eviction_policy = self.eviction.name(),
            "Janitor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_once().await;
            tracing::debug!(
                old_uploads = report.old_uploads.removed(),
                orphaned_bundles = report.orphaned_bundles.removed(),
                evicted_bundles = report.free_space.removed(),
                failed_phases = report.failed_phases().len(),
                "Janitor cycle finished"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    // sender が drop された場合も止める
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Janitor stopped");
    }

    /// 3 フェーズを順番に 1 回ずつ実行する。どのフェーズが失敗しても残りは実行する
    pub async fn run_once(&self) -> JanitorReport {
        let now = self.clock.now();

        let old_uploads = self.settle(
            Phase::RemoveOldUploadFiles,
            self.remove_old_upload_files(now)
                .await
                .map(|removed| PhaseOutcome::Completed { removed }),
        );
        let orphaned_bundles = self.settle(
            Phase::RemoveOrphanedBundleFiles,
            self.remove_orphaned_bundle_files(now)
                .await
                .map(|removed| PhaseOutcome::Completed { removed }),
        );
        let free_space = self.settle(Phase::FreeSpace, self.free_space(now).await);

        JanitorReport {
            old_uploads,
            orphaned_bundles,
            free_space,
        }
    }

    fn settle(&self, phase: Phase, result: Result<PhaseOutcome, PhaseError>) -> PhaseOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                self.metrics.record_error();
                tracing::error!(
                    phase = phase.as_str(),
                    error.kind = ?error.kind(),
                    error = %error,
                    "Janitor phase failed"
                );
                PhaseOutcome::Failed(error)
            }
        }
    }

    #[tracing::instrument(skip_all, fields(janitor.phase = "remove_old_upload_files"))]
    async fn remove_old_upload_files(&self, now: DateTime<Utc>) -> Result<u64, PhaseError> {
        let cutoff = cutoff(now, self.config.max_upload_age);
        let mut removed = 0;

        for entry in self.files.list(StorageArea::Uploads).await? {
            if entry.modified_at >= cutoff {
                continue;
            }
            if self.files.remove(&entry.path).await? {
                removed += 1;
                self.metrics.record_old_upload();
                tracing::info!(
                    path = %entry.path,
                    modified_at = %entry.modified_at,
                    "Removed old upload file"
                );
            }
        }

        Ok(removed)
    }

    #[tracing::instrument(skip_all, fields(janitor.phase = "remove_orphaned_bundle_files"))]
    async fn remove_orphaned_bundle_files(&self, now: DateTime<Utc>) -> Result<u64, PhaseError> {
        let grace_cutoff = cutoff(now, self.config.orphan_grace);

        // 書き込み中・完了直後の bundle を誤判定しないよう、grace 内のファイルは見ない
        let candidates: Vec<(UploadId, String)> = self
            .files
            .list(StorageArea::Bundles)
            .await?
            .into_iter()
            .filter(|entry| entry.modified_at < grace_cutoff)
            .filter_map(|entry| match StorageArea::Bundles.parse_file_name(&entry.name) {
                Some(id) => Some((id, entry.path)),
                None => {
                    tracing::debug!(path = %entry.path, "Ignoring unrecognized file in bundle directory");
                    None
                }
            })
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let ids: Vec<UploadId> = candidates.iter().map(|(id, _)| *id).collect();
        let states = self.live_states.live_states(&ids).await?;

        let mut removed = 0;
        for (id, path) in candidates {
            let live = states.get(&id);
            if live.is_some_and(|state| state.owns_bundle()) {
                continue;
            }
            if self.files.remove(&path).await? {
                removed += 1;
                self.metrics.record_orphaned_bundle();
                tracing::info!(
                    upload_id = %id,
                    path = %path,
                    record_state = live.map(|s| s.state.as_str()).unwrap_or("missing"),
                    "Removed orphaned bundle file"
                );
            }
        }

        Ok(removed)
    }

    #[tracing::instrument(skip_all, fields(janitor.phase = "free_space"))]
    async fn free_space(&self, now: DateTime<Utc>) -> Result<PhaseOutcome, PhaseError> {
        let desired = self.config.desired_percent_free;
        let mut usage = self.files.disk_usage().await?;
        if usage.meets(desired) {
            return Ok(PhaseOutcome::Completed { removed: 0 });
        }

        let sizes: HashMap<String, u64> = self
            .files
            .list(StorageArea::Bundles)
            .await?
            .into_iter()
            .map(|entry| (entry.path, entry.size_bytes))
            .collect();
        let mut candidates = self.store.evictable_uploads().await?;
        for candidate in &mut candidates {
            candidate.size_bytes = sizes.get(&candidate.bundle_path).copied();
        }

        let mut removed = 0;
        for candidate in self.eviction.order(candidates) {
            // 先にレコードを evict 済みにして、クエリが消えるファイルを参照しないようにする。
            // ファイル削除に失敗しても、次のサイクルの orphan 判定で拾われる。
            if !self.store.mark_evicted(candidate.id, now).await? {
                tracing::debug!(upload_id = %candidate.id, "Eviction candidate changed concurrently, skipping");
                continue;
            }
            removed += 1;
            self.metrics.record_evicted_bundle();

            let deleted = self.files.remove(&candidate.bundle_path).await?;
            tracing::info!(
                upload_id = %candidate.id,
                path = %candidate.bundle_path,
                uploaded_at = %candidate.uploaded_at,
                file_deleted = deleted,
                "Evicted bundle"
            );

            usage = self.files.disk_usage().await?;
            if usage.meets(desired) {
                return Ok(PhaseOutcome::Completed { removed });
            }
        }

        tracing::warn!(
            percent_free = usage.percent_free(),
            desired_percent_free = desired,
            evicted = removed,
            "No evictable bundles left, free space target not met"
        );
        Ok(PhaseOutcome::Shortfall { removed, usage })
    }
}
