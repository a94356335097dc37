//! UploadResetter - 止まった processing の回収
//!
//! # フロー（1 サイクル）
//! 1. UploadStore::stale_processing(now - stale_after) で古い claim を取得
//! 2. 各 claim を requeue_if_unchanged で queued に戻す
//! 3. 条件付き更新に負けたもの（worker が完了させた等）はスキップ
//!
//! ストアのエラーはそのサイクルを打ち切る。次のサイクルで再試行される。

use std::sync::Arc;

use tokio::sync::watch;

use super::config::{ResetterConfig, cutoff};
use super::metrics::ResetterMetrics;
use crate::domain::{ResetReport, StoreError};
use crate::ports::{Clock, SystemClock, UploadStore};

pub struct UploadResetter {
    config: ResetterConfig,
    store: Arc<dyn UploadStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ResetterMetrics>,
}

impl UploadResetter {
    pub fn new(config: ResetterConfig, store: Arc<dyn UploadStore>) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(ResetterMetrics::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> Arc<ResetterMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &ResetterConfig {
        &self.config
    }

    /// shutdown が立つまでサイクルを繰り返す（Janitor::run と同じ止め方）
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval = ?self.config.interval,
            stale_after = ?self.config.stale_after,
            "Upload resetter started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_once().await {
                Ok(report) if report.reset > 0 || report.skipped > 0 => {
                    tracing::debug!(
                        reset = report.reset,
                        skipped = report.skipped,
                        "Upload resetter cycle finished"
                    );
                }
                Ok(_) => {}
                Err(error) => {
                    self.metrics.record_error();
                    tracing::error!(
                        error.kind = ?error.kind(),
                        error = %error,
                        "Failed to reset stalled uploads"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Upload resetter stopped");
    }

    #[tracing::instrument(skip_all)]
    pub async fn run_once(&self) -> Result<ResetReport, StoreError> {
        let cutoff = cutoff(self.clock.now(), self.config.stale_after);
        let mut report = ResetReport::default();

        for claim in self.store.stale_processing(cutoff).await? {
            if self.store.requeue_if_unchanged(&claim).await? {
                report.reset += 1;
                self.metrics.record_reset();
                tracing::info!(
                    upload_id = %claim.id,
                    processing_started_at = %claim.started_at,
                    "Reset stalled upload to queued"
                );
            } else {
                report.skipped += 1;
                tracing::debug!(upload_id = %claim.id, "Upload changed since it was observed, skipping");
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvictionCandidate, LiveState, ProcessingClaim, UploadId, UploadState};
    use crate::impls::InMemoryUploadStore;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use std::time::Duration as StdDuration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn config() -> ResetterConfig {
        ResetterConfig {
            interval: StdDuration::from_secs(60),
            stale_after: StdDuration::from_secs(60 * 60),
        }
    }

    fn resetter(store: Arc<dyn UploadStore>) -> UploadResetter {
        UploadResetter::new(config(), store).with_clock(Arc::new(FixedClock::new(t0())))
    }

    async fn processing_since(store: &InMemoryUploadStore, started_at: DateTime<Utc>) -> UploadId {
        let id = store.create(started_at - Duration::minutes(5)).await;
        store.claim(id, started_at).await.unwrap();
        id
    }

    #[tokio::test]
    async fn resets_only_uploads_past_the_threshold() {
        let store = Arc::new(InMemoryUploadStore::new());
        let stalled = processing_since(&store, t0() - Duration::hours(2)).await;
        let healthy = processing_since(&store, t0() - Duration::minutes(30)).await;
        let queued = store.create(t0() - Duration::hours(3)).await;

        let resetter = resetter(store.clone());
        let report = resetter.run_once().await.unwrap();

        assert_eq!(report, ResetReport { reset: 1, skipped: 0 });
        let record = store.get(stalled).await.unwrap();
        assert_eq!(record.state, UploadState::Queued);
        assert!(record.processing_started_at.is_none());
        assert_eq!(store.get(healthy).await.unwrap().state, UploadState::Processing);
        assert_eq!(store.get(queued).await.unwrap().state, UploadState::Queued);
        assert_eq!(store.count_in_state(UploadState::Processing).await, 1);
        assert_eq!(store.count_in_state(UploadState::Queued).await, 2);
        assert_eq!(resetter.metrics().snapshot().resets, 1);
    }

    #[tokio::test]
    async fn exactly_at_threshold_is_not_stale() {
        let store = Arc::new(InMemoryUploadStore::new());
        let id = processing_since(&store, t0() - Duration::hours(1)).await;

        let report = resetter(store.clone()).run_once().await.unwrap();

        assert_eq!(report.reset, 0);
        assert_eq!(store.get(id).await.unwrap().state, UploadState::Processing);
    }

    #[tokio::test]
    async fn second_cycle_has_nothing_to_do() {
        let store = Arc::new(InMemoryUploadStore::new());
        processing_since(&store, t0() - Duration::hours(2)).await;

        let resetter = resetter(store.clone());
        resetter.run_once().await.unwrap();
        let second = resetter.run_once().await.unwrap();

        assert_eq!(second, ResetReport::default());
        assert_eq!(resetter.metrics().snapshot().resets, 1);
    }

    /// stale_processing を返した直後に worker が完了させるストア
    struct CompletesAfterScan {
        inner: Arc<InMemoryUploadStore>,
    }

    #[async_trait]
    impl UploadStore for CompletesAfterScan {
        async fn live_states(
            &self,
            ids: &[UploadId],
        ) -> Result<HashMap<UploadId, LiveState>, StoreError> {
            self.inner.live_states(ids).await
        }

        async fn stale_processing(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<ProcessingClaim>, StoreError> {
            let claims = self.inner.stale_processing(cutoff).await?;
            for claim in &claims {
                self.inner.complete(claim.id).await?;
            }
            Ok(claims)
        }

        async fn requeue_if_unchanged(&self, claim: &ProcessingClaim) -> Result<bool, StoreError> {
            self.inner.requeue_if_unchanged(claim).await
        }

        async fn evictable_uploads(&self) -> Result<Vec<EvictionCandidate>, StoreError> {
            self.inner.evictable_uploads().await
        }

        async fn mark_evicted(&self, id: UploadId, at: DateTime<Utc>) -> Result<bool, StoreError> {
            self.inner.mark_evicted(id, at).await
        }
    }

    #[tokio::test]
    async fn concurrent_completion_wins_over_reset() {
        let inner = Arc::new(InMemoryUploadStore::new());
        let id = processing_since(&inner, t0() - Duration::hours(2)).await;
        let store = Arc::new(CompletesAfterScan {
            inner: inner.clone(),
        });

        let resetter = resetter(store);
        let report = resetter.run_once().await.unwrap();

        assert_eq!(report, ResetReport { reset: 0, skipped: 1 });
        assert_eq!(inner.get(id).await.unwrap().state, UploadState::Completed);
        assert_eq!(resetter.metrics().snapshot().resets, 0);
    }

    #[tokio::test]
    async fn store_errors_abort_the_cycle() {
        let store = Arc::new(InMemoryUploadStore::new());
        processing_since(&store, t0() - Duration::hours(2)).await;
        store.set_unavailable(true);

        let result = resetter(store.clone()).run_once().await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn run_counts_errors_and_stops_on_shutdown() {
        let store = Arc::new(InMemoryUploadStore::new());
        store.set_unavailable(true);
        let resetter = Arc::new(UploadResetter::new(
            ResetterConfig {
                interval: StdDuration::from_secs(3600),
                ..config()
            },
            store,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn({
            let resetter = Arc::clone(&resetter);
            async move { resetter.run(shutdown_rx).await }
        });
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("resetter should stop while sleeping")
            .unwrap();
        assert_eq!(resetter.metrics().snapshot().errors, 1);
    }
}
