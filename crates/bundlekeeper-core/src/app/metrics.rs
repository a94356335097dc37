//! Metrics - ループが公開するカウンタ
//!
//! カウンタは単調増加のみ。`record_*` は 2 か所に書く:
//! - `metrics` クレートのグローバル recorder（Prometheus などのエクスポート用）
//! - プロセス内の AtomicU64（`snapshot()` でテストや終了時のダンプから読む）
//!
//! recorder が未インストールなら `metrics::counter!` は何もしない。

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{Unit, counter, describe_counter};
use serde::{Deserialize, Serialize};

pub const JANITOR_OLD_UPLOADS: &str = "bundlekeeper_janitor_old_uploads_total";
pub const JANITOR_ORPHANED_BUNDLES: &str = "bundlekeeper_janitor_orphaned_bundles_total";
pub const JANITOR_EVICTED_BUNDLES: &str = "bundlekeeper_janitor_evicted_bundles_total";
pub const JANITOR_ERRORS: &str = "bundlekeeper_janitor_errors_total";
pub const RESETTER_RESETS: &str = "bundlekeeper_upload_resets_total";
pub const RESETTER_ERRORS: &str = "bundlekeeper_upload_reset_errors_total";

/// エクスポータに説明文を登録する。recorder のインストール直後に 1 回呼ぶ
pub fn describe() {
    describe_counter!(JANITOR_OLD_UPLOADS, Unit::Count, "Raw upload files removed for age");
    describe_counter!(
        JANITOR_ORPHANED_BUNDLES,
        Unit::Count,
        "Bundle files removed because no completed record owns them"
    );
    describe_counter!(
        JANITOR_EVICTED_BUNDLES,
        Unit::Count,
        "Bundles evicted to reach the free space target"
    );
    describe_counter!(JANITOR_ERRORS, Unit::Count, "Janitor phases that failed");
    describe_counter!(RESETTER_RESETS, Unit::Count, "Stalled uploads reset to queued");
    describe_counter!(RESETTER_ERRORS, Unit::Count, "Upload reset cycles that failed");
}

#[derive(Debug, Default)]
pub struct JanitorMetrics {
    old_uploads: AtomicU64,
    orphaned_bundles: AtomicU64,
    evicted_bundles: AtomicU64,
    errors: AtomicU64,
}

/// JanitorMetrics のある時点の値
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JanitorCounts {
    pub old_uploads: u64,
    pub orphaned_bundles: u64,
    pub evicted_bundles: u64,
    pub errors: u64,
}

impl JanitorMetrics {
    pub fn record_old_upload(&self) {
        self.old_uploads.fetch_add(1, Ordering::Relaxed);
        counter!(JANITOR_OLD_UPLOADS).increment(1);
    }

    pub fn record_orphaned_bundle(&self) {
        self.orphaned_bundles.fetch_add(1, Ordering::Relaxed);
        counter!(JANITOR_ORPHANED_BUNDLES).increment(1);
    }

    pub fn record_evicted_bundle(&self) {
        self.evicted_bundles.fetch_add(1, Ordering::Relaxed);
        counter!(JANITOR_EVICTED_BUNDLES).increment(1);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!(JANITOR_ERRORS).increment(1);
    }

    pub fn snapshot(&self) -> JanitorCounts {
        JanitorCounts {
            old_uploads: self.old_uploads.load(Ordering::Relaxed),
            orphaned_bundles: self.orphaned_bundles.load(Ordering::Relaxed),
            evicted_bundles: self.evicted_bundles.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResetterMetrics {
    resets: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetterCounts {
    pub resets: u64,
    pub errors: u64,
}

impl ResetterMetrics {
    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
        counter!(RESETTER_RESETS).increment(1);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!(RESETTER_ERRORS).increment(1);
    }

    pub fn snapshot(&self) -> ResetterCounts {
        ResetterCounts {
            resets: self.resets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
