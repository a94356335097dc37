//! 環境変数からの設定読み込み
//!
//! 変数が無ければ core 側の Default を使う。値の検証は AppBuilder::build() が行う。

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bundlekeeper_core::app::{JanitorConfig, ResetterConfig};

pub const BUNDLE_DIR: &str = "PRECISE_CODE_INTEL_BUNDLE_DIR";
pub const JANITOR_INTERVAL: &str = "PRECISE_CODE_INTEL_JANITOR_INTERVAL";
pub const MAX_UPLOAD_AGE: &str = "PRECISE_CODE_INTEL_MAX_UPLOAD_AGE";
pub const DESIRED_PERCENT_FREE: &str = "PRECISE_CODE_INTEL_DESIRED_PERCENT_FREE";
pub const ORPHAN_GRACE: &str = "PRECISE_CODE_INTEL_ORPHAN_GRACE";
pub const RESET_INTERVAL: &str = "PRECISE_CODE_INTEL_RESET_INTERVAL";
pub const RESET_STALENESS: &str = "PRECISE_CODE_INTEL_RESET_STALENESS";
pub const METRICS_ADDR: &str = "PRECISE_CODE_INTEL_METRICS_ADDR";

const DEFAULT_BUNDLE_DIR: &str = "/lsif-storage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bundle_dir: PathBuf,
    pub janitor: JanitorConfig,
    pub resetter: ResetterConfig,
    /// 設定されていれば Prometheus の scrape エンドポイントを開く
    pub metrics_addr: Option<SocketAddr>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` はキーに対応する生の値を返す（テストでは HashMap を渡す）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let duration = |key: &str| -> Result<Option<Duration>> {
            lookup(key)
                .map(|raw| {
                    humantime::parse_duration(raw.trim())
                        .with_context(|| format!("{key} must be a duration like `1m` or `24h`, got {raw:?}"))
                })
                .transpose()
        };

        let janitor_defaults = JanitorConfig::default();
        let interval = duration(JANITOR_INTERVAL)?.unwrap_or(janitor_defaults.interval);
        let janitor = JanitorConfig {
            interval,
            max_upload_age: duration(MAX_UPLOAD_AGE)?.unwrap_or(janitor_defaults.max_upload_age),
            desired_percent_free: match lookup(DESIRED_PERCENT_FREE) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{DESIRED_PERCENT_FREE} must be an integer, got {raw:?}"))?,
                None => janitor_defaults.desired_percent_free,
            },
            // 未指定なら interval に追従する
            orphan_grace: duration(ORPHAN_GRACE)?.unwrap_or(interval),
        };

        let resetter_defaults = ResetterConfig::default();
        let resetter = ResetterConfig {
            interval: duration(RESET_INTERVAL)?.unwrap_or(resetter_defaults.interval),
            stale_after: duration(RESET_STALENESS)?.unwrap_or(resetter_defaults.stale_after),
        };

        let metrics_addr = lookup(METRICS_ADDR)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .with_context(|| format!("{METRICS_ADDR} must be a socket address like `0.0.0.0:9090`, got {raw:?}"))
            })
            .transpose()?;

        Ok(Self {
            bundle_dir: lookup(BUNDLE_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BUNDLE_DIR)),
            janitor,
            resetter,
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.bundle_dir, PathBuf::from(DEFAULT_BUNDLE_DIR));
        assert_eq!(settings.janitor, JanitorConfig::default());
        assert_eq!(settings.resetter, ResetterConfig::default());
        assert_eq!(settings.metrics_addr, None);
    }

    #[test]
    fn parses_human_readable_durations() {
        let settings = settings(&[
            (BUNDLE_DIR, "/data/lsif"),
            (JANITOR_INTERVAL, "30s"),
            (MAX_UPLOAD_AGE, "2days"),
            (DESIRED_PERCENT_FREE, "15"),
            (RESET_INTERVAL, "5m"),
            (RESET_STALENESS, "90m"),
            (METRICS_ADDR, "127.0.0.1:9090"),
        ])
        .unwrap();

        assert_eq!(settings.bundle_dir, PathBuf::from("/data/lsif"));
        assert_eq!(settings.janitor.interval, Duration::from_secs(30));
        assert_eq!(settings.janitor.max_upload_age, Duration::from_secs(2 * 24 * 3600));
        assert_eq!(settings.janitor.desired_percent_free, 15);
        assert_eq!(settings.resetter.interval, Duration::from_secs(300));
        assert_eq!(settings.resetter.stale_after, Duration::from_secs(90 * 60));
        assert_eq!(settings.metrics_addr, Some("127.0.0.1:9090".parse().unwrap()));
    }

    #[test]
    fn orphan_grace_follows_interval_unless_set() {
        let follows = settings(&[(JANITOR_INTERVAL, "2m")]).unwrap();
        assert_eq!(follows.janitor.orphan_grace, Duration::from_secs(120));

        let explicit = settings(&[(JANITOR_INTERVAL, "2m"), (ORPHAN_GRACE, "10m")]).unwrap();
        assert_eq!(explicit.janitor.orphan_grace, Duration::from_secs(600));
    }

    #[test]
    fn rejects_malformed_values() {
        let err = settings(&[(JANITOR_INTERVAL, "soon")]).unwrap_err();
        assert!(err.to_string().contains(JANITOR_INTERVAL));

        let err = settings(&[(DESIRED_PERCENT_FREE, "ten")]).unwrap_err();
        assert!(err.to_string().contains(DESIRED_PERCENT_FREE));

        let err = settings(&[(METRICS_ADDR, "9090")]).unwrap_err();
        assert!(err.to_string().contains(METRICS_ADDR));
    }
}
