//! Config - ループごとの設定スナップショット
//!
//! 設定はコンストラクタに渡す不変の値です。設定を変えるときはループを作り直します。
//! 読み込み方法（環境変数など）はこのクレートの外側の責務です。

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::ConfigError;

/// Janitor の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JanitorConfig {
    /// サイクル間のスリープ
    pub interval: Duration,
    /// これより古い raw upload ファイルは削除
    pub max_upload_age: Duration,
    /// 空き容量の目標（0〜100%）
    pub desired_percent_free: u8,
    /// これより新しい bundle ファイルは orphan 判定しない
    pub orphan_grace: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        let interval = Duration::from_secs(60);
        Self {
            interval,
            max_upload_age: Duration::from_secs(24 * 60 * 60),
            desired_percent_free: 10,
            orphan_grace: interval,
        }
    }
}

impl JanitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroDuration("janitor interval"));
        }
        if self.max_upload_age.is_zero() {
            return Err(ConfigError::ZeroDuration("max upload age"));
        }
        if self.desired_percent_free > 100 {
            return Err(ConfigError::PercentFreeOutOfRange(self.desired_percent_free));
        }
        Ok(())
    }
}

/// Upload Resetter の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetterConfig {
    pub interval: Duration,
    /// processing のままこれを超えたレコードは worker が死んだとみなす
    pub stale_after: Duration,
}

impl Default for ResetterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(60 * 60),
        }
    }
}

impl ResetterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroDuration("reset interval"));
        }
        if self.stale_after.is_zero() {
            return Err(ConfigError::ZeroDuration("reset staleness threshold"));
        }
        Ok(())
    }
}

/// `now - age`。表現できないほど昔なら最小時刻に張り付く
pub(crate) fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
