//! Disk - ファイル一覧とディスク使用量のスナップショット

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// FileEntry は一覧で返されるファイル 1 件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// ファイル名（例: `01J...XYZ.lsif.db`）
    pub name: String,
    /// bundle ディレクトリからの相対パス（remove に渡す値）
    pub path: String,
    pub modified_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// DiskUsage はある瞬間のディスク使用量（永続化しない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl DiskUsage {
    /// 空き容量の割合（0.0〜100.0）。容量 0 のディスクは 0% とみなす
    pub fn percent_free(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.free_bytes as f64 * 100.0 / self.total_bytes as f64
    }

    pub fn meets(&self, desired_percent_free: u8) -> bool {
        self.percent_free() >= f64::from(desired_percent_free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty_disk(0, 0, 0.0)]
    #[case::eight_percent(100_000, 8_000, 8.0)]
    #[case::all_free(1_000, 1_000, 100.0)]
    fn percent_free(#[case] total: u64, #[case] free: u64, #[case] expected: f64) {
        let usage = DiskUsage {
            total_bytes: total,
            free_bytes: free,
        };
        assert_eq!(usage.percent_free(), expected);
    }

    #[test]
    fn target_is_inclusive() {
        let usage = DiskUsage {
            total_bytes: 100_000,
            free_bytes: 10_000,
        };
        assert!(usage.meets(10));
        assert!(!usage.meets(11));
    }
}
