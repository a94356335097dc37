//! State - upload レコードの状態

use serde::{Deserialize, Serialize};
use std::fmt;

/// UploadState は upload レコードの状態を表現
///
/// # 状態遷移
/// - queued → processing: worker が claim
/// - processing → completed / errored: worker が完了を報告
/// - processing → queued: Resetter が stale な claim を回収
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Queued,
    Processing,
    Completed,
    Errored,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Queued => "queued",
            UploadState::Processing => "processing",
            UploadState::Completed => "completed",
            UploadState::Errored => "errored",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LiveState は orphan 判定に使う、レコード側から見た bundle の持ち主情報
///
/// evict 済みのレコードは completed のままだが、もう bundle を所有しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveState {
    pub state: UploadState,
    pub evicted: bool,
}

impl LiveState {
    pub fn owns_bundle(&self) -> bool {
        self.state == UploadState::Completed && !self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::queued(UploadState::Queued, false, false)]
    #[case::processing(UploadState::Processing, false, false)]
    #[case::completed(UploadState::Completed, false, true)]
    #[case::completed_evicted(UploadState::Completed, true, false)]
    #[case::errored(UploadState::Errored, false, false)]
    fn only_live_completed_records_own_a_bundle(
        #[case] state: UploadState,
        #[case] evicted: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(LiveState { state, evicted }.owns_bundle(), expected);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&UploadState::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
