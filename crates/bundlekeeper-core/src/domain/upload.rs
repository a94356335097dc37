//! Upload record: metadata for one ingested artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UploadId;
use super::state::{LiveState, UploadState};

/// Upload record tracked by the record store.
///
/// Design:
/// - State transitions happen only through the methods below.
/// - `processing_started_at` is `Some` iff `state == Processing`.
/// - `bundle_path` is `Some` iff `state == Completed` and the bundle has not been evicted.
/// - Every transition is conditional and returns whether it applied, so a store can
///   use it directly as a compare-and-swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: UploadId,
    pub state: UploadState,
    pub uploaded_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub bundle_path: Option<String>,
    pub evicted_at: Option<DateTime<Utc>>,
}

impl UploadRecord {
    pub fn new(id: UploadId, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            id,
            state: UploadState::Queued,
            uploaded_at,
            processing_started_at: None,
            bundle_path: None,
            evicted_at: None,
        }
    }

    pub fn live_state(&self) -> LiveState {
        LiveState {
            state: self.state,
            evicted: self.evicted_at.is_some(),
        }
    }

    pub fn is_evictable(&self) -> bool {
        self.live_state().owns_bundle()
    }

    /// queued → processing (worker claim).
    pub fn claim(&mut self, at: DateTime<Utc>) -> bool {
        if self.state != UploadState::Queued {
            return false;
        }
        self.state = UploadState::Processing;
        self.processing_started_at = Some(at);
        true
    }

    /// processing → completed, recording where the bundle was written.
    pub fn complete(&mut self, bundle_path: String) -> bool {
        if self.state != UploadState::Processing {
            return false;
        }
        self.state = UploadState::Completed;
        self.processing_started_at = None;
        self.bundle_path = Some(bundle_path);
        true
    }

    /// processing → errored.
    pub fn fail(&mut self) -> bool {
        if self.state != UploadState::Processing {
            return false;
        }
        self.state = UploadState::Errored;
        self.processing_started_at = None;
        true
    }

    /// processing → queued, only if the claim we observed is still the current one.
    pub fn requeue_if_started_at(&mut self, observed: DateTime<Utc>) -> bool {
        if self.state != UploadState::Processing || self.processing_started_at != Some(observed) {
            return false;
        }
        self.state = UploadState::Queued;
        self.processing_started_at = None;
        true
    }

    /// Drop the bundle reference of a completed record. State stays `Completed`.
    pub fn mark_evicted(&mut self, at: DateTime<Utc>) -> bool {
        if !self.is_evictable() {
            return false;
        }
        self.bundle_path = None;
        self.evicted_at = Some(at);
        true
    }
}

/// A `processing` record as observed by the Resetter.
///
/// `started_at` doubles as the version for the conditional requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingClaim {
    pub id: UploadId,
    pub started_at: DateTime<Utc>,
}

/// A completed, not yet evicted record considered by the eviction policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub id: UploadId,
    pub uploaded_at: DateTime<Utc>,
    pub bundle_path: String,
    /// Size of the bundle file on disk, when the Janitor could see it.
    pub size_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ulid::Ulid;

    fn record() -> UploadRecord {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        UploadRecord::new(UploadId::from_ulid(Ulid::new()), t0)
    }

    #[test]
    fn new_record_is_queued_without_claim() {
        let r = record();
        assert_eq!(r.state, UploadState::Queued);
        assert!(r.processing_started_at.is_none());
        assert!(r.bundle_path.is_none());
    }

    #[test]
    fn claim_then_complete_keeps_invariants() {
        let mut r = record();
        let at = r.uploaded_at + Duration::minutes(1);

        assert!(r.claim(at));
        assert_eq!(r.processing_started_at, Some(at));
        assert!(!r.claim(at), "double claim must not apply");

        assert!(r.complete("dbs/x.lsif.db".to_string()));
        assert_eq!(r.state, UploadState::Completed);
        assert!(r.processing_started_at.is_none());
        assert!(r.is_evictable());
    }

    #[test]
    fn requeue_requires_matching_claim() {
        let mut r = record();
        let at = r.uploaded_at + Duration::minutes(1);
        r.claim(at);

        assert!(!r.requeue_if_started_at(at + Duration::seconds(1)));
        assert_eq!(r.state, UploadState::Processing);

        assert!(r.requeue_if_started_at(at));
        assert_eq!(r.state, UploadState::Queued);
        assert!(r.processing_started_at.is_none());
    }

    #[test]
    fn requeue_does_not_revert_completed() {
        let mut r = record();
        let at = r.uploaded_at + Duration::minutes(1);
        r.claim(at);
        r.complete("dbs/x.lsif.db".to_string());

        assert!(!r.requeue_if_started_at(at));
        assert_eq!(r.state, UploadState::Completed);
    }

    #[test]
    fn eviction_applies_once_and_keeps_state() {
        let mut r = record();
        let at = r.uploaded_at + Duration::minutes(1);
        r.claim(at);
        r.complete("dbs/x.lsif.db".to_string());

        assert!(r.mark_evicted(at));
        assert_eq!(r.state, UploadState::Completed);
        assert!(r.bundle_path.is_none());
        assert!(!r.live_state().owns_bundle());
        assert!(!r.mark_evicted(at));
    }

    #[test]
    fn errored_record_cannot_be_evicted() {
        let mut r = record();
        r.claim(r.uploaded_at);
        r.fail();

        assert_eq!(r.state, UploadState::Errored);
        assert!(!r.mark_evicted(r.uploaded_at));
    }
}
