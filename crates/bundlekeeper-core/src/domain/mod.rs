//! Domain model (IDs, upload records, on-disk layout, reports, errors).

pub mod disk;
pub mod errors;
pub mod ids;
pub mod layout;
pub mod report;
pub mod state;
pub mod upload;

pub use self::disk::{DiskUsage, FileEntry};
pub use self::errors::{ConfigError, ErrorKind, FileStoreError, StoreError};
pub use self::ids::UploadId;
pub use self::layout::StorageArea;
pub use self::report::{JanitorReport, Phase, PhaseError, PhaseOutcome, ResetReport};
pub use self::state::{LiveState, UploadState};
pub use self::upload::{EvictionCandidate, ProcessingClaim, UploadRecord};
