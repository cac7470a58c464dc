//! Error kinds for the cadence producer cycle engine.
//!
//! Only [`CadenceError::ValidationFailed`] is meant to escape `run_cycle` as an
//! `Err`; every other phase failure is folded into the cycle's
//! [`CycleStatus`](crate::CycleStatus) and reported through listeners, per
//! the propagation rule for phase failures.

use crate::blob::BlobKind;
use crate::version::Version;
use thiserror::Error;

/// Result type alias used throughout the cadence crates.
pub type CadenceResult<T> = std::result::Result<T, CadenceError>;

/// Unified error type for cadence producer operations.
#[derive(Debug, Error)]
pub enum CadenceError {
    /// The user's populator closure returned an error.
    #[error("populator failed: {0}")]
    Populator(String),

    /// A staged delta or reverse-delta failed to round-trip to the expected
    /// checksum during the integrity check.
    #[error("checksum validation failed for staged {kind:?}")]
    ChecksumValidation {
        /// Which blob kind failed to validate.
        kind: BlobKind,
    },

    /// One or more validators rejected the pending read state. This is the
    /// one error kind that `run_cycle` surfaces directly to the caller.
    #[error("{} validator(s) failed, first: {}", failures.len(), failures.first().map(|s| s.as_str()).unwrap_or(""))]
    ValidationFailed {
        /// Every validator failure, in the order validators ran.
        failures: Vec<String>,
    },

    /// Staging or publishing a blob raised an I/O error.
    #[error("publisher I/O error: {0}")]
    PublisherIo(String),

    /// The announcer rejected or failed to publish the new version.
    #[error("announcer failed for version {version}: {reason}")]
    Announcer {
        /// The version that failed to announce.
        version: Version,
        /// Underlying failure reason.
        reason: String,
    },

    /// Restore retrieved a version different from the one requested.
    #[error("restore mismatch: requested {expected}, retrieved {actual}")]
    RestoreMismatch {
        /// The version that was requested.
        expected: Version,
        /// The version the blob retriever actually produced.
        actual: Version,
    },

    /// A listener raised an error. Always swallowed and logged by the
    /// broadcaster; never constructed by any other part of the engine.
    #[error("listener error: {0}")]
    Listener(String),

    /// An asynchronously-published snapshot failed to publish. Logged and
    /// discarded; the delta chain remains sound since consumers never rely
    /// on the snapshot alone.
    #[error("async snapshot publish failed for version {version}: {reason}")]
    AsyncSnapshotPublish {
        /// The snapshot's version.
        version: Version,
        /// Underlying failure reason.
        reason: String,
    },

    /// A `VersionMinter` produced a version that did not strictly exceed
    /// the previous one.
    #[error("version minter violated monotonicity: {previous} then {next}")]
    NonMonotonicVersion {
        /// The previously minted version.
        previous: Version,
        /// The version that violated monotonicity.
        next: Version,
    },

    /// The builder was given an invalid combination of options.
    #[error("invalid producer configuration: {0}")]
    InvalidConfiguration(String),
}

impl CadenceError {
    /// True for errors that leave the write engine reset and the read-state
    /// holder untouched — i.e. every kind that triggers a rollback.
    pub fn is_fatal_for_cycle(&self) -> bool {
        !matches!(self, CadenceError::Listener(_) | CadenceError::AsyncSnapshotPublish { .. })
    }
}
