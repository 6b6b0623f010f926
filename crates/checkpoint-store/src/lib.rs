//! The checkpoint store: a strongly-consistent, CAS-versioned store of
//! per-job checkpoint coordinates. Shared across coordinators that might
//! contend for the same job; the loser of a race takes no action.

mod memory;

pub use memory::MemoryCheckpointStore;

use async_trait::async_trait;
use onyx_types::CheckpointCoordinate;

/// The store-specific version stamp returned by every write and
/// required (optionally) on the next write for optimistic concurrency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("checkpoint write for {tenancy_id}/{job_id} lost the compare-and-swap race")]
pub struct BadVersion {
    pub tenancy_id: String,
    pub job_id: onyx_types::JobId,
}

#[async_trait]
pub trait CheckpointStore: Send + Sync + 'static {
    /// The most recently written coordinate for `(tenancy_id, job_id)`,
    /// and the version stamp it was written with.
    async fn read(
        &self,
        tenancy_id: &str,
        job_id: onyx_types::JobId,
    ) -> Option<(CheckpointCoordinate, Version)>;

    /// Writes `coordinate`, succeeding only if the currently held
    /// version equals `expected_version` (or the key is absent and
    /// `expected_version` is `None`). Returns the new version on
    /// success, or `BadVersion` if another writer won the race.
    async fn write_cas(
        &self,
        coordinate: CheckpointCoordinate,
        expected_version: Option<Version>,
    ) -> Result<Version, BadVersion>;
}
