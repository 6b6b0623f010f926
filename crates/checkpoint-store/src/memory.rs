use crate::{BadVersion, Version};
use async_trait::async_trait;
use onyx_types::{CheckpointCoordinate, JobId};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-process stand-in for a real strongly-consistent metadata store
/// (e.g. etcd or ZooKeeper). Not the out-of-scope dev-mode embedded
/// metadata server — just enough CAS semantics to drive the barrier
/// coordinator's recovery and periodic-checkpoint paths in tests.
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<(String, JobId), (CheckpointCoordinate, Version)>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::CheckpointStore for MemoryCheckpointStore {
    async fn read(&self, tenancy_id: &str, job_id: JobId) -> Option<(CheckpointCoordinate, Version)> {
        self.entries
            .lock()
            .unwrap()
            .get(&(tenancy_id.to_string(), job_id))
            .cloned()
    }

    async fn write_cas(
        &self,
        coordinate: CheckpointCoordinate,
        expected_version: Option<Version>,
    ) -> Result<Version, BadVersion> {
        let key = (coordinate.tenancy_id.clone(), coordinate.job_id);
        let mut entries = self.entries.lock().unwrap();

        let current_version = entries.get(&key).map(|(_, v)| *v);
        if current_version != expected_version {
            return Err(BadVersion {
                tenancy_id: coordinate.tenancy_id.clone(),
                job_id: coordinate.job_id,
            });
        }

        let new_version = Version(current_version.map_or(1, |v| v.0 + 1));
        entries.insert(key, (coordinate, new_version));
        Ok(new_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CheckpointStore;
    use onyx_types::{Epoch, ReplicaVersion};

    fn coord(job_id: JobId, epoch: u64) -> CheckpointCoordinate {
        CheckpointCoordinate {
            tenancy_id: "tenant-a".into(),
            job_id,
            replica_version: ReplicaVersion::new(1),
            epoch: Epoch::new(epoch),
        }
    }

    #[tokio::test]
    async fn first_write_requires_no_expected_version() {
        let store = MemoryCheckpointStore::new();
        let job_id = JobId::new();
        let v = store.write_cas(coord(job_id, 1), None).await.unwrap();
        assert_eq!(v.value(), 1);
    }

    #[tokio::test]
    async fn cas_conflict_is_bad_version_and_does_not_mutate() {
        let store = MemoryCheckpointStore::new();
        let job_id = JobId::new();
        let v1 = store.write_cas(coord(job_id, 1), None).await.unwrap();

        // Someone else already advanced past v1; writing against the
        // stale version must fail and must not change the stored value.
        let err = store.write_cas(coord(job_id, 2), None).await.unwrap_err();
        assert_eq!(err.job_id, job_id);

        let (stored, version) = store.read("tenant-a", job_id).await.unwrap();
        assert_eq!(stored.epoch.value(), 1);
        assert_eq!(version, v1);
    }

    #[tokio::test]
    async fn cas_success_advances_version() {
        let store = MemoryCheckpointStore::new();
        let job_id = JobId::new();
        let v1 = store.write_cas(coord(job_id, 1), None).await.unwrap();
        let v2 = store.write_cas(coord(job_id, 2), Some(v1)).await.unwrap();
        assert!(v2.value() > v1.value());

        let (stored, _) = store.read("tenant-a", job_id).await.unwrap();
        assert_eq!(stored.epoch.value(), 2);
    }
}
