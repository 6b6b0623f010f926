//! End-to-end exercise of the barrier loop against `MemoryMessenger`
//! and `MemoryCheckpointStore`: epoch advances strictly within a
//! replica-version, checkpoints land once the workflow depth has been
//! crossed, and a reallocation resets the epoch before bumping the
//! replica-version.

use barrier_coordinator::{run, BarrierConfig, ShutdownReason};
use checkpoint_store::{CheckpointStore, MemoryCheckpointStore};
use messenger::MemoryMessenger;
use onyx_types::{AllocatedPeer, JobAllocation, JobId, PeerId, Replica, TaskName};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::time::timeout;

const POLL_DEADLINE: Duration = Duration::from_secs(2);

fn fast_config() -> BarrierConfig {
    BarrierConfig {
        max_sleep_ms: 5,
        barrier_period_ms: 5,
        heartbeat_ms: 60_000,
        tenancy_id: "tenant-a".into(),
    }
}

fn single_input_workflow() -> onyx_types::Workflow {
    let mut w = BTreeMap::new();
    w.entry(TaskName::from("in")).or_insert_with(Default::default).insert(TaskName::from("out"));
    w
}

fn replica_for(job_id: JobId, coordinator: &PeerId, allocation_version: u64) -> Replica {
    let mut replica = Replica::default();
    replica.jobs.insert(
        job_id,
        JobAllocation {
            job_id,
            allocation_version,
            catalog: Vec::new(),
            workflow: single_input_workflow(),
            peers: vec![AllocatedPeer { peer_id: PeerId::new("/peer/worker-a"), site: "site-1".into() }],
            completed: false,
        },
    );
    replica.coordinators.insert(job_id, coordinator.clone());
    replica
}

async fn wait_for_checkpoint(
    store: &MemoryCheckpointStore,
    tenancy_id: &str,
    job_id: JobId,
) -> onyx_types::CheckpointCoordinate {
    let deadline = Instant::now() + POLL_DEADLINE;
    loop {
        if let Some((coord, _version)) = store.read(tenancy_id, job_id).await {
            return coord;
        }
        assert!(Instant::now() < deadline, "no checkpoint was written within the poll deadline");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Epoch strictly increases across periodic barriers, and the first
/// checkpoint lands at `epoch - workflow_depth` once the workflow depth
/// has been crossed (here: depth 2, so the first checkpoint is at
/// overall epoch 4, persisting checkpointed-epoch 2).
#[tokio::test]
async fn periodic_barriers_advance_epoch_and_checkpoint_once_depth_crossed() {
    let job_id = JobId::new();
    let coordinator = PeerId::new("/peer/coordinator");
    let replica = replica_for(job_id, &coordinator, 1);

    let messenger = Arc::new(MemoryMessenger::new());
    let checkpoint_store = Arc::new(MemoryCheckpointStore::new());
    // Seed with a neutral default and send the real replica right after
    // spawning: a fresh `watch` receiver treats its seed value as
    // already seen, so seeding directly with `replica` would make the
    // loop's first `has_changed()` false and it would never perform the
    // initial reallocation that builds publications and workflow depth.
    let (allocation_tx, allocation_rx) = watch::channel(Replica::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let handle = tokio::spawn(run(
        job_id,
        coordinator.clone(),
        fast_config(),
        messenger.clone(),
        checkpoint_store.clone(),
        allocation_rx,
        shutdown_rx,
    ));
    allocation_tx.send(replica.clone()).unwrap();

    let coord = timeout(POLL_DEADLINE, wait_for_checkpoint(&checkpoint_store, "tenant-a", job_id))
        .await
        .expect("checkpoint write timed out");
    assert_eq!(coord.epoch.value(), 2, "first persisted checkpoint is at epoch - workflow_depth = 4 - 2");
    assert_eq!(coord.replica_version.value(), 1);

    // Some barrier was actually offered on the messenger's one
    // publication, carrying increasing epochs.
    let offered = messenger.all_offered_barriers();
    assert!(!offered.is_empty());
    assert!(offered.windows(2).all(|w| w[1].epoch.value() > w[0].epoch.value()), "epoch must strictly increase");

    let _ = shutdown_tx.send(ShutdownReason::Requested);
    handle.await.unwrap();
    assert!(messenger.is_stopped());

    drop(allocation_tx);
}

/// A reallocation resets the epoch to 0 then immediately to 1 before
/// any barrier of the new replica-version is emitted, even though the
/// prior replica-version had already advanced epoch well past that.
#[tokio::test]
async fn reallocation_resets_epoch_before_bumping_replica_version() {
    let job_id = JobId::new();
    let coordinator = PeerId::new("/peer/coordinator");
    let replica_v1 = replica_for(job_id, &coordinator, 1);

    let messenger = Arc::new(MemoryMessenger::new());
    let checkpoint_store = Arc::new(MemoryCheckpointStore::new());
    let (allocation_tx, allocation_rx) = watch::channel(Replica::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let handle = tokio::spawn(run(
        job_id,
        coordinator.clone(),
        fast_config(),
        messenger.clone(),
        checkpoint_store.clone(),
        allocation_rx,
        shutdown_rx,
    ));
    allocation_tx.send(replica_v1.clone()).unwrap();

    // Let the first replica-version advance past the point where it
    // would have checkpointed, so its barriers are well into epoch > 4.
    timeout(POLL_DEADLINE, wait_for_checkpoint(&checkpoint_store, "tenant-a", job_id)).await.unwrap();

    let replica_v2 = replica_for(job_id, &coordinator, 2);
    allocation_tx.send(replica_v2).unwrap();

    let coord_v2 = timeout(
        Duration::from_secs(3),
        async {
            loop {
                if let Some((coord, _)) = checkpoint_store.read("tenant-a", job_id).await {
                    if coord.replica_version.value() == 2 {
                        return coord;
                    }
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        },
    )
    .await
    .expect("replica-version 2 never checkpointed");

    assert_eq!(coord_v2.replica_version.value(), 2);
    assert_eq!(coord_v2.epoch.value(), 2, "epoch counting restarts from 1 on reallocation, same as replica-version 1");

    let _ = shutdown_tx.send(ShutdownReason::Requested);
    handle.await.unwrap();
}
