use crate::config::BarrierConfig;
use crate::publications::derive_publications;
use crate::state::{BarrierOpts, BarrierState, ShutdownReason};
use checkpoint_store::CheckpointStore;
use messenger::{Barrier, Messenger};
use onyx_types::{CheckpointCoordinate, Epoch, JobId, PeerId, Replica, ReplicaVersion};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{oneshot, watch};

/// `epoch >= first-snapshot-epoch + workflow-depth` is the earliest
/// epoch a periodic barrier may actually persist a checkpoint at,
/// since it takes `workflow-depth` epochs for a barrier to propagate
/// through every task in the workflow.
const FIRST_SNAPSHOT_EPOCH: u64 = 2;

/// Drives one job's barrier protocol until shutdown. Recomputes
/// publications and reinitializes epoch/version state on every
/// reallocation, emits heartbeats on a cadence, and alternates between
/// periodic barriers and draining the current barrier's offer set.
///
/// `allocation_rx` is a watch channel (dropping-capacity-1 semantics:
/// only the latest replica snapshot is ever observed) and `shutdown_rx`
/// a one-shot carrying the stop reason.
pub async fn run(
    job_id: JobId,
    peer_id: PeerId,
    config: BarrierConfig,
    messenger: Arc<dyn Messenger>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    mut allocation_rx: watch::Receiver<Replica>,
    mut shutdown_rx: oneshot::Receiver<ShutdownReason>,
) {
    let mut state = BarrierState::new(job_id, peer_id);

    loop {
        match shutdown_rx.try_recv() {
            Ok(reason) => {
                stop(&messenger, reason).await;
                return;
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                stop(&messenger, ShutdownReason::Requested).await;
                return;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        if allocation_rx.has_changed().unwrap_or(false) {
            let replica = allocation_rx.borrow_and_update().clone();
            reallocate(&mut state, &messenger, &*checkpoint_store, &config.tenancy_id, &replica).await;
            continue;
        }

        let now = Instant::now();

        if now >= state.last_heartbeat_time + config.heartbeat_period() {
            for publisher in &state.publishers {
                publisher.heartbeat().await;
            }
            state.last_heartbeat_time = now;
            continue;
        }

        if state.offering {
            resume_offer(&mut state).await;
            continue;
        }

        if now >= state.last_barrier_time + config.barrier_period() {
            let replica = allocation_rx.borrow().clone();
            begin_periodic_barrier(&mut state, &*checkpoint_store, &config.tenancy_id, &replica).await;
            continue;
        }

        tokio::select! {
            _ = &mut shutdown_rx => {}
            _ = allocation_rx.changed() => {}
            _ = tokio::time::sleep(config.max_sleep()) => {}
        }
    }
}

async fn stop(messenger: &Arc<dyn Messenger>, reason: ShutdownReason) {
    tracing::info!(?reason, "barrier loop stopping");
    messenger.stop().await;
}

async fn reallocate(
    state: &mut BarrierState,
    messenger: &Arc<dyn Messenger>,
    checkpoint_store: &dyn CheckpointStore,
    tenancy_id: &str,
    replica: &Replica,
) {
    let Some(job) = replica.job(&state.job_id) else {
        tracing::warn!(job_id = %state.job_id, "reallocation observed with no allocation for this job");
        return;
    };

    state.workflow_depth = onyx_types::phases(&job.workflow).values().copied().max().unwrap_or(0) + 1;

    let publications: Vec<_> = derive_publications(replica, state.job_id, &state.peer_id).into_iter().collect();
    state.publishers = messenger.set_publications(publications).await;

    state.replica_version = ReplicaVersion::new(job.allocation_version);
    state.epoch = Epoch::zero().next();

    match checkpoint_store.read(tenancy_id, state.job_id).await {
        Some((coord, version)) => {
            state.zk_version = Some(version);
            state.barrier_opts = BarrierOpts {
                recover_coordinates: Some(coord),
                checkpointed_epoch: None,
            };
        }
        None => {
            state.zk_version = None;
            state.barrier_opts = BarrierOpts::default();
        }
    }

    state.rem_barriers = state.publishers.clone();
    state.offering = true;
}

async fn begin_periodic_barrier(
    state: &mut BarrierState,
    checkpoint_store: &dyn CheckpointStore,
    tenancy_id: &str,
    replica: &Replica,
) {
    state.epoch = state.epoch.next();

    let job_completed = replica.job(&state.job_id).map(|j| j.completed).unwrap_or(false);
    let mut checkpointed_epoch = None;

    if !job_completed && state.epoch.value() >= FIRST_SNAPSHOT_EPOCH + state.workflow_depth as u64 {
        let candidate = Epoch::new(state.epoch.value() - state.workflow_depth as u64);
        let coordinate = CheckpointCoordinate {
            tenancy_id: tenancy_id.to_string(),
            job_id: state.job_id,
            replica_version: state.replica_version,
            epoch: candidate,
        };
        match checkpoint_store.write_cas(coordinate, state.zk_version).await {
            Ok(version) => {
                state.zk_version = Some(version);
                checkpointed_epoch = Some(candidate);
            }
            Err(err) => {
                tracing::info!(%err, job_id = %state.job_id, "checkpoint write lost the compare-and-swap race, keeping prior version");
            }
        }
    }

    state.barrier_opts = BarrierOpts {
        checkpointed_epoch,
        recover_coordinates: None,
    };
    state.rem_barriers = state.publishers.clone();
    state.offering = true;
}

async fn resume_offer(state: &mut BarrierState) {
    let barrier = Barrier {
        replica_version: state.replica_version,
        epoch: state.epoch,
        checkpointed_epoch: state.barrier_opts.checkpointed_epoch,
        recover_coordinates: state.barrier_opts.recover_coordinates.clone(),
    };

    let mut still_pending = Vec::with_capacity(state.rem_barriers.len());
    for publisher in state.rem_barriers.drain(..) {
        publisher.heartbeat().await;
        if publisher.offer(&barrier).await <= 0 {
            still_pending.push(publisher);
        }
    }
    state.rem_barriers = still_pending;

    if state.rem_barriers.is_empty() {
        state.offering = false;
        state.barrier_opts = BarrierOpts::default();
        state.last_barrier_time = Instant::now();
    }
}
