//! Drives the barrier/checkpoint protocol for every job a peer
//! coordinates: one [`run`] loop per job, elected and torn down as the
//! cluster's replica allocation changes.

mod config;
mod election;
mod publications;
mod state;

#[path = "loop_.rs"]
mod loop_impl;

pub use config::BarrierConfig;
pub use election::{decide, ElectionAction};
pub use loop_impl::run;
pub use publications::derive_publications;
pub use state::ShutdownReason;

use checkpoint_store::CheckpointStore;
use messenger::Messenger;
use onyx_types::{JobId, PeerId, Replica};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;

struct RunningJob {
    allocation_tx: watch::Sender<Replica>,
    shutdown_tx: Option<oneshot::Sender<ShutdownReason>>,
    handle: JoinHandle<()>,
    /// The `allocation-version` last forwarded (or started with), used
    /// to decide whether a continuing coordinator needs `Forward`.
    last_allocation_version: u64,
}

/// Owns the set of barrier loops this peer currently coordinates, and
/// reconciles that set against each newly observed [`Replica`].
///
/// This is the composition-root piece that turns the bare
/// start/stop/forward decision in [`election`] into actual running
/// tasks: one per job this peer is elected coordinator for.
pub struct JobCoordinators {
    checkpoint_store: Arc<dyn CheckpointStore>,
    config: BarrierConfig,
    running: Mutex<HashMap<JobId, RunningJob>>,
}

impl JobCoordinators {
    pub fn new(checkpoint_store: Arc<dyn CheckpointStore>, config: BarrierConfig) -> Self {
        Self { checkpoint_store, config, running: Mutex::new(HashMap::new()) }
    }

    /// Reconciles running loops against a freshly observed replica by
    /// running every job this peer was or is now coordinating through
    /// [`election::decide`]: `Stop` aborts a loop this peer no longer
    /// coordinates, `Forward` pushes the new snapshot to a loop that's
    /// still this peer's but whose allocation-version moved, and
    /// `Start` spawns a loop for a job newly elected. `messenger_for`
    /// builds the transport a new loop should publish through; it is
    /// not called for jobs that are merely forwarded or stopped.
    pub async fn observe<F>(&self, self_id: &PeerId, replica: &Replica, messenger_for: F)
    where
        F: Fn(JobId) -> Arc<dyn Messenger>,
    {
        let mut running = self.running.lock().await;

        let job_ids: BTreeSet<JobId> =
            running.keys().copied().chain(replica.coordinators.keys().copied()).collect();

        for job_id in job_ids {
            let started = running.contains_key(&job_id);
            let start = replica.coordinator(&job_id) == Some(self_id);
            let allocation_changed = match (replica.job(&job_id), running.get(&job_id)) {
                (Some(job), Some(existing)) => job.allocation_version != existing.last_allocation_version,
                _ => false,
            };

            match decide(started, start, allocation_changed) {
                ElectionAction::Stop(reason) => {
                    if let Some(mut job) = running.remove(&job_id) {
                        if let Some(tx) = job.shutdown_tx.take() {
                            let _ = tx.send(reason);
                        }
                        job.handle.abort();
                    }
                }
                ElectionAction::Forward => {
                    if let Some(job) = running.get_mut(&job_id) {
                        let _ = job.allocation_tx.send(replica.clone());
                        if let Some(alloc) = replica.job(&job_id) {
                            job.last_allocation_version = alloc.allocation_version;
                        }
                    }
                }
                ElectionAction::Start => {
                    // Seed with a neutral default rather than `replica`
                    // itself: a `watch` receiver considers the value
                    // present at channel-creation time already "seen",
                    // so seeding with the real replica would make the
                    // loop's very first `has_changed()` check false and
                    // it would never run the initial reallocation that
                    // builds publications and workflow depth. Sending
                    // the real replica immediately after spawning makes
                    // that first change observable.
                    let (allocation_tx, allocation_rx) = watch::channel(Replica::default());
                    let (shutdown_tx, shutdown_rx) = oneshot::channel();
                    let messenger = messenger_for(job_id);
                    let handle = tokio::spawn(run(
                        job_id,
                        self_id.clone(),
                        self.config.clone(),
                        messenger,
                        self.checkpoint_store.clone(),
                        allocation_rx,
                        shutdown_rx,
                    ));
                    let _ = allocation_tx.send(replica.clone());
                    let last_allocation_version = replica.job(&job_id).map(|j| j.allocation_version).unwrap_or(0);
                    running.insert(
                        job_id,
                        RunningJob {
                            allocation_tx,
                            shutdown_tx: Some(shutdown_tx),
                            handle,
                            last_allocation_version,
                        },
                    );
                }
                ElectionAction::Noop => {}
            }
        }
    }

    /// Stops every running loop and waits for them to exit.
    pub async fn shutdown(&self) {
        let mut running = self.running.lock().await;
        for (_, mut job) in running.drain() {
            if let Some(tx) = job.shutdown_tx.take() {
                let _ = tx.send(ShutdownReason::Requested);
            }
            let _ = job.handle.await;
        }
    }
}
