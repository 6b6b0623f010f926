use crate::{Completion, Error, Snapshot, TxId};
use async_trait::async_trait;
use onyx_types::{Catalog, Job, JobId, Peer, PeerId, PeerNodes, PeerStatus, SyncPath, Task, TaskId, Workflow};
use std::collections::HashMap;
use std::sync::Mutex;

struct State {
    peers: HashMap<PeerId, Peer>,
    retracted_peers: HashMap<PeerId, Peer>,
    jobs: HashMap<JobId, Job>,
    tasks: HashMap<TaskId, Task>,
    history: Vec<Snapshot>,
}

impl State {
    fn new() -> Self {
        Self {
            peers: HashMap::new(),
            retracted_peers: HashMap::new(),
            jobs: HashMap::new(),
            tasks: HashMap::new(),
            history: Vec::new(),
        }
    }

    fn commit(&mut self) -> TxId {
        let tx = TxId(self.history.len() as u64 + 1);
        self.history.push(Snapshot {
            tx,
            peers: self.peers.clone(),
            retracted_peers: self.retracted_peers.clone(),
            jobs: self.jobs.clone(),
            tasks: self.tasks.clone(),
            sees_retracted: false,
        });
        tx
    }

    fn find_peer_by_ack<'s>(&'s self, ack_path: &SyncPath) -> Option<(&'s PeerId, &'s Peer)> {
        self.peers
            .iter()
            .find(|(_, p)| p.nodes.as_ref().map(|n| &n.ack) == Some(ack_path))
    }

    fn find_peer_by_completion<'s>(&'s self, path: &SyncPath) -> Option<(&'s PeerId, &'s Peer)> {
        self.peers
            .iter()
            .find(|(_, p)| p.nodes.as_ref().map(|n| &n.completion) == Some(path))
    }
}

/// An in-process stand-in for a real transactional, time-travel-capable
/// fact store, backed by an append-only history of full-state snapshots.
/// `query()` from the contract is not a general datalog interpreter here:
/// it is the small, fixed set of lookups the coordinators actually need
/// (`next_task`, `idle_peer`, and peer/task/job accessors on `Snapshot`).
pub struct MemoryFactStore {
    state: Mutex<State>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
        }
    }
}

impl Default for MemoryFactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::FactStore for MemoryFactStore {
    async fn db(&self) -> Snapshot {
        let state = self.state.lock().unwrap();
        state
            .history
            .last()
            .cloned()
            .unwrap_or_else(|| Snapshot {
                tx: TxId(0),
                peers: HashMap::new(),
                retracted_peers: HashMap::new(),
                jobs: HashMap::new(),
                tasks: HashMap::new(),
                sees_retracted: false,
            })
    }

    async fn history(&self) -> Snapshot {
        let mut snap = self.db().await;
        snap.sees_retracted = true;
        snap
    }

    async fn as_of(&self, tx: TxId) -> Option<Snapshot> {
        if tx.value() == 0 {
            return None;
        }
        let state = self.state.lock().unwrap();
        state.history.get((tx.value() - 1) as usize).cloned()
    }

    async fn mark_peer_born(
        &self,
        peer: &PeerId,
        pulse: SyncPath,
        shutdown: SyncPath,
    ) -> Result<TxId, Error> {
        let mut state = self.state.lock().unwrap();
        if state.peers.contains_key(peer) {
            return Err(Error::Duplicate(peer.clone()));
        }
        state.peers.insert(peer.clone(), Peer::new(pulse, shutdown));
        Ok(state.commit())
    }

    async fn mark_peer_dead(&self, peer: &PeerId) -> Result<TxId, Error> {
        let mut state = self.state.lock().unwrap();
        let removed = state
            .peers
            .remove(peer)
            .ok_or_else(|| Error::NotFound(peer.clone()))?;
        state.retracted_peers.insert(peer.clone(), removed);
        Ok(state.commit())
    }

    async fn plan_job(
        &self,
        job_id: JobId,
        catalog: Catalog,
        workflow: Workflow,
        tasks: Vec<Task>,
    ) -> Result<TxId, Error> {
        let mut state = self.state.lock().unwrap();
        state.jobs.insert(
            job_id,
            Job {
                id: job_id,
                catalog,
                workflow,
                replica_version: onyx_types::ReplicaVersion::new(0),
                completed: false,
            },
        );
        for task in tasks {
            state.tasks.insert(task.id, task);
        }
        Ok(state.commit())
    }

    async fn next_task(&self) -> Option<Task> {
        let state = self.state.lock().unwrap();
        let assigned: std::collections::HashSet<TaskId> =
            state.peers.values().filter_map(|p| p.assigned_task).collect();

        state
            .tasks
            .values()
            .filter(|t| !t.complete && !assigned.contains(&t.id))
            .min_by_key(|t| (t.phase, t.id))
            .cloned()
    }

    async fn idle_peer(&self) -> Option<PeerId> {
        let state = self.state.lock().unwrap();
        state
            .peers
            .iter()
            .filter(|(_, p)| p.status == PeerStatus::Idle)
            .map(|(id, _)| id.clone())
            .min()
    }

    async fn mark_offered(
        &self,
        task: &TaskId,
        peer: &PeerId,
        nodes: PeerNodes,
    ) -> Result<TxId, Error> {
        let mut state = self.state.lock().unwrap();
        let peer_rec = state
            .peers
            .get_mut(peer)
            .ok_or_else(|| Error::NotFound(peer.clone()))?;
        peer_rec.status = PeerStatus::Acking;
        peer_rec.assigned_task = Some(*task);
        peer_rec.nodes = Some(nodes);
        Ok(state.commit())
    }

    async fn ack(&self, ack_path: &SyncPath) -> Result<TxId, Error> {
        let mut state = self.state.lock().unwrap();
        let (peer_id, peer) = state
            .find_peer_by_ack(ack_path)
            .ok_or_else(|| Error::InvalidAck(format!("no peer with ack path {ack_path}")))?;
        if peer.status != PeerStatus::Acking {
            return Err(Error::InvalidAck(format!("peer {peer_id} is not acking")));
        }
        let task_complete = peer
            .assigned_task
            .and_then(|t| state.tasks.get(&t))
            .map(|t| t.complete)
            .unwrap_or(false);
        if task_complete {
            return Err(Error::InvalidAck(format!(
                "task for peer {peer_id} is already complete"
            )));
        }
        let peer_id = peer_id.clone();
        state.peers.get_mut(&peer_id).unwrap().status = PeerStatus::Active;
        Ok(state.commit())
    }

    async fn complete(&self, completion_path: &SyncPath) -> Result<Completion, Error> {
        let mut state = self.state.lock().unwrap();
        let (peer_id, peer) = state.find_peer_by_completion(completion_path).ok_or_else(|| {
            Error::InvalidComplete(format!("no peer with completion path {completion_path}"))
        })?;
        if peer.status != PeerStatus::Active {
            return Err(Error::InvalidComplete(format!(
                "peer {peer_id} is not active"
            )));
        }
        let task_id = peer
            .assigned_task
            .ok_or_else(|| Error::InvalidComplete(format!("peer {peer_id} has no assigned task")))?;
        let peer_id = peer_id.clone();

        if state.tasks.get(&task_id).map(|t| t.complete).unwrap_or(true) {
            return Err(Error::InvalidComplete(format!(
                "task {task_id} is already complete"
            )));
        }

        state.tasks.get_mut(&task_id).unwrap().complete = true;
        let peer_rec = state.peers.get_mut(&peer_id).unwrap();
        peer_rec.status = PeerStatus::Idle;
        peer_rec.assigned_task = None;
        peer_rec.nodes = None;

        let tx = state.commit();
        Ok(Completion {
            tx,
            peer: peer_id,
            task: task_id,
        })
    }
}
