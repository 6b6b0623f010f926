use crate::{SyncPath, TaskId};
use serde::{Deserialize, Serialize};

/// `idle -> acking (offer) -> active (ack) -> idle (complete)`, with a
/// transition to `dead` from any non-dead state on pulse loss or revoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerStatus {
    Idle,
    Acking,
    Active,
    Dead,
}

/// Which of a peer's four sync-store nodes a watch or lookup refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerNodeKind {
    Payload,
    Ack,
    Status,
    Completion,
}

/// The four sync-store paths allocated for an offer. Present only while
/// a peer has an outstanding or active task assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerNodes {
    pub payload: SyncPath,
    pub ack: SyncPath,
    pub status: SyncPath,
    pub completion: SyncPath,
}

/// The durable fact-store record of a single peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub pulse: SyncPath,
    pub shutdown: SyncPath,
    pub status: PeerStatus,
    pub assigned_task: Option<TaskId>,
    pub nodes: Option<PeerNodes>,
}

impl Peer {
    pub fn new(pulse: SyncPath, shutdown: SyncPath) -> Self {
        Self {
            pulse,
            shutdown,
            status: PeerStatus::Idle,
            assigned_task: None,
            nodes: None,
        }
    }
}
