use onyx_types::{JobId, PeerId, TaskName};
use std::collections::BTreeSet;

/// The role a peer-id plays in a short-id lookup key. The coordinator
/// is always the source of a publication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeerRole {
    Coordinator,
}

/// The source side of a publication: always this job's barrier
/// coordinator.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SrcPeerId {
    pub role: PeerRole,
    pub peer_id: PeerId,
}

/// The key under which a replica's `message-short-ids` map is consulted
/// to find the short id for a publication. `slot_id` is always `-1` for
/// the publications this coordinator emits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortIdKey {
    pub role: PeerRole,
    pub peer_id: PeerId,
    pub job_id: JobId,
    pub task: TaskName,
    pub slot_id: i64,
}

/// One (task, site) publication: the unit of barrier fan-out. Grouping
/// is by site (a co-location key) so that peers sharing a site receive
/// one publication rather than one per peer.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Publication {
    pub job_id: JobId,
    pub task: TaskName,
    pub site: String,
    pub src_peer_id: SrcPeerId,
    pub slot_id: i64,
    pub dst_peer_ids: BTreeSet<PeerId>,
    pub short_id: u64,
}
