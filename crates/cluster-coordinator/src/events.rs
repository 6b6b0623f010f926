use onyx_types::{Catalog, SyncPath, Workflow};

/// The taxonomy of failures surfaced on `failure-mult`. Each names the
/// input channel whose handler rejected the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    PeerBirth,
    PeerDeath,
    Ack,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureEvent {
    pub kind: FailureKind,
}

/// A `{catalog, workflow}` submission arriving on `planning-ch`.
#[derive(Clone, Debug)]
pub struct PlanRequest {
    pub catalog: Catalog,
    pub workflow: Workflow,
}

#[derive(Clone, Debug)]
pub struct AckEvent {
    pub path: SyncPath,
}

#[derive(Clone, Debug)]
pub struct CompletionEvent {
    pub path: SyncPath,
}
