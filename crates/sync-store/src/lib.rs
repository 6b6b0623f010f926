//! The sync store: an ephemeral, watchable key-value namespace used for
//! peer liveness, task offers, acks and completions. See §4.1 of the
//! design for the full contract.

mod memory;

pub use memory::MemorySyncStore;

use async_trait::async_trait;
use onyx_types::SyncPath;

/// The kind tagged onto a path at `create` time. Purely advisory —
/// nothing in the store enforces that e.g. only a `pulse` path is ever
/// deleted to signal death; it exists so adapters and logs can render
/// a path's purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Peer,
    Pulse,
    Shutdown,
    Payload,
    Ack,
    Status,
    Completion,
}

/// The kind of change a watch observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Written,
    Touched,
    Deleted,
}

#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub path: SyncPath,
    pub kind: ChangeKind,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path not found: {0}")]
    NotFound(SyncPath),
}

/// A live registration for changes to a single path. Watches for a
/// given path are delivered in write order; there is no ordering
/// guarantee between watches registered on different paths.
pub struct Subscription {
    rx: tokio::sync::mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    /// Receive the next change, or `None` once the path has been
    /// deleted and no further changes can occur.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait SyncStore: Send + Sync + 'static {
    /// Allocate a new unique path tagged with `kind`.
    fn create(&self, kind: NodeKind) -> SyncPath;

    /// Idempotent write of an opaque value. Creates the path if it does
    /// not already exist.
    async fn write_place(&self, path: &SyncPath, value: serde_json::Value);

    /// Fails `NotFound` if the path has never been written.
    async fn read_place(&self, path: &SyncPath) -> Result<serde_json::Value, Error>;

    /// Bumps the path's version and fires watches, without changing its
    /// value. Fails `NotFound` if the path does not exist.
    async fn touch_place(&self, path: &SyncPath) -> Result<(), Error>;

    /// Fails `NotFound` if the path does not exist. Firing watchers
    /// observe a `Deleted` event.
    async fn delete(&self, path: &SyncPath) -> Result<(), Error>;

    /// Register a repeated watch on `path`. The returned subscription
    /// yields one `ChangeEvent` per write/touch/delete from this point
    /// forward; callers that only want the first change (a one-shot
    /// watch) simply call `recv()` once and drop the subscription.
    async fn on_change(&self, path: &SyncPath) -> Subscription;
}
