use crate::{ChangeEvent, ChangeKind, Error, NodeKind, Subscription};
use async_trait::async_trait;
use onyx_types::SyncPath;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

struct Node {
    value: Option<serde_json::Value>,
    subscribers: Vec<mpsc::UnboundedSender<ChangeEvent>>,
}

impl Node {
    fn new() -> Self {
        Self {
            value: None,
            subscribers: Vec::new(),
        }
    }

    fn fire(&mut self, path: &SyncPath, kind: ChangeKind) {
        self.subscribers.retain(|tx| {
            tx.send(ChangeEvent {
                path: path.clone(),
                kind,
            })
            .is_ok()
        });
    }
}

/// An in-process stand-in for a real ephemeral, watchable store. This is
/// the adapter exercised by every test in this workspace; it is not a
/// reimplementation of the out-of-scope development-mode metadata
/// server, just the minimum needed to drive the coordinators end to end.
pub struct MemorySyncStore {
    nodes: Mutex<HashMap<SyncPath, Node>>,
    counter: AtomicU64,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    fn kind_prefix(kind: NodeKind) -> &'static str {
        match kind {
            NodeKind::Peer => "peer",
            NodeKind::Pulse => "pulse",
            NodeKind::Shutdown => "shutdown",
            NodeKind::Payload => "payload",
            NodeKind::Ack => "ack",
            NodeKind::Status => "status",
            NodeKind::Completion => "completion",
        }
    }
}

impl Default for MemorySyncStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::SyncStore for MemorySyncStore {
    fn create(&self, kind: NodeKind) -> SyncPath {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = SyncPath::new(format!("/{}/{n}", Self::kind_prefix(kind)));
        self.nodes.lock().unwrap().insert(path.clone(), Node::new());
        path
    }

    async fn write_place(&self, path: &SyncPath, value: serde_json::Value) {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.entry(path.clone()).or_insert_with(Node::new);
        node.value = Some(value);
        node.fire(path, ChangeKind::Written);
    }

    async fn read_place(&self, path: &SyncPath) -> Result<serde_json::Value, Error> {
        let nodes = self.nodes.lock().unwrap();
        nodes
            .get(path)
            .and_then(|n| n.value.clone())
            .ok_or_else(|| Error::NotFound(path.clone()))
    }

    async fn touch_place(&self, path: &SyncPath) -> Result<(), Error> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        node.fire(path, ChangeKind::Touched);
        Ok(())
    }

    async fn delete(&self, path: &SyncPath) -> Result<(), Error> {
        let mut node = self
            .nodes
            .lock()
            .unwrap()
            .remove(path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        node.fire(path, ChangeKind::Deleted);
        Ok(())
    }

    async fn on_change(&self, path: &SyncPath) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.entry(path.clone()).or_insert_with(Node::new);
        node.subscribers.push(tx);
        Subscription { rx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncStore;

    #[tokio::test]
    async fn create_write_read_round_trips() {
        let store = MemorySyncStore::new();
        let path = store.create(NodeKind::Payload);
        assert!(matches!(store.read_place(&path).await, Err(Error::NotFound(_))));

        store.write_place(&path, serde_json::json!({"hello": "world"})).await;
        let value = store.read_place(&path).await.unwrap();
        assert_eq!(value, serde_json::json!({"hello": "world"}));
    }

    #[tokio::test]
    async fn watch_observes_touch_and_delete_in_order() {
        let store = MemorySyncStore::new();
        let path = store.create(NodeKind::Ack);
        let mut sub = store.on_change(&path).await;

        store.touch_place(&path).await.unwrap();
        store.delete(&path).await.unwrap();

        let first = sub.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Touched);
        let second = sub.recv().await.unwrap();
        assert_eq!(second.kind, ChangeKind::Deleted);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn delete_of_missing_path_fails_not_found() {
        let store = MemorySyncStore::new();
        let path = SyncPath::new("/nope/0");
        assert!(matches!(store.delete(&path).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn touch_of_missing_path_fails_not_found() {
        let store = MemorySyncStore::new();
        let path = SyncPath::new("/nope/0");
        assert!(matches!(store.touch_place(&path).await, Err(Error::NotFound(_))));
    }
}
