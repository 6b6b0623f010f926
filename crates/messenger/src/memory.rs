use crate::{Barrier, Publication, Publisher};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// An in-process stand-in for a real transport-backed messenger. Each
/// publisher records every barrier it was offered and can be told to
/// fail a configurable number of offers before succeeding, to exercise
/// the barrier coordinator's "not yet offered, retry next tick" path.
pub struct MemoryMessenger {
    publishers: Mutex<Vec<Arc<MemoryPublisher>>>,
    stopped: AtomicBool,
}

impl MemoryMessenger {
    pub fn new() -> Self {
        Self {
            publishers: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Every barrier every publisher has ever been offered, flattened
    /// in the order publishers were created. Test-only introspection.
    pub fn all_offered_barriers(&self) -> Vec<Barrier> {
        self.publishers
            .lock()
            .unwrap()
            .iter()
            .flat_map(|p| p.offered.lock().unwrap().clone())
            .collect()
    }
}

impl Default for MemoryMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::Messenger for MemoryMessenger {
    async fn set_publications(&self, publications: Vec<Publication>) -> Vec<Arc<dyn Publisher>> {
        let mut built = Vec::new();
        let mut guard = self.publishers.lock().unwrap();
        guard.clear();
        for _pub in publications {
            let p = Arc::new(MemoryPublisher::new());
            guard.push(p.clone());
            built.push(p as Arc<dyn Publisher>);
        }
        built
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

struct MemoryPublisher {
    offered: Mutex<Vec<Barrier>>,
    fail_next: AtomicI64,
}

impl MemoryPublisher {
    fn new() -> Self {
        Self {
            offered: Mutex::new(Vec::new()),
            fail_next: AtomicI64::new(0),
        }
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn heartbeat(&self) -> bool {
        true
    }

    async fn offer(&self, barrier: &Barrier) -> i64 {
        self.offered.lock().unwrap().push(barrier.clone());
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Messenger, PeerRole, SrcPeerId};
    use onyx_types::{JobId, PeerId, TaskName};

    #[tokio::test]
    async fn set_publications_replaces_prior_publisher_set() {
        let messenger = MemoryMessenger::new();
        let pubn = Publication {
            job_id: JobId::new(),
            task: TaskName::new("in"),
            site: "site-a".into(),
            src_peer_id: SrcPeerId {
                role: PeerRole::Coordinator,
                peer_id: PeerId::new("/peer/0"),
            },
            slot_id: -1,
            dst_peer_ids: Default::default(),
            short_id: 1,
        };

        let first = messenger.set_publications(vec![pubn.clone()]).await;
        assert_eq!(first.len(), 1);

        let second = messenger.set_publications(vec![pubn.clone(), pubn]).await;
        assert_eq!(second.len(), 2);

        messenger.stop().await;
        assert!(messenger.is_stopped());
    }
}
