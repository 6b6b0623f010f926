use messenger::{PeerRole, Publication, SrcPeerId};
use onyx_types::{JobId, PeerId, Replica};
use std::collections::{BTreeMap, BTreeSet};

/// Groups a job's allocated peers by site and pairs each (input task,
/// site) with the peers at that site, producing the publication set a
/// messenger should be driving. Duplicates collapse naturally since the
/// result is a set.
pub fn derive_publications(replica: &Replica, job_id: JobId, peer_id: &PeerId) -> BTreeSet<Publication> {
    let Some(job) = replica.job(&job_id) else {
        return BTreeSet::new();
    };
    let inputs = onyx_types::input_tasks(&job.workflow);

    let mut by_site: BTreeMap<&str, BTreeSet<PeerId>> = BTreeMap::new();
    for allocated in &job.peers {
        by_site.entry(allocated.site.as_str()).or_default().insert(allocated.peer_id.clone());
    }

    let mut publications = BTreeSet::new();
    for task in &inputs {
        for (site, dst_peer_ids) in &by_site {
            let short_id = replica
                .message_short_ids
                .get(&(peer_id.clone(), job_id, task.clone(), -1))
                .copied()
                .unwrap_or(0);
            publications.insert(Publication {
                job_id,
                task: task.clone(),
                site: (*site).to_string(),
                src_peer_id: SrcPeerId {
                    role: PeerRole::Coordinator,
                    peer_id: peer_id.clone(),
                },
                slot_id: -1,
                dst_peer_ids: dst_peer_ids.clone(),
                short_id,
            });
        }
    }
    publications
}

#[cfg(test)]
mod tests {
    use super::*;
    use onyx_types::{AllocatedPeer, JobAllocation, TaskName};
    use std::collections::BTreeMap;

    fn workflow_with_one_input() -> onyx_types::Workflow {
        let mut w = BTreeMap::new();
        w.entry(TaskName::from("in")).or_insert_with(BTreeSet::new).insert(TaskName::from("out"));
        w
    }

    #[test]
    fn groups_peers_by_site_and_drops_duplicates() {
        let job_id = JobId::new();
        let coordinator = PeerId::new("/peer/coord");

        let mut replica = Replica::default();
        replica.jobs.insert(
            job_id,
            JobAllocation {
                job_id,
                allocation_version: 1,
                catalog: Vec::new(),
                workflow: workflow_with_one_input(),
                peers: vec![
                    AllocatedPeer { peer_id: PeerId::new("/peer/a"), site: "rack-1".into() },
                    AllocatedPeer { peer_id: PeerId::new("/peer/b"), site: "rack-1".into() },
                    AllocatedPeer { peer_id: PeerId::new("/peer/c"), site: "rack-2".into() },
                ],
                completed: false,
            },
        );

        let publications = derive_publications(&replica, job_id, &coordinator);
        assert_eq!(publications.len(), 2, "one publication per (input task, site)");

        let rack1 = publications.iter().find(|p| p.site == "rack-1").unwrap();
        assert_eq!(rack1.dst_peer_ids.len(), 2);
        assert_eq!(rack1.slot_id, -1);
    }
}
