use onyx_types::{Catalog, PeerId, PeerNodes, Task, Workflow};

/// The JSON body written to a peer's payload path after a successful
/// offer: the task descriptor plus everything the executing peer needs
/// without a further round trip.
pub fn offer_payload(task: &Task, nodes: &PeerNodes, catalog: &Catalog, workflow: &Workflow, peer: &PeerId) -> serde_json::Value {
    serde_json::json!({
        "task": task,
        "nodes": {
            "payload": nodes.payload,
            "ack": nodes.ack,
            "completion": nodes.completion,
            "status": nodes.status,
            "catalog": catalog,
            "workflow": workflow,
            "peer": peer,
        },
    })
}
