use onyx_types::{Catalog, Direction, EntryType, JobId, Task, TaskId, TaskName, Workflow};
use std::collections::{BTreeMap, BTreeSet};

/// Topologically derives a job's tasks from its workflow, assigning
/// phases and deriving ingress/egress queue names: input tasks take
/// their ingress queue from the catalog, output tasks take their
/// egress queue from the catalog, and every internal edge `a -> b`
/// gets a fresh queue name appended to `a`'s egress and `b`'s ingress.
pub fn plan_tasks(job_id: JobId, catalog: &Catalog, workflow: &Workflow) -> Vec<Task> {
    let phase_of = onyx_types::phases(workflow);
    let inputs = onyx_types::input_tasks(workflow);
    let outputs = onyx_types::output_tasks(workflow);

    let mut tasks: BTreeMap<TaskName, Task> = onyx_types::task_names(workflow)
        .into_iter()
        .map(|name| {
            let phase = phase_of[&name];
            (
                name.clone(),
                Task {
                    id: TaskId::new(),
                    job_id,
                    name,
                    phase,
                    ingress_queues: BTreeSet::new(),
                    egress_queues: BTreeSet::new(),
                    complete: false,
                },
            )
        })
        .collect();

    for name in &inputs {
        if let Some(queue) = catalog_queue_name(catalog, name, Direction::Input) {
            tasks.get_mut(name).expect("input task exists").ingress_queues.insert(queue);
        }
    }
    for name in &outputs {
        if let Some(queue) = catalog_queue_name(catalog, name, Direction::Output) {
            tasks.get_mut(name).expect("output task exists").egress_queues.insert(queue);
        }
    }

    for (src, dsts) in workflow {
        for dst in dsts {
            let queue_name = format!("{src}->{dst}/{}", TaskId::new());
            tasks.get_mut(src).expect("edge source exists").egress_queues.insert(queue_name.clone());
            tasks.get_mut(dst).expect("edge destination exists").ingress_queues.insert(queue_name);
        }
    }

    tasks.into_values().collect()
}

fn catalog_queue_name(catalog: &Catalog, name: &TaskName, direction: Direction) -> Option<String> {
    catalog.iter().find_map(|entry| {
        if &entry.name == name && entry.entry_type == EntryType::Queue && entry.direction == Some(direction) {
            entry.queue.as_ref().map(|q| q.queue_name.clone())
        } else {
            None
        }
    })
}
