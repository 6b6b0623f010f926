use crate::TaskName;
use std::collections::{BTreeMap, BTreeSet};

#[cfg(test)]
mod tests {
    use super::*;

    fn wf(edges: &[(&str, &str)]) -> Workflow {
        let mut w: Workflow = BTreeMap::new();
        for (src, dst) in edges {
            w.entry(TaskName::from(*src))
                .or_default()
                .insert(TaskName::from(*dst));
        }
        w
    }

    #[test]
    fn linear_chain_phases() {
        let w = wf(&[("in", "inc"), ("inc", "out")]);
        let p = phases(&w);
        assert_eq!(p[&TaskName::from("in")], 0);
        assert_eq!(p[&TaskName::from("inc")], 1);
        assert_eq!(p[&TaskName::from("out")], 2);

        assert_eq!(input_tasks(&w), BTreeSet::from([TaskName::from("in")]));
        assert_eq!(output_tasks(&w), BTreeSet::from([TaskName::from("out")]));
    }

    #[test]
    fn diamond_takes_longest_path() {
        // in -> a -> out
        // in -> b -> c -> out
        let w = wf(&[
            ("in", "a"),
            ("a", "out"),
            ("in", "b"),
            ("b", "c"),
            ("c", "out"),
        ]);
        let p = phases(&w);
        // `out`'s phase must exceed every predecessor's, so it takes the
        // longer in->b->c->out path rather than in->a->out.
        assert_eq!(p[&TaskName::from("out")], 3);
    }

    #[quickcheck_macros::quickcheck]
    fn phase_respects_edge_order(seed: u8) -> bool {
        // Build a small random DAG by only ever pointing from a lower
        // index to a higher one, which guarantees acyclicity.
        let n = 1 + (seed % 6) as usize;
        let names: Vec<TaskName> = (0..n).map(|i| TaskName::from(format!("t{i}").as_str())).collect();
        let mut w: Workflow = BTreeMap::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if (seed as usize).wrapping_mul(7 + i * 13 + j) % 3 == 0 {
                    w.entry(names[i].clone()).or_default().insert(names[j].clone());
                }
            }
        }
        let p = phases(&w);
        w.iter().all(|(src, dsts)| {
            dsts.iter().all(|dst| p.get(dst).unwrap() > p.get(src).unwrap())
        })
    }
}

/// A DAG expressed as a map-of-maps: `{src -> {dst1 -> {}, dst2 -> {}}}`.
/// Sources with no incoming edges are inputs; sinks with no outgoing
/// edges are outputs.
pub type Workflow = BTreeMap<TaskName, BTreeSet<TaskName>>;

/// Every task name mentioned anywhere in the workflow, as either a
/// source or a destination.
pub fn task_names(workflow: &Workflow) -> BTreeSet<TaskName> {
    let mut names = BTreeSet::new();
    for (src, dsts) in workflow {
        names.insert(src.clone());
        names.extend(dsts.iter().cloned());
    }
    names
}

/// Tasks with no incoming edge: the roots of the DAG.
pub fn input_tasks(workflow: &Workflow) -> BTreeSet<TaskName> {
    let mut has_incoming: BTreeSet<TaskName> = BTreeSet::new();
    for dsts in workflow.values() {
        has_incoming.extend(dsts.iter().cloned());
    }
    task_names(workflow)
        .into_iter()
        .filter(|n| !has_incoming.contains(n))
        .collect()
}

/// Tasks with no outgoing edge: the sinks of the DAG.
pub fn output_tasks(workflow: &Workflow) -> BTreeSet<TaskName> {
    task_names(workflow)
        .into_iter()
        .filter(|n| workflow.get(n).map_or(true, |dsts| dsts.is_empty()))
        .collect()
}

/// The longest distance from any root, used as a task's `phase`. Roots
/// are phase 0. A task's phase is always strictly greater than every
/// predecessor's, so ascending-phase order is a valid topological
/// order. Panics if the workflow has a cycle, since a job's workflow is
/// required to be acyclic.
pub fn phases(workflow: &Workflow) -> BTreeMap<TaskName, u32> {
    let all = task_names(workflow);

    let mut predecessors: BTreeMap<TaskName, BTreeSet<TaskName>> =
        all.iter().map(|n| (n.clone(), BTreeSet::new())).collect();
    for (src, dsts) in workflow {
        for dst in dsts {
            predecessors.entry(dst.clone()).or_default().insert(src.clone());
        }
    }

    let mut phase: BTreeMap<TaskName, u32> = BTreeMap::new();
    let mut remaining = all.clone();

    while !remaining.is_empty() {
        let ready: Vec<TaskName> = remaining
            .iter()
            .filter(|n| predecessors[*n].iter().all(|p| phase.contains_key(p)))
            .cloned()
            .collect();
        assert!(
            !ready.is_empty(),
            "workflow must be acyclic: no task became ready"
        );
        for name in ready {
            let p = predecessors[&name]
                .iter()
                .map(|pred| phase[pred] + 1)
                .max()
                .unwrap_or(0);
            phase.insert(name.clone(), p);
            remaining.remove(&name);
        }
    }

    phase
}
