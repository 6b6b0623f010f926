use crate::TaskName;
use serde::{Deserialize, Serialize};

/// `onyx/type` of a catalog entry. Only `queue` and `transformer` are
/// meaningful to the coordinator; other values are preserved verbatim
/// in `consumption` but never interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Queue,
    Transformer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Input,
    Output,
}

/// The queue medium + queue-name pair carried by a `queue`-typed entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBinding {
    pub medium: String,
    pub queue_name: String,
}

/// One entry of a job's catalog. `consumption` is opaque to the
/// coordinator and is round-tripped verbatim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: TaskName,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Only present (and only meaningful) when `entry_type == Queue`.
    pub direction: Option<Direction>,
    pub queue: Option<QueueBinding>,
    #[serde(default)]
    pub consumption: serde_json::Value,
}

pub type Catalog = Vec<CatalogEntry>;
