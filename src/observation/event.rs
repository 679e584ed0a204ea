use crate::types::Key;
use serde::{Deserialize, Serialize};

/// What happened to an instance, from an observer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// One observation-bus event: always published strictly after the commit that
/// produced it, in commit order, so a subscriber never observes a mutation before
/// it's durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub datastore: String,
    pub kind: EventKind,
    pub instance_key: Key,
    pub committed_version: u64,
}
