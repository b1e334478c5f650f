use std::sync::Arc;

use crate::WorkloadResource;

/// Raw notification from a [`super::WatchSource`]
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A full list is about to be delivered
    Restarted,
    /// One object of the list in progress
    Listed(WorkloadResource),
    /// The list in progress is complete
    ListDone,
    /// Object created or modified
    Applied(WorkloadResource),
    /// Object deleted; carries its final known state
    Removed(WorkloadResource),
}

/// Change delivered to the event router
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadEvent {
    Added(Arc<WorkloadResource>),
    Updated {
        old: Arc<WorkloadResource>,
        new: Arc<WorkloadResource>,
    },
    Deleted(Arc<WorkloadResource>),
}
