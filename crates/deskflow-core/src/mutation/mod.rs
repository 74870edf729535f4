// ── Mutations ──
//
// User writes go through the coordinator: remote write first, then the
// confirmed row is patched into the cache and related keys are invalidated.

mod coordinator;
mod patch;

use std::fmt;
use std::sync::Arc;

use deskflow_api::Row;

use crate::model::{Record, Resource, RowId};

pub use coordinator::MutationCoordinator;
pub use patch::{remove_record, upsert_record};

/// The write to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update(RowId),
    Delete(RowId),
}

impl Operation {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    pub fn target(&self) -> Option<&RowId> {
        match self {
            Self::Insert => None,
            Self::Update(id) | Self::Delete(id) => Some(id),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(id) => write!(f, "{} {id}", self.verb()),
            None => f.write_str(self.verb()),
        }
    }
}

/// Custom cache patch: previous collection and the row the server stored
/// (`None` for deletes) to the next collection. Must be keyed by id so that
/// applying it twice changes nothing.
pub type Patch = Arc<dyn Fn(&[Record], Option<&Record>) -> Vec<Record> + Send + Sync>;

/// A user-initiated write.
#[derive(Clone)]
pub struct MutationIntent {
    pub resource: Resource,
    pub operation: Operation,
    pub payload: Row,
    /// Overrides the default upsert/remove patch.
    pub optimistic_patch: Option<Patch>,
}

impl MutationIntent {
    pub fn insert(resource: Resource, payload: Row) -> Self {
        Self {
            resource,
            operation: Operation::Insert,
            payload,
            optimistic_patch: None,
        }
    }

    pub fn update(resource: Resource, id: RowId, payload: Row) -> Self {
        Self {
            resource,
            operation: Operation::Update(id),
            payload,
            optimistic_patch: None,
        }
    }

    pub fn delete(resource: Resource, id: RowId) -> Self {
        Self {
            resource,
            operation: Operation::Delete(id),
            payload: Row::new(),
            optimistic_patch: None,
        }
    }

    #[must_use]
    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.optimistic_patch = Some(patch);
        self
    }
}

impl fmt::Debug for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationIntent")
            .field("resource", &self.resource)
            .field("operation", &self.operation)
            .field("payload", &self.payload)
            .field("optimistic_patch", &self.optimistic_patch.is_some())
            .finish()
    }
}

/// Result of a confirmed write.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub resource: Resource,
    pub operation: Operation,
    /// The stored row; `None` for deletes.
    pub record: Option<Record>,
}
