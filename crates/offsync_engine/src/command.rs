//! Two-phase commands: optimistic local apply, queued remote commit.

use offsync_protocol::OperationKind;
use serde_json::Value;

/// A mutation to be delivered to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Mutation kind.
    pub kind: OperationKind,
    /// Target resource.
    pub resource: String,
    /// Opaque payload.
    pub payload: Value,
}

impl Mutation {
    /// Creates a mutation.
    pub fn new(kind: OperationKind, resource: impl Into<String>, payload: Value) -> Self {
        Self {
            kind,
            resource: resource.into(),
            payload,
        }
    }

    /// A `Create` mutation.
    pub fn create(resource: impl Into<String>, payload: Value) -> Self {
        Self::new(OperationKind::Create, resource, payload)
    }

    /// An `Update` mutation.
    pub fn update(resource: impl Into<String>, payload: Value) -> Self {
        Self::new(OperationKind::Update, resource, payload)
    }

    /// A `Delete` mutation.
    pub fn delete(resource: impl Into<String>, payload: Value) -> Self {
        Self::new(OperationKind::Delete, resource, payload)
    }
}

/// A user action with an immediate local effect and a deferred server write.
///
/// [`SyncEngine::execute`](crate::SyncEngine::execute) calls [`apply`](Self::apply)
/// synchronously, then enqueues the [`Mutation`] returned by
/// [`commit`](Self::commit). Delivery happens on a later drain pass.
pub trait Command {
    /// Applies the change to local state.
    fn apply(&self);

    /// Describes the server write for the change.
    fn commit(&self) -> Mutation;
}
