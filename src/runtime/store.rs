//! The space store contract and its in-memory implementation.

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::graph::FlowSnapshot;
use crate::types::SpaceId;

/// Failures of a space store backend.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("store backend error: {message}")]
    #[diagnostic(
        code(loomflow::store::backend),
        help("Check the backing database's availability and permissions.")
    )]
    Backend { message: String },

    #[error("persisted payload error: {source}")]
    #[diagnostic(
        code(loomflow::store::payload),
        help("The stored payload does not match the expected space shape.")
    )]
    Payload {
        #[from]
        source: crate::runtime::persistence::PersistenceError,
    },
}

/// Durable storage for flow spaces. Last write wins; a save replaces the
/// whole space payload.
#[async_trait]
pub trait SpaceStore: Send + Sync {
    async fn load(&self, space_id: &SpaceId) -> Result<Option<FlowSnapshot>, StoreError>;
    async fn save(&self, space_id: &SpaceId, snapshot: &FlowSnapshot) -> Result<(), StoreError>;
}

/// Default store: process-memory only, gone when the process exits.
#[derive(Default)]
pub struct InMemorySpaceStore {
    spaces: Mutex<FxHashMap<SpaceId, FlowSnapshot>>,
}

impl InMemorySpaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn space_count(&self) -> usize {
        self.spaces.lock().len()
    }
}

#[async_trait]
impl SpaceStore for InMemorySpaceStore {
    async fn load(&self, space_id: &SpaceId) -> Result<Option<FlowSnapshot>, StoreError> {
        Ok(self.spaces.lock().get(space_id).cloned())
    }

    async fn save(&self, space_id: &SpaceId, snapshot: &FlowSnapshot) -> Result<(), StoreError> {
        self.spaces
            .lock()
            .insert(space_id.clone(), snapshot.clone());
        Ok(())
    }
}
