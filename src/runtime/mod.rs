//! Space runtime: configuration, persistence, and the [`FlowSpace`] façade.
//!
//! A space is one persisted flow graph plus its runtime surroundings. The
//! [`SpaceStore`] trait abstracts where snapshots live ([`InMemorySpaceStore`]
//! by default, sqlite behind the `sqlite` feature), the [`DebouncedSaver`]
//! keeps writes coalesced and off the edit path, and [`RuntimeConfig`] holds
//! the knobs for all of it.

pub mod config;
pub mod debounce;
pub mod persistence;
pub mod space;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod store_sqlite;

pub use config::{EventBusConfig, PersistenceMode, RuntimeConfig, SinkConfig};
pub use debounce::DebouncedSaver;
pub use persistence::{PersistedSpace, PersistenceError};
pub use space::{FlowSpace, SpaceError};
pub use store::{InMemorySpaceStore, SpaceStore, StoreError};

#[cfg(feature = "sqlite")]
pub use store_sqlite::SqliteSpaceStore;
