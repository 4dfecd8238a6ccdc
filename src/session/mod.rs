//! Session state: the persisted token pair and the route gate that reads it.

pub mod gate;
pub mod store;
pub mod types;

pub use gate::{Access, Destination, GateDecision, SessionGate};
pub use store::{
    backend_from_config, keyring_supported, FileBackend, KeyringBackend, MemoryBackend, TokenBackend, TokenStore,
};
pub use types::{PersistedTokens, Session};
