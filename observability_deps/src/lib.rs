//! Central re-export of the tracing ecosystem used across the Tempo core
//! crates, so every crate depends on this rather than `tracing` directly.
//! Keeps the version pinned in one place.

pub use tracing;
