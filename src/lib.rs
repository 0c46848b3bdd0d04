//! Purpose: Client library for remote, versioned, tile-addressed platefile indexes.
//! Exports: `core` (data model, addressing, write queue, errors) and `api` (`RemoteIndex`).
//! Role: Library backing the `platefile` CLI and higher-level mosaicking tools.
//! Invariants: Every operation is a blocking request/reply; there are no background threads.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
