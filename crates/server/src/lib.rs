//! HTTP surface for the requisition and sales workflows. The binary in
//! `main.rs` wires configuration, bootstrap, and shutdown; everything the
//! handlers need lives behind [`state::AppState`] so tests can run the
//! router against in-memory stores.

pub mod api;
pub mod bootstrap;
pub mod documents;
pub mod health;
pub mod state;
