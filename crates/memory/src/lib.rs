//! RouteQA memory and governance layer
//!
//! Persists the durable side of a run: the memory anchor with its
//! artifact bundle and session record, the capped search index, and the
//! append-only governance log.

pub mod anchor;
pub mod governance;
pub mod index;

pub use anchor::AnchorStore;
pub use governance::GovernanceSink;
