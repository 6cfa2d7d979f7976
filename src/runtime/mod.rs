//! # Runtime
//!
//! Process-level concerns that are not part of the dispatch core. Tracing
//! setup lives here so the binary can initialize observability before any
//! component logs.

pub mod tracing;
