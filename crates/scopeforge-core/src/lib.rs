//! # ScopeForge Core
//!
//! Shared, runtime-free logic for ScopeForge: data models, the error
//! taxonomy, chunking, the chunk store abstraction, the embedding and
//! reasoning provider traits, hybrid reconciliation, maturity scoring, and
//! the content-framework stage.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The
//! `scopeforge` application crate supplies concrete stores, providers,
//! and the concurrent orchestration around them.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod evaluate;
pub mod framework;
pub mod models;
pub mod quality;
pub mod reasoning;
pub mod reconcile;
pub mod scoring;
pub mod store;

pub use error::{Error, ErrorKind, Failure, Result};
