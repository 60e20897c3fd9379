//! Core types and trait definitions for prgraph.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! defines the fact-store abstraction, the knowledge-graph model produced by
//! extraction, and the conversation input records.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod connections;
pub mod conversation;
pub mod entity;
pub mod error;
pub mod graph;
pub mod key;
pub mod source;
pub mod store;
pub mod triple;

pub use error::{Error, Result};
