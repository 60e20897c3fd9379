//! Application services for prgraph.
//!
//! * [`adapter`] persists analyses into any [`prgraph_core::store::FactStore`]
//!   and reads them back.
//! * [`service`] owns the extraction pipeline, an in-memory cache and the
//!   optional persistent adapter.
//! * [`plugin`] exposes the service through named, schema-described plugins.

pub mod adapter;
pub mod plugin;
pub mod service;

pub use adapter::GraphAdapter;
pub use plugin::{Plugin, PluginRegistry};
pub use service::{AnalysisService, ServiceError};
