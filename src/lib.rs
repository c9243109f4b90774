//! tabvault - Ephemeral Tabular Artifact Store
//!
//! tabvault takes JSON produced by a language model (often wrapped in a
//! markdown code fence), flattens it into a table, and keeps the CSV under
//! a random key for a short time so a second consumer can fetch it by key.
//!
//! ## Architecture
//!
//! ```text
//!  raw text ──▶ strip_fences ──▶ normalize ──▶ ArtifactStore::put ──▶ key
//!                                   │                  │
//!                              CSV payload     expiry = now + ttl
//!
//!  key ──▶ ArtifactStore::get ──▶ render(raw | records) ──▶ CSV / {"data": [...]}
//!               │
//!        expired == absent
//! ```
//!
//! ## Modules
//!
//! - [`ingest`]: fence stripping and JSON-to-table normalization
//! - [`store`]: the `ArtifactStore` trait, memory and SQLite backends, sweeper
//! - [`render`]: CSV passthrough or JSON records on retrieval
//! - [`service`]: `TableService` tying the pipeline to a store
//! - [`api`]: HTTP endpoints
//! - [`config`]: Configuration management

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod render;
pub mod service;
pub mod store;

pub use config::TabvaultConfig;
pub use error::{Error, Result};
pub use service::{IngestReceipt, TableService};
