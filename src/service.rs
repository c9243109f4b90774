//! Ingest and retrieve operations over an injected artifact store

use crate::error::{Error, Result};
use crate::ingest::{normalize, strip_fences};
use crate::render::{render, OutputFormat, Rendered};
use crate::store::ArtifactStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReceipt {
    pub key: String,
    pub column_count: usize,
    pub row_count: usize,
}

/// The pipeline from raw model text to stored table and back.
pub struct TableService {
    store: Arc<dyn ArtifactStore>,
    ttl: Duration,
}

impl TableService {
    pub fn new(store: Arc<dyn ArtifactStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Strip fences, normalize, and store the CSV under a fresh key.
    ///
    /// Nothing is stored when the text does not normalize.
    pub async fn ingest(&self, raw_text: &str) -> Result<IngestReceipt> {
        let table = normalize(strip_fences(raw_text)).map_err(|e| {
            tracing::warn!(code = e.code(), error = %e, "Rejected ingestion input");
            e
        })?;

        let column_count = table.column_count();
        let row_count = table.row_count();
        let header = table.header_line().to_string();
        let key = self.store.put(table.serialized, self.ttl).await?;

        tracing::info!(
            key = %key,
            rows = row_count,
            columns = column_count,
            header = %header,
            "Stored tabular artifact"
        );

        Ok(IngestReceipt {
            key,
            column_count,
            row_count,
        })
    }

    /// Fetch a live artifact and render it.
    pub async fn retrieve(&self, key: &str, format: OutputFormat) -> Result<Rendered> {
        let payload = self.store.get(key).await?.ok_or(Error::NotFound)?;
        render(payload, format)
    }
}
