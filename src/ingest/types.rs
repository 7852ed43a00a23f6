// src/ingest/types.rs
use async_trait::async_trait;

use crate::error::FetchError;
use crate::posting::{AdapterKind, Posting, Source};

/// One origin of postings. Implementations only do I/O against their source
/// and never touch shared state; a failure stays local to the adapter.
///
/// Zero configured targets or zero results is `Ok(vec![])`, not an error.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Posting>, FetchError>;

    fn source(&self) -> Source;

    fn name(&self) -> &'static str {
        self.source().as_str()
    }

    fn kind(&self) -> AdapterKind {
        self.source().kind()
    }
}
