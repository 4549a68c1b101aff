//! Active specification store
//!
//! Holds the single currently-loaded document. Loads are last-wins: every
//! `load` or `clear` starts a new generation, and a load only writes its
//! result if its generation is still current when it finishes.

use crate::error::LoadError;
use crate::graph::{self, SchemaUsageMap};
use crate::model::ValidatedDocument;
use crate::operations::{self, Endpoint};
use crate::pipeline::Ingestor;
use crate::source::SpecSource;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A successfully loaded specification
#[derive(Debug)]
pub struct LoadedSpec {
    /// Fresh for every successful load
    pub id: Uuid,
    pub name: String,
    pub document: ValidatedDocument,
    /// YAML of the bundled document, as handed to downstream consumers
    pub raw_text: String,
}

impl LoadedSpec {
    pub fn endpoints(&self) -> Vec<Endpoint> {
        operations::list_endpoints(self.document.api())
    }

    /// Computed on demand from the current document
    pub fn schema_usage(&self) -> SchemaUsageMap {
        graph::build_schema_usage(&self.document)
    }
}

/// Point-in-time view of the store
#[derive(Debug, Clone, Default)]
pub struct SpecSnapshot {
    pub spec: Option<Arc<LoadedSpec>>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    generation: u64,
    current: Option<Arc<LoadedSpec>>,
    loading: bool,
    error: Option<String>,
}

struct StoreInner {
    ingestor: Ingestor,
    state: RwLock<StoreState>,
}

/// Shared handle to the active specification; clones see the same state
#[derive(Clone)]
pub struct SpecStore {
    inner: Arc<StoreInner>,
}

impl SpecStore {
    pub fn new(ingestor: Ingestor) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                ingestor,
                state: RwLock::new(StoreState::default()),
            }),
        }
    }

    /// Start loading a source
    ///
    /// The load's place in line is taken when this is called, not when the
    /// returned future is first polled. The previous document stays visible
    /// until the load succeeds.
    pub fn load(
        &self,
        source: SpecSource,
    ) -> impl Future<Output = Result<Arc<LoadedSpec>, LoadError>> + Send + 'static {
        let ticket = {
            let mut state = self.inner.state.write();
            state.generation += 1;
            state.loading = true;
            state.generation
        };
        let inner = Arc::clone(&self.inner);

        async move {
            let result = inner.ingestor.ingest(&source).await;

            let mut state = inner.state.write();
            if state.generation != ticket {
                info!(source = %source, "Discarding result of superseded load");
                return Err(LoadError::Superseded);
            }
            state.loading = false;

            match result {
                Ok(ingested) => {
                    let spec = Arc::new(LoadedSpec {
                        id: Uuid::new_v4(),
                        name: ingested.name,
                        document: ingested.document,
                        raw_text: ingested.raw_text,
                    });
                    state.current = Some(Arc::clone(&spec));
                    state.error = None;
                    Ok(spec)
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Failed to load specification");
                    state.error = Some(e.to_string());
                    Err(LoadError::Ingest(e))
                }
            }
        }
    }

    /// Drop the current document and invalidate any load in flight
    pub fn clear(&self) {
        let mut state = self.inner.state.write();
        let generation = state.generation + 1;
        *state = StoreState {
            generation,
            ..StoreState::default()
        };
    }

    pub fn snapshot(&self) -> SpecSnapshot {
        let state = self.inner.state.read();
        SpecSnapshot {
            spec: state.current.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    /// Raw text of the current document
    pub fn raw_text(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .current
            .as_ref()
            .map(|spec| spec.raw_text.clone())
    }
}
