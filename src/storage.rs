use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::purge::PurgeRule;
use crate::types::{BulkFailure, BulkResponse, Document, PartialUpdate, ScrollPage, StoredDocument};

/// The remote document index the loader and transformer talk to
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Whether the service answers at all
    async fn ping(&self) -> Result<bool>;

    // Collection operations
    async fn index_exists(&self, index: &str) -> Result<bool>;
    async fn create_index(&self, index: &str) -> Result<()>;
    async fn delete_index(&self, index: &str) -> Result<()>;
    async fn count(&self, index: &str) -> Result<u64>;

    /// Server-side copy of every document; returns the number copied
    async fn reindex(&self, source: &str, target: &str) -> Result<u64>;

    // Document operations
    async fn bulk_insert(&self, index: &str, docs: &[Document]) -> Result<BulkResponse>;
    async fn bulk_update(&self, index: &str, updates: &[PartialUpdate]) -> Result<BulkResponse>;
    async fn delete_by_query(&self, index: &str, rule: &PurgeRule) -> Result<u64>;

    // Paged full-collection reads
    async fn open_scroll(&self, index: &str, page_size: usize) -> Result<ScrollPage>;
    async fn next_scroll(&self, scroll_id: &str) -> Result<ScrollPage>;
    async fn clear_scroll(&self, scroll_id: &str) -> Result<()>;
}

type Rejector = Box<dyn Fn(&Document) -> bool + Send + Sync>;

struct Scroll {
    snapshot: Vec<StoredDocument>,
    position: usize,
    page_size: usize,
}

#[derive(Default)]
struct State {
    /// Documents per collection, in insertion order
    indices: HashMap<String, Vec<StoredDocument>>,
    scrolls: HashMap<String, Scroll>,
}

/// In-memory index for development/testing
pub struct InMemoryIndex {
    state: Arc<Mutex<State>>,
    reachable: bool,
    reject_inserts: Option<Rejector>,
    reject_updates: Option<Rejector>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            reachable: true,
            reject_inserts: None,
            reject_updates: None,
        }
    }

    /// An index whose ping always fails
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// Refuse inserts of documents matching `predicate`
    pub fn rejecting<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.reject_inserts = Some(Box::new(predicate));
        self
    }

    /// Refuse partial updates to stored documents matching `predicate`
    pub fn rejecting_updates<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.reject_updates = Some(Box::new(predicate));
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| PipelineError::Storage(format!("index state poisoned: {e}")))
    }

    /// Snapshot of a collection's documents, in insertion order
    pub fn documents(&self, index: &str) -> Result<Vec<StoredDocument>> {
        let state = self.lock()?;
        Ok(state.indices.get(index).cloned().unwrap_or_default())
    }

    /// Number of scroll contexts not yet cleared
    pub fn open_scrolls(&self) -> Result<usize> {
        Ok(self.lock()?.scrolls.len())
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(index: &str) -> PipelineError {
    PipelineError::Api {
        status: 404,
        message: format!("no such index [{index}]"),
    }
}

fn next_page(scroll_id: &str, scroll: &mut Scroll) -> ScrollPage {
    let end = (scroll.position + scroll.page_size).min(scroll.snapshot.len());
    let hits = scroll.snapshot[scroll.position..end].to_vec();
    scroll.position = end;
    ScrollPage {
        scroll_id: Some(scroll_id.to_string()),
        hits,
    }
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    async fn ping(&self) -> Result<bool> {
        Ok(self.reachable)
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.lock()?.indices.contains_key(index))
    }

    async fn create_index(&self, index: &str) -> Result<()> {
        let mut state = self.lock()?;
        if state.indices.contains_key(index) {
            return Err(PipelineError::Api {
                status: 400,
                message: format!("index [{index}] already exists"),
            });
        }
        state.indices.insert(index.to_string(), Vec::new());
        debug!("Created index {}", index);
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.lock()?.indices.remove(index);
        debug!("Deleted index {}", index);
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let state = self.lock()?;
        let docs = state.indices.get(index).ok_or_else(|| missing(index))?;
        Ok(docs.len() as u64)
    }

    async fn reindex(&self, source: &str, target: &str) -> Result<u64> {
        let mut state = self.lock()?;
        let copied: Vec<StoredDocument> = state
            .indices
            .get(source)
            .ok_or_else(|| missing(source))?
            .clone();
        let n = copied.len() as u64;
        state
            .indices
            .entry(target.to_string())
            .or_default()
            .extend(copied);
        Ok(n)
    }

    async fn bulk_insert(&self, index: &str, docs: &[Document]) -> Result<BulkResponse> {
        let mut response = BulkResponse::default();
        let mut accepted = Vec::with_capacity(docs.len());
        for doc in docs {
            if self.reject_inserts.as_ref().map_or(false, |f| f(doc)) {
                response.failures.push(BulkFailure {
                    id: None,
                    reason: "document rejected".to_string(),
                });
                continue;
            }
            accepted.push(StoredDocument {
                id: Uuid::new_v4().to_string(),
                source: doc.clone(),
            });
        }
        response.succeeded = accepted.len();

        // Bulk requests auto-create the collection
        let mut state = self.lock()?;
        state.indices.entry(index.to_string()).or_default().extend(accepted);
        Ok(response)
    }

    async fn bulk_update(&self, index: &str, updates: &[PartialUpdate]) -> Result<BulkResponse> {
        let mut state = self.lock()?;
        let docs = state.indices.get_mut(index).ok_or_else(|| missing(index))?;
        let mut response = BulkResponse::default();

        for update in updates {
            match docs.iter_mut().find(|d| d.id == update.id) {
                Some(stored) if self.reject_updates.as_ref().map_or(false, |f| f(&stored.source)) => {
                    response.failures.push(BulkFailure {
                        id: Some(update.id.clone()),
                        reason: "document rejected".to_string(),
                    });
                }
                Some(stored) => {
                    stored.source.merge(&update.doc);
                    response.succeeded += 1;
                }
                None => response.failures.push(BulkFailure {
                    id: Some(update.id.clone()),
                    reason: "document missing".to_string(),
                }),
            }
        }
        Ok(response)
    }

    async fn delete_by_query(&self, index: &str, rule: &PurgeRule) -> Result<u64> {
        let mut state = self.lock()?;
        let docs = state.indices.get_mut(index).ok_or_else(|| missing(index))?;
        let before = docs.len();
        docs.retain(|d| !rule.is_invalid(&d.source));
        Ok((before - docs.len()) as u64)
    }

    async fn open_scroll(&self, index: &str, page_size: usize) -> Result<ScrollPage> {
        let mut state = self.lock()?;
        let snapshot = state.indices.get(index).ok_or_else(|| missing(index))?.clone();
        let scroll_id = Uuid::new_v4().to_string();
        let mut scroll = Scroll {
            snapshot,
            position: 0,
            page_size: page_size.max(1),
        };
        let page = next_page(&scroll_id, &mut scroll);
        state.scrolls.insert(scroll_id, scroll);
        Ok(page)
    }

    async fn next_scroll(&self, scroll_id: &str) -> Result<ScrollPage> {
        let mut state = self.lock()?;
        let scroll = state.scrolls.get_mut(scroll_id).ok_or_else(|| PipelineError::Api {
            status: 404,
            message: format!("no search context found for id [{scroll_id}]"),
        })?;
        Ok(next_page(scroll_id, scroll))
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        self.lock()?.scrolls.remove(scroll_id);
        Ok(())
    }
}
