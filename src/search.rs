//! Debounced node search
//!
//! Each call to `search` supersedes any call still waiting out its quiet
//! period. Only the latest query reaches the gateway, and a response that
//! arrives after a newer query was issued is dropped.

use crate::config::Config;
use crate::gateway::{Gateway, SearchMode, SearchResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Quiet period before a query is sent
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Results(Vec<SearchResult>),
    /// A newer query was issued before this one finished
    Superseded,
    Failed(String),
}

impl SearchOutcome {
    pub fn results(&self) -> Option<&[SearchResult]> {
        match self {
            Self::Results(r) => Some(r),
            _ => None,
        }
    }
}

pub struct SearchDebouncer {
    gateway: Arc<dyn Gateway>,
    window: Duration,
    mode: SearchMode,
    generation: AtomicU64,
}

impl SearchDebouncer {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            window: DEFAULT_DEBOUNCE,
            mode: SearchMode::default(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_config(gateway: Arc<dyn Gateway>, config: &Config) -> Self {
        Self::new(gateway)
            .with_window(config.search.debounce())
            .with_mode(config.search.mode)
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Search with the configured mode
    pub async fn search(&self, query: &str) -> SearchOutcome {
        self.search_with_mode(query, self.mode).await
    }

    /// Wait out the quiet period, then query the gateway if nothing newer
    /// arrived meanwhile. A blank query supersedes pending ones and returns
    /// no results without a gateway call.
    pub async fn search_with_mode(&self, query: &str, mode: SearchMode) -> SearchOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if query.trim().is_empty() {
            return SearchOutcome::Results(Vec::new());
        }

        tokio::time::sleep(self.window).await;
        if !self.is_current(generation) {
            return SearchOutcome::Superseded;
        }

        let result = self.gateway.search_nodes(query, mode).await;
        if !self.is_current(generation) {
            debug!(query, "dropping results for superseded query");
            return SearchOutcome::Superseded;
        }

        match result {
            Ok(results) => {
                debug!(query, %mode, hits = results.len(), "search finished");
                SearchOutcome::Results(results)
            }
            Err(e) => {
                warn!(query, %mode, error = %e, "search failed");
                SearchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Supersede anything pending without issuing a new query
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}
