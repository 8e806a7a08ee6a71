//! Debounced search over a [`MovieSearchProvider`].
//!
//! Every query change aborts the pending timer. A blank query resets the
//! results immediately; anything else schedules a search that fires once
//! the query has been left alone for the debounce interval. When the timer
//! fires it captures the query and begins the fetch in one step, then hands
//! the request to its own task, so a later query change never cancels a
//! request that is already on the wire; the fetch generation guard discards
//! its result instead.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::{domain::Movie, error::FetchError};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    fetch_state::{FetchAttempt, FetchOutcome, FetchState, FetchStateController},
    view::SearchView,
    MovieSearchProvider, SearchCountRecorder,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    PendingDebounce,
    Searching,
    Resolved,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The debounce timer slot. `scheduled` is bumped on every query change so a
/// timer that already woke up can tell it was superseded.
#[derive(Default)]
struct TimerSlot {
    scheduled: u64,
    pending: Option<JoinHandle<()>>,
    closed: bool,
}

struct SearchInner {
    query: watch::Sender<String>,
    phase: watch::Sender<SearchPhase>,
    timer: Mutex<TimerSlot>,
    fetch: FetchStateController<Vec<Movie>>,
    provider: Arc<dyn MovieSearchProvider>,
    recorder: Arc<dyn SearchCountRecorder>,
    delay: Duration,
}

impl SearchInner {
    /// Runs when the debounce timer `ticket` expires. The query is captured
    /// and the attempt begun while the timer slot is held, so a concurrent
    /// `set_query` lands either wholly before or wholly after this.
    fn fire(self: &Arc<Self>, ticket: u64) {
        let mut slot = lock(&self.timer);
        if slot.closed || slot.scheduled != ticket {
            return;
        }
        slot.pending = None;

        let query = self.query.borrow().clone();
        if query.trim().is_empty() {
            return;
        }
        let Some(attempt) = self.fetch.begin() else {
            return;
        };
        self.phase.send_replace(SearchPhase::Searching);
        drop(slot);

        info!(%query, generation = attempt.generation(), "issuing movie search");
        tokio::spawn(Arc::clone(self).complete_search(query, attempt));
    }

    async fn complete_search(self: Arc<Self>, query: String, attempt: FetchAttempt) {
        let fetcher = {
            let provider = Arc::clone(&self.provider);
            let query = query.clone();
            move || {
                let provider = Arc::clone(&provider);
                let query = query.clone();
                async move { provider.search_movies(&query).await }
            }
        };

        match self.fetch.complete_with(attempt, &fetcher).await {
            FetchOutcome::Completed(movies) => {
                self.mark_resolved();
                debug!(%query, results = movies.len(), "movie search completed");
                let Some(top_result) = movies.first() else {
                    return;
                };
                if !self.fetch.is_current(attempt) {
                    debug!(%query, "skipping search count for superseded search");
                    return;
                }
                if let Err(error) = self.recorder.record_search(&query, top_result).await {
                    let error = format!("{error:#}");
                    warn!(%query, %error, "failed to record search count");
                }
            }
            FetchOutcome::Failed(error) => {
                self.mark_resolved();
                warn!(%query, %error, "movie search failed");
            }
            FetchOutcome::Superseded => {
                debug!(%query, "movie search superseded");
            }
        }
    }

    fn mark_resolved(&self) {
        self.phase.send_if_modified(|phase| {
            if *phase == SearchPhase::Searching {
                *phase = SearchPhase::Resolved;
                true
            } else {
                false
            }
        });
    }
}

pub struct DebouncedSearchController {
    inner: Arc<SearchInner>,
}

impl DebouncedSearchController {
    pub fn new(
        provider: Arc<dyn MovieSearchProvider>,
        recorder: Arc<dyn SearchCountRecorder>,
    ) -> Self {
        Self::with_delay(provider, recorder, DEFAULT_DEBOUNCE)
    }

    pub fn with_delay(
        provider: Arc<dyn MovieSearchProvider>,
        recorder: Arc<dyn SearchCountRecorder>,
        delay: Duration,
    ) -> Self {
        let (query, live_query) = watch::channel(String::new());
        let (phase, _) = watch::channel(SearchPhase::Idle);
        // Debounced searches pass their captured query to `complete_with`;
        // the controller's own fetcher only serves a plain `refetch`.
        let fetch = FetchStateController::new(
            {
                let provider = Arc::clone(&provider);
                move || {
                    let provider = Arc::clone(&provider);
                    let query = live_query.borrow().clone();
                    async move { provider.search_movies(&query).await }
                }
            },
            false,
        );

        Self {
            inner: Arc::new(SearchInner {
                query,
                phase,
                timer: Mutex::new(TimerSlot::default()),
                fetch,
                provider,
                recorder,
                delay,
            }),
        }
    }

    /// Replaces the query text. Must be called from within a tokio runtime.
    /// Does nothing after [`teardown`](Self::teardown).
    pub fn set_query(&self, text: impl Into<String>) {
        let mut slot = lock(&self.inner.timer);
        if slot.closed {
            return;
        }

        let text = text.into();
        let is_blank = text.trim().is_empty();
        self.inner.query.send_replace(text);

        slot.scheduled += 1;
        if let Some(pending) = slot.pending.take() {
            pending.abort();
        }

        if is_blank {
            self.inner.fetch.reset();
            self.inner.phase.send_replace(SearchPhase::Idle);
            return;
        }

        self.inner.phase.send_replace(SearchPhase::PendingDebounce);
        let ticket = slot.scheduled;
        let inner = Arc::clone(&self.inner);
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            inner.fire(ticket);
        }));
    }

    /// Aborts the pending timer and freezes the query, phase and fetch state.
    pub fn teardown(&self) {
        let mut slot = lock(&self.inner.timer);
        slot.closed = true;
        if let Some(pending) = slot.pending.take() {
            pending.abort();
        }
        self.inner.fetch.close();
    }

    pub fn query_text(&self) -> String {
        self.inner.query.borrow().clone()
    }

    pub fn phase(&self) -> SearchPhase {
        *self.inner.phase.borrow()
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    pub fn state(&self) -> FetchState<Vec<Movie>> {
        self.inner.fetch.state()
    }

    pub fn data(&self) -> Option<Vec<Movie>> {
        self.inner.fetch.data()
    }

    pub fn loading(&self) -> bool {
        self.inner.fetch.loading()
    }

    pub fn error(&self) -> Option<FetchError> {
        self.inner.fetch.error()
    }

    pub fn view(&self) -> SearchView {
        SearchView::new(self.query_text(), &self.state())
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<Vec<Movie>>> {
        self.inner.fetch.subscribe()
    }

    pub fn subscribe_query(&self) -> watch::Receiver<String> {
        self.inner.query.subscribe()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SearchPhase> {
        self.inner.phase.subscribe()
    }
}

impl Drop for DebouncedSearchController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
