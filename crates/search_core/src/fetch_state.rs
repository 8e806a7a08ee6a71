//! Loading/data/error tracking for a single asynchronous operation.
//!
//! A [`FetchStateController`] wraps any zero-argument async producer and
//! publishes a [`FetchState`] through a `tokio::sync::watch` channel so a
//! presentation layer can both read snapshots and await changes.
//!
//! Every attempt is tagged with a generation number. Starting a new attempt,
//! resetting, or closing the controller advances the generation, and an
//! attempt whose generation is no longer current is dropped on completion
//! instead of overwriting newer state.

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use shared::error::FetchError;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Any zero-argument operation producing `T` asynchronously.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self) -> Result<T>;
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    async fn fetch(&self) -> Result<T> {
        (self)().await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> FetchState<T> {
    /// True once an attempt has produced either data or an error and nothing
    /// is currently loading.
    pub fn is_settled(&self) -> bool {
        !self.loading && (self.data.is_some() || self.error.is_some())
    }
}

/// Ticket for an attempt started with [`FetchStateController::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchAttempt {
    generation: u64,
}

impl FetchAttempt {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What a call to [`FetchStateController::execute`] ended up applying.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Completed(T),
    Failed(FetchError),
    /// A newer attempt, a reset, or a close happened while this attempt was
    /// in flight; its result was discarded.
    Superseded,
}

struct Shared<T> {
    fetcher: Box<dyn Fetcher<T>>,
    state: watch::Sender<FetchState<T>>,
    generation: AtomicU64,
    closed: AtomicBool,
}

pub struct FetchStateController<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for FetchStateController<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> FetchStateController<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Builds a controller around `fetcher`.
    ///
    /// With `auto_start` the first attempt begins before this returns
    /// (`loading` is already true) and is driven to completion on a spawned
    /// task, so it must be called from within a tokio runtime.
    pub fn new(fetcher: impl Fetcher<T> + 'static, auto_start: bool) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        let controller = Self {
            shared: Arc::new(Shared {
                fetcher: Box::new(fetcher),
                state,
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        };

        if auto_start {
            if let Some(attempt) = controller.begin() {
                let task = controller.clone();
                tokio::spawn(async move {
                    task.complete(attempt).await;
                });
            }
        }

        controller
    }

    /// Runs one attempt. Failures land in `error`; nothing is returned as an
    /// `Err` to the caller.
    pub async fn execute(&self) -> FetchOutcome<T> {
        let Some(attempt) = self.begin() else {
            return FetchOutcome::Superseded;
        };
        self.complete(attempt).await
    }

    pub async fn refetch(&self) -> FetchOutcome<T> {
        self.execute().await
    }

    /// Clears data, loading and error immediately. Any attempt still in
    /// flight is discarded when it finishes.
    pub fn reset(&self) {
        if self.is_closed() {
            return;
        }
        self.shared.state.send_modify(|state| {
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            *state = FetchState::default();
        });
    }

    /// Stops all further state changes. In-flight fetches keep running but
    /// their results are ignored.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        debug!("fetch state controller closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> FetchState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.shared.state.borrow().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn error(&self) -> Option<FetchError> {
        self.shared.state.borrow().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Starts an attempt without awaiting it: bumps the generation, clears
    /// the error and sets `loading`. Returns `None` once closed.
    pub fn begin(&self) -> Option<FetchAttempt> {
        if self.is_closed() {
            return None;
        }
        let mut generation = 0;
        self.shared.state.send_modify(|state| {
            generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.error = None;
            state.loading = true;
        });
        Some(FetchAttempt { generation })
    }

    /// Whether `attempt` is still the latest one and the controller is open.
    pub fn is_current(&self, attempt: FetchAttempt) -> bool {
        !self.is_closed() && self.shared.generation.load(Ordering::SeqCst) == attempt.generation
    }

    /// Finishes an attempt with the controller's own fetcher.
    pub async fn complete(&self, attempt: FetchAttempt) -> FetchOutcome<T> {
        self.complete_with(attempt, self.shared.fetcher.as_ref()).await
    }

    /// Finishes an attempt with a one-off fetcher, e.g. one bound to the
    /// arguments captured when the attempt began.
    pub async fn complete_with(
        &self,
        attempt: FetchAttempt,
        fetcher: &dyn Fetcher<T>,
    ) -> FetchOutcome<T> {
        let generation = attempt.generation;
        let result = AssertUnwindSafe(fetcher.fetch()).catch_unwind().await;

        let outcome = match result {
            Ok(Ok(data)) => FetchOutcome::Completed(data),
            Ok(Err(err)) => FetchOutcome::Failed(FetchError::from(err)),
            Err(_) => {
                warn!(generation, "fetcher panicked; reporting generic error");
                FetchOutcome::Failed(FetchError::generic())
            }
        };

        let applied = self.shared.state.send_if_modified(|state| {
            if !self.is_current(attempt) {
                return false;
            }
            match &outcome {
                FetchOutcome::Completed(data) => state.data = Some(data.clone()),
                FetchOutcome::Failed(error) => state.error = Some(error.clone()),
                FetchOutcome::Superseded => {}
            }
            state.loading = false;
            true
        });

        if applied {
            outcome
        } else {
            debug!(generation, "discarding result of superseded fetch");
            FetchOutcome::Superseded
        }
    }
}

#[cfg(test)]
#[path = "tests/fetch_state_tests.rs"]
mod tests;
