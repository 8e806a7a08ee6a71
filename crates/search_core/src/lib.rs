use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{Movie, MovieDetails, MovieId};

pub mod fetch_state;
pub mod recorder;
pub mod search;
pub mod tmdb;
pub mod view;

pub use fetch_state::{FetchAttempt, FetchOutcome, FetchState, FetchStateController, Fetcher};
pub use recorder::{HttpSearchCountRecorder, LoggingSearchCountRecorder};
pub use search::{DebouncedSearchController, SearchPhase, DEFAULT_DEBOUNCE};
pub use tmdb::{TmdbClient, TmdbError};
pub use view::{SearchStatus, SearchView};

/// The movie catalogue the search screen queries.
#[async_trait]
pub trait MovieSearchProvider: Send + Sync {
    /// Searches by free text. A blank query lists popular titles instead.
    async fn search_movies(&self, query: &str) -> Result<Vec<Movie>>;
    async fn discover_movies(&self) -> Result<Vec<Movie>>;
    async fn movie_details(&self, movie_id: MovieId) -> Result<MovieDetails>;
}

/// Collaborator that tallies which searches led to which top result.
#[async_trait]
pub trait SearchCountRecorder: Send + Sync {
    async fn record_search(&self, query: &str, top_result: &Movie) -> Result<()>;
}
