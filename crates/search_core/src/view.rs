//! What the search screen shows for a given query and fetch state.

use shared::{domain::Movie, error::FetchError};

use crate::fetch_state::FetchState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    Loading,
    Failed(String),
    /// Results are listed; the heading is present only for a non-blank query.
    Results { heading: Option<String> },
    NoResults,
    Prompt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchView {
    pub query: String,
    pub movies: Vec<Movie>,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl SearchView {
    pub fn new(query: impl Into<String>, state: &FetchState<Vec<Movie>>) -> Self {
        Self {
            query: query.into(),
            movies: state.data.clone().unwrap_or_default(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    pub fn status(&self) -> SearchStatus {
        let query = self.query.trim();
        if self.loading {
            return SearchStatus::Loading;
        }
        if let Some(error) = &self.error {
            return SearchStatus::Failed(format!("Error: {}", error.message()));
        }
        if self.movies.is_empty() {
            return if query.is_empty() {
                SearchStatus::Prompt
            } else {
                SearchStatus::NoResults
            };
        }
        let heading = (!query.is_empty()).then(|| format!("Search results for {query}"));
        SearchStatus::Results { heading }
    }

    /// Movies to list. An error hides whatever was fetched before it.
    pub fn visible_movies(&self) -> &[Movie] {
        if self.error.is_some() {
            &[]
        } else {
            &self.movies
        }
    }

    pub fn status_line(&self) -> Option<String> {
        match self.status() {
            SearchStatus::Loading => Some("Loading...".to_string()),
            SearchStatus::Failed(message) => Some(message),
            SearchStatus::Results { heading } => heading,
            SearchStatus::NoResults => Some("No movies found".to_string()),
            SearchStatus::Prompt => Some("Search for a movie".to_string()),
        }
    }
}
