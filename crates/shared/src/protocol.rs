use serde::{Deserialize, Serialize};

use crate::domain::{poster_url, Movie, MovieId};

/// Paged list envelope used by the catalogue's search and discover endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieListResponse {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<Movie>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMoviesQuery<'a> {
    pub query: &'a str,
    pub include_adult: bool,
    pub language: &'a str,
    pub page: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverMoviesQuery<'a> {
    pub sort_by: &'a str,
    pub include_adult: bool,
    pub language: &'a str,
    pub page: u32,
}

/// Error body the catalogue returns alongside non-success statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status_code: i64,
    pub status_message: String,
}

/// Payload sent to the search-count collaborator for every successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCountRecord {
    pub search_term: String,
    pub movie_id: MovieId,
    pub title: String,
    pub poster_url: String,
}

impl SearchCountRecord {
    pub fn new(search_term: &str, top_result: &Movie) -> Self {
        Self {
            search_term: search_term.trim().to_string(),
            movie_id: top_result.id,
            title: top_result.title.clone(),
            poster_url: poster_url(top_result.poster_path.as_deref()),
        }
    }
}
