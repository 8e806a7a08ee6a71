use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Movie, MovieDetails, MovieId},
    protocol::{ApiErrorBody, DiscoverMoviesQuery, MovieListResponse, SearchMoviesQuery},
};
use thiserror::Error;
use tracing::debug;

use crate::MovieSearchProvider;

pub const DEFAULT_API_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_LANGUAGE: &str = "en-US";
const DISCOVER_SORT: &str = "popularity.desc";

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("failed to fetch {resource}: {status}")]
    Status {
        resource: &'static str,
        status: StatusCode,
    },
    #[error("failed to fetch {resource}: {status} ({message})")]
    Rejected {
        resource: &'static str,
        status: StatusCode,
        message: String,
    },
}

impl TmdbError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } | Self::Rejected { status, .. } => *status,
        }
    }
}

/// HTTP client for a TMDB-compatible catalogue.
#[derive(Clone)]
pub struct TmdbClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TmdbClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_http_client(Client::new(), base_url, api_key)
    }

    pub fn with_http_client(
        http: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T, Q>(&self, path: &str, query: &Q, resource: &'static str) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(query);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        debug!(%url, resource, "requesting movie catalogue");
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach movie catalogue at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(api_error) => TmdbError::Rejected {
                    resource,
                    status,
                    message: api_error.status_message,
                },
                Err(_) => TmdbError::Status { resource, status },
            };
            return Err(error.into());
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode {resource} response"))
    }
}

#[async_trait]
impl MovieSearchProvider for TmdbClient {
    async fn search_movies(&self, query: &str) -> Result<Vec<Movie>> {
        let query = query.trim();
        if query.is_empty() {
            return self.discover_movies().await;
        }

        let body: MovieListResponse = self
            .get_json(
                "/search/movie",
                &SearchMoviesQuery {
                    query,
                    include_adult: false,
                    language: DEFAULT_LANGUAGE,
                    page: 1,
                },
                "movies",
            )
            .await?;
        Ok(body.results)
    }

    async fn discover_movies(&self) -> Result<Vec<Movie>> {
        let body: MovieListResponse = self
            .get_json(
                "/discover/movie",
                &DiscoverMoviesQuery {
                    sort_by: DISCOVER_SORT,
                    include_adult: false,
                    language: DEFAULT_LANGUAGE,
                    page: 1,
                },
                "movies",
            )
            .await?;
        Ok(body.results)
    }

    async fn movie_details(&self, movie_id: MovieId) -> Result<MovieDetails> {
        self.get_json(
            &format!("/movie/{movie_id}"),
            &[("language", DEFAULT_LANGUAGE)],
            "movie details",
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/tmdb_tests.rs"]
mod tests;
