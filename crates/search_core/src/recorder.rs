use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{domain::Movie, protocol::SearchCountRecord};
use tracing::info;

use crate::SearchCountRecorder;

/// Posts each recorded search to the search-count collaborator.
#[derive(Clone)]
pub struct HttpSearchCountRecorder {
    http: Client,
    endpoint: String,
}

impl HttpSearchCountRecorder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchCountRecorder for HttpSearchCountRecorder {
    async fn record_search(&self, query: &str, top_result: &Movie) -> Result<()> {
        let record = SearchCountRecord::new(query, top_result);
        self.http
            .post(&self.endpoint)
            .json(&record)
            .send()
            .await
            .with_context(|| format!("failed to reach search-count endpoint {}", self.endpoint))?
            .error_for_status()
            .context("search-count endpoint rejected record")?;
        Ok(())
    }
}

/// Stand-in used when no search-count endpoint is configured.
pub struct LoggingSearchCountRecorder;

#[async_trait]
impl SearchCountRecorder for LoggingSearchCountRecorder {
    async fn record_search(&self, query: &str, top_result: &Movie) -> Result<()> {
        let record = SearchCountRecord::new(query, top_result);
        info!(
            search_term = %record.search_term,
            movie_id = %record.movie_id,
            title = %record.title,
            "search recorded"
        );
        Ok(())
    }
}
