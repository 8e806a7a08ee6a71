use super::*;

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{MovieDetails, MovieId};

fn movie(id: i64, title: &str) -> Movie {
    Movie {
        id: MovieId(id),
        title: title.into(),
        poster_path: Some(format!("/{id}.jpg")),
        release_date: None,
        vote_average: 0.0,
        overview: String::new(),
    }
}

#[derive(Default)]
struct TestProvider {
    results: HashMap<String, Vec<Movie>>,
    latency: HashMap<String, Duration>,
    fail_with: Option<String>,
    panic_with: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl TestProvider {
    fn with_results(mut self, query: &str, movies: Vec<Movie>) -> Self {
        self.results.insert(query.to_string(), movies);
        self
    }

    fn with_latency(mut self, query: &str, latency: Duration) -> Self {
        self.latency.insert(query.to_string(), latency);
        self
    }

    fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn panicking(message: &str) -> Self {
        Self {
            panic_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait]
impl MovieSearchProvider for TestProvider {
    async fn search_movies(&self, query: &str) -> Result<Vec<Movie>> {
        self.calls.lock().expect("calls").push(query.to_string());
        if let Some(latency) = self.latency.get(query) {
            tokio::time::sleep(*latency).await;
        }
        if let Some(message) = &self.panic_with {
            std::panic::panic_any(message.clone());
        }
        if let Some(message) = &self.fail_with {
            return Err(anyhow!(message.clone()));
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }

    async fn discover_movies(&self) -> Result<Vec<Movie>> {
        Err(anyhow!("discover not used by search tests"))
    }

    async fn movie_details(&self, movie_id: MovieId) -> Result<MovieDetails> {
        Err(anyhow!("no details for movie {movie_id}"))
    }
}

#[derive(Default)]
struct TestRecorder {
    fail_with: Option<String>,
    records: Mutex<Vec<(String, MovieId)>>,
}

impl TestRecorder {
    fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn records(&self) -> Vec<(String, MovieId)> {
        self.records.lock().expect("records").clone()
    }
}

#[async_trait]
impl SearchCountRecorder for TestRecorder {
    async fn record_search(&self, query: &str, top_result: &Movie) -> Result<()> {
        self.records
            .lock()
            .expect("records")
            .push((query.to_string(), top_result.id));
        match &self.fail_with {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

fn controller(
    provider: &Arc<TestProvider>,
    recorder: &Arc<TestRecorder>,
) -> DebouncedSearchController {
    DebouncedSearchController::new(
        Arc::clone(provider) as Arc<dyn MovieSearchProvider>,
        Arc::clone(recorder) as Arc<dyn SearchCountRecorder>,
    )
}

async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn starts_idle_and_empty() {
    let provider = Arc::new(TestProvider::default());
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    assert_eq!(search.phase(), SearchPhase::Idle);
    assert_eq!(search.query_text(), "");
    assert_eq!(search.state(), FetchState::default());
    assert_eq!(search.delay(), DEFAULT_DEBOUNCE);
}

#[tokio::test(start_paused = true)]
async fn stable_query_issues_one_search_and_records_top_result() {
    let provider = Arc::new(
        TestProvider::default()
            .with_results("batman", vec![movie(268, "Batman"), movie(414906, "The Batman")]),
    );
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("batman");
    assert_eq!(search.phase(), SearchPhase::PendingDebounce);
    advance_ms(499).await;
    assert!(provider.calls().is_empty());

    advance_ms(101).await;
    assert_eq!(provider.calls(), vec!["batman".to_string()]);
    assert_eq!(recorder.records(), vec![("batman".to_string(), MovieId(268))]);
    assert_eq!(search.phase(), SearchPhase::Resolved);
    assert_eq!(search.data().map(|movies| movies.len()), Some(2));
    assert!(!search.loading());
    assert_eq!(search.error(), None);
}

#[tokio::test(start_paused = true)]
async fn rapid_changes_only_search_last_value() {
    let provider = Arc::new(TestProvider::default().with_results("batman2", vec![movie(2, "B2")]));
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("b");
    advance_ms(100).await;
    search.set_query("bat");
    advance_ms(200).await;
    search.set_query("batman");
    advance_ms(100).await;
    search.set_query("batman2");
    advance_ms(600).await;

    assert_eq!(provider.calls(), vec!["batman2".to_string()]);
    assert_eq!(recorder.records(), vec![("batman2".to_string(), MovieId(2))]);
}

#[tokio::test(start_paused = true)]
async fn blank_query_resets_synchronously_without_searching() {
    let provider = Arc::new(TestProvider::default().with_results("batman", vec![movie(1, "Batman")]));
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("batman");
    advance_ms(600).await;
    assert!(search.data().is_some());

    search.set_query("   ");
    assert_eq!(search.phase(), SearchPhase::Idle);
    assert_eq!(search.state(), FetchState::default());

    advance_ms(1_000).await;
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn blank_query_cancels_pending_timer() {
    let provider = Arc::new(TestProvider::default());
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("batman");
    advance_ms(300).await;
    search.set_query("");
    advance_ms(1_000).await;

    assert!(provider.calls().is_empty());
    assert_eq!(search.phase(), SearchPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn empty_results_skip_recorder() {
    let provider = Arc::new(TestProvider::default());
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("zzzzqx");
    advance_ms(600).await;

    assert_eq!(search.data(), Some(Vec::new()));
    assert_eq!(search.error(), None);
    assert!(recorder.records().is_empty());
    assert_eq!(search.phase(), SearchPhase::Resolved);
}

#[tokio::test(start_paused = true)]
async fn provider_failure_lands_in_error_without_recording() {
    let provider = Arc::new(TestProvider::failing("failed to fetch movies: 503"));
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("batman");
    advance_ms(600).await;

    let state = search.state();
    assert_eq!(
        state.error,
        Some(FetchError::new("failed to fetch movies: 503"))
    );
    assert!(!state.loading);
    assert!(recorder.records().is_empty());
    assert_eq!(search.phase(), SearchPhase::Resolved);
}

#[tokio::test(start_paused = true)]
async fn panicking_provider_reports_generic_error() {
    let provider = Arc::new(TestProvider::panicking("teapot"));
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("batman");
    advance_ms(600).await;

    let state = search.state();
    assert_eq!(state.error, Some(FetchError::generic()));
    assert_eq!(state.data, None);
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn recorder_failure_does_not_touch_search_state() {
    let provider = Arc::new(TestProvider::default().with_results("batman", vec![movie(1, "Batman")]));
    let recorder = Arc::new(TestRecorder::failing("count store unavailable"));
    let search = controller(&provider, &recorder);

    search.set_query("batman");
    advance_ms(600).await;

    assert_eq!(recorder.records().len(), 1);
    assert_eq!(search.error(), None);
    assert_eq!(search.data().map(|movies| movies.len()), Some(1));
    assert_eq!(search.phase(), SearchPhase::Resolved);
}

#[tokio::test(start_paused = true)]
async fn loading_tracks_in_flight_search() {
    let provider = Arc::new(
        TestProvider::default()
            .with_results("batman", vec![movie(1, "Batman")])
            .with_latency("batman", Duration::from_millis(300)),
    );
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("batman");
    advance_ms(600).await;
    assert!(search.loading());
    assert_eq!(search.phase(), SearchPhase::Searching);

    advance_ms(300).await;
    assert!(!search.loading());
    assert_eq!(search.phase(), SearchPhase::Resolved);
}

#[tokio::test(start_paused = true)]
async fn stale_search_result_is_discarded() {
    let provider = Arc::new(
        TestProvider::default()
            .with_results("slow", vec![movie(1, "Slow")])
            .with_latency("slow", Duration::from_millis(1_000))
            .with_results("fast", vec![movie(2, "Fast")]),
    );
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    search.set_query("slow");
    advance_ms(600).await;
    assert!(search.loading());

    search.set_query("fast");
    advance_ms(600).await;
    assert_eq!(search.data().map(|movies| movies[0].id), Some(MovieId(2)));

    advance_ms(1_000).await;
    assert_eq!(provider.calls(), vec!["slow".to_string(), "fast".to_string()]);
    assert_eq!(search.data().map(|movies| movies[0].id), Some(MovieId(2)));
    assert_eq!(recorder.records(), vec![("fast".to_string(), MovieId(2))]);
    assert!(!search.loading());
}

#[tokio::test(start_paused = true)]
async fn teardown_stops_pending_and_in_flight_work() {
    let provider = Arc::new(
        TestProvider::default()
            .with_results("batman", vec![movie(1, "Batman")])
            .with_latency("batman", Duration::from_millis(300)),
    );
    let recorder = Arc::new(TestRecorder::default());

    let search = controller(&provider, &recorder);
    search.set_query("batman");
    advance_ms(600).await;
    let mut updates = search.subscribe();
    updates.borrow_and_update();
    search.teardown();

    advance_ms(1_000).await;
    assert!(!updates.has_changed().expect("sender alive"));
    assert!(recorder.records().is_empty());

    let dropped = controller(&provider, &recorder);
    dropped.set_query("batman");
    drop(dropped);
    advance_ms(1_000).await;
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn view_reflects_controller_state() {
    let provider = Arc::new(TestProvider::default().with_results("batman", vec![movie(1, "Batman")]));
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);

    assert_eq!(search.view().status(), crate::view::SearchStatus::Prompt);
    search.set_query("batman");
    advance_ms(600).await;
    assert_eq!(
        search.view().status_line().as_deref(),
        Some("Search results for batman")
    );
}

fn shared_controller(
    provider: &Arc<TestProvider>,
    recorder: &Arc<TestRecorder>,
) -> Arc<DebouncedSearchController> {
    Arc::new(controller(provider, recorder))
}

/// Changes the query from another task at `after_ms`, i.e. in the same
/// scheduler tick as a timer armed at time zero with the default delay.
fn spawn_typist(
    search: &Arc<DebouncedSearchController>,
    after_ms: u64,
    text: &'static str,
) -> JoinHandle<()> {
    let search = Arc::clone(search);
    tokio::spawn(async move {
        advance_ms(after_ms).await;
        search.set_query(text);
    })
}

#[tokio::test(start_paused = true)]
async fn blanking_query_as_timer_fires_never_searches_blank_text() {
    let provider = Arc::new(TestProvider::default());
    let recorder = Arc::new(TestRecorder::default());
    let search = shared_controller(&provider, &recorder);

    search.set_query("batman");
    let typist = spawn_typist(&search, 500, "   ");
    advance_ms(1_500).await;
    typist.await.expect("typist");

    let calls = provider.calls();
    assert!(calls.iter().all(|query| query == "batman"), "{calls:?}");
    assert_eq!(search.phase(), SearchPhase::Idle);
    assert_eq!(search.state(), FetchState::default());
    assert!(recorder.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn changing_query_as_timer_fires_searches_new_query_once() {
    let provider = Arc::new(
        TestProvider::default()
            .with_results("batman", vec![movie(1, "Batman")])
            .with_results("batman2", vec![movie(2, "B2")]),
    );
    let recorder = Arc::new(TestRecorder::default());
    let search = shared_controller(&provider, &recorder);

    search.set_query("batman");
    let typist = spawn_typist(&search, 500, "batman2");
    advance_ms(1_500).await;
    typist.await.expect("typist");

    let calls = provider.calls();
    assert_eq!(
        calls.iter().filter(|query| *query == "batman2").count(),
        1,
        "{calls:?}"
    );
    let records = recorder.records();
    assert_eq!(
        records.iter().filter(|(query, _)| query == "batman2").count(),
        1,
        "{records:?}"
    );
    assert_eq!(search.data().map(|movies| movies[0].id), Some(MovieId(2)));
    assert_eq!(search.phase(), SearchPhase::Resolved);
}

#[tokio::test(start_paused = true)]
async fn set_query_after_teardown_is_ignored() {
    let provider = Arc::new(TestProvider::default().with_results("batman", vec![movie(1, "Batman")]));
    let recorder = Arc::new(TestRecorder::default());
    let search = controller(&provider, &recorder);
    let mut phases = search.subscribe_phase();

    search.teardown();
    search.set_query("batman");
    advance_ms(1_000).await;

    assert_eq!(search.query_text(), "");
    assert_eq!(search.phase(), SearchPhase::Idle);
    assert!(!phases.has_changed().expect("sender alive"));
    assert_eq!(search.state(), FetchState::default());
    assert!(provider.calls().is_empty());
    assert!(recorder.records().is_empty());
}
