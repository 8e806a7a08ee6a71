use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use search_core::{
    DebouncedSearchController, FetchOutcome, FetchStateController, HttpSearchCountRecorder,
    LoggingSearchCountRecorder, MovieSearchProvider, SearchCountRecorder, SearchPhase, TmdbClient,
};
use shared::domain::MovieId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "moviesearch", about = "Debounced movie search against a TMDB-compatible catalogue")]
struct Cli {
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    /// Endpoint that receives search-count records; logged locally when unset.
    #[arg(long)]
    recorder_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Each stdin line replaces the query text, as if typed into the search box.
    Search {
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
    /// Lists popular titles.
    Popular,
    /// Shows details for one movie.
    Details { movie_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(v) = cli.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = cli.api_key {
        settings.api_key = Some(v);
    }
    if let Some(v) = cli.recorder_url {
        settings.recorder_url = Some(v);
    }
    if let Command::Search {
        debounce_ms: Some(v),
    } = &cli.command
    {
        settings.debounce_ms = *v;
    }
    settings.validate()?;

    let provider: Arc<dyn MovieSearchProvider> = Arc::new(TmdbClient::new(
        settings.api_base_url.clone(),
        settings.api_key.clone(),
    ));
    info!(api_base_url = %settings.api_base_url, "movie catalogue configured");

    match cli.command {
        Command::Search { .. } => {
            let recorder: Arc<dyn SearchCountRecorder> = match &settings.recorder_url {
                Some(url) => {
                    info!(%url, "recording searches over http");
                    Arc::new(HttpSearchCountRecorder::new(url.clone()))
                }
                None => Arc::new(LoggingSearchCountRecorder),
            };
            run_search(provider, recorder, settings.debounce()).await
        }
        Command::Popular => run_popular(provider).await,
        Command::Details { movie_id } => run_details(provider, MovieId(movie_id)).await,
    }
}

async fn run_search(
    provider: Arc<dyn MovieSearchProvider>,
    recorder: Arc<dyn SearchCountRecorder>,
    debounce: Duration,
) -> Result<()> {
    let search = DebouncedSearchController::with_delay(provider, recorder, debounce);
    let mut updates = search.subscribe();
    let mut phases = search.subscribe_phase();
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut stdin_open = true;

    println!("{}", render::search_view(&search.view()));

    loop {
        tokio::select! {
            line = lines.next(), if stdin_open => match line {
                Some(line) => search.set_query(line.context("failed to read query from stdin")?),
                None => stdin_open = false,
            },
            changed = updates.changed() => {
                changed.context("search state closed")?;
                updates.borrow_and_update();
                println!("{}", render::search_view(&search.view()));
            }
            changed = phases.changed(), if !stdin_open => {
                changed.context("search phase closed")?;
            }
        }

        let settled = matches!(search.phase(), SearchPhase::Idle | SearchPhase::Resolved);
        if !stdin_open && settled && !updates.has_changed().unwrap_or(false) {
            break;
        }
    }

    search.teardown();
    Ok(())
}

async fn run_popular(provider: Arc<dyn MovieSearchProvider>) -> Result<()> {
    let popular = FetchStateController::new(
        move || {
            let provider = Arc::clone(&provider);
            async move { provider.discover_movies().await }
        },
        true,
    );

    let state = popular
        .subscribe()
        .wait_for(|state| state.is_settled())
        .await
        .context("popular movies fetch closed")?
        .clone();

    if let Some(error) = state.error {
        println!("Error: {}", error.message());
        return Err(error.into());
    }
    println!("{}", render::movie_list(&state.data.unwrap_or_default()));
    Ok(())
}

async fn run_details(provider: Arc<dyn MovieSearchProvider>, movie_id: MovieId) -> Result<()> {
    let details = FetchStateController::new(
        move || {
            let provider = Arc::clone(&provider);
            async move { provider.movie_details(movie_id).await }
        },
        false,
    );

    match details.execute().await {
        FetchOutcome::Completed(details) => {
            println!("{}", render::details(&details));
            Ok(())
        }
        FetchOutcome::Failed(error) => {
            println!("Error: {}", error.message());
            Err(error.into())
        }
        FetchOutcome::Superseded => bail!("movie details request for {movie_id} was superseded"),
    }
}
