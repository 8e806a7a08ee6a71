//! Plain-text rendering for the terminal.

use search_core::SearchView;
use shared::domain::{Movie, MovieDetails};

pub fn movie_line(movie: &Movie) -> String {
    let year = movie.release_year().unwrap_or("----");
    format!(
        "{:>8}  {} ({year})  {:.1}",
        movie.id, movie.title, movie.vote_average
    )
}

pub fn movie_list(movies: &[Movie]) -> String {
    movies.iter().map(movie_line).collect::<Vec<_>>().join("\n")
}

pub fn search_view(view: &SearchView) -> String {
    let mut out = Vec::new();
    if let Some(status) = view.status_line() {
        out.push(status);
    }
    let movies = view.visible_movies();
    if !movies.is_empty() && !view.loading {
        out.push(movie_list(movies));
    }
    out.join("\n")
}

pub fn details(details: &MovieDetails) -> String {
    let mut out = vec![format!("{} [{}]", details.title, details.id)];
    if let Some(tagline) = details.tagline.as_deref().filter(|t| !t.is_empty()) {
        out.push(tagline.to_string());
    }
    let mut facts = Vec::new();
    if let Some(date) = details.release_date.as_deref().filter(|d| !d.is_empty()) {
        facts.push(date.to_string());
    }
    if let Some(runtime) = details.runtime {
        facts.push(format!("{runtime}m"));
    }
    facts.push(format!("{:.1}/10 ({} votes)", details.vote_average, details.vote_count));
    out.push(facts.join(" | "));
    if !details.genres.is_empty() {
        let genres = details
            .genres
            .iter()
            .map(|genre| genre.name.as_str())
            .collect::<Vec<_>>();
        out.push(genres.join(", "));
    }
    if !details.overview.is_empty() {
        out.push(String::new());
        out.push(details.overview.clone());
    }
    out.join("\n")
}
