//! Inline HTML pages.

use shared::{EpisodePlan, MovieSummary};
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem}\
label{display:block;margin:.5rem 0}\
.error{color:#a00}\
.episode{border-top:1px solid #ddd;padding:.5rem 0}\
.time{color:#555;font-family:monospace}";

/// Escape text for use in HTML content and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n<h1>CineChunks</h1>\n{}\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    )
}

/// Values to pre-fill the form with
#[derive(Debug, Clone, Default)]
pub struct FormValues<'a> {
    pub movie_name: &'a str,
    pub episodes: &'a str,
    pub episode_length: &'a str,
}

fn form(values: &FormValues<'_>, error: Option<&str>) -> String {
    let mut html = String::new();
    if let Some(error) = error {
        let _ = writeln!(html, "<p class=\"error\">{}</p>", escape_html(error));
    }
    let _ = write!(
        html,
        "<form method=\"post\" action=\"/submit\">\n\
         <label>Movie title <input name=\"movie_name\" value=\"{}\" required></label>\n\
         <label>Number of episodes <input name=\"episodes\" type=\"number\" min=\"1\" value=\"{}\"></label>\n\
         <label>or episode length (minutes) <input name=\"episode_length\" type=\"number\" min=\"1\" value=\"{}\"></label>\n\
         <button type=\"submit\">Split into episodes</button>\n</form>",
        escape_html(values.movie_name),
        escape_html(values.episodes),
        escape_html(values.episode_length)
    );
    html
}

/// The landing page, optionally with a validation message
pub fn index_page(values: &FormValues<'_>, error: Option<&str>) -> String {
    page("CineChunks", &form(values, error))
}

fn movie_section(requested: &str, movie: Option<&MovieSummary>) -> String {
    let mut html = String::new();
    match movie {
        Some(movie) => {
            let _ = write!(html, "<h2>{}</h2>", escape_html(&movie.title));
            if let Some(runtime) = movie.runtime {
                let _ = write!(html, "<p class=\"time\">Runtime {}</p>", runtime);
            }
            if let Some(synopsis) = &movie.original_synopsis {
                let _ = write!(html, "<p>{}</p>", escape_html(synopsis));
            }
        }
        None => {
            let _ = write!(html, "<h2>{}</h2>", escape_html(requested));
        }
    }
    html
}

/// A generated plan as an ordered episode list
pub fn plan_page(requested: &str, plan: &EpisodePlan) -> String {
    let mut body = movie_section(requested, plan.movie.as_ref());

    if plan.episodes.is_empty() {
        body.push_str("<p>The model did not return any episodes for this title.</p>");
    } else {
        body.push_str("<ol class=\"episodes\">");
        for episode in &plan.episodes {
            let _ = write!(
                body,
                "<li class=\"episode\" value=\"{}\"><strong>{}</strong> \
                 <span class=\"time\">{} &ndash; {}</span><p>{}</p></li>",
                episode.episode_number,
                escape_html(&episode.title),
                episode.start_time,
                episode.end_time,
                escape_html(&episode.synopsis)
            );
        }
        body.push_str("</ol>");
    }

    body.push_str("<p><a href=\"/\">Split another movie</a></p>");
    page(&format!("{} - CineChunks", requested), &body)
}

/// Generic failure page; `message` is shown to the user as-is (escaped)
pub fn error_page(requested: &str, message: &str) -> String {
    let body = format!(
        "<p class=\"error\">{}</p>\n{}",
        escape_html(message),
        form(
            &FormValues {
                movie_name: requested,
                ..Default::default()
            },
            None
        )
    );
    page("Something went wrong - CineChunks", &body)
}
