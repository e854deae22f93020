//! CineChunks web front end.
//!
//! One form, one submission endpoint. Plan generation is delegated to a
//! [`PlanGenerator`]; every failure becomes a rendered error page.

pub mod render;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Form, Router,
};
use episode_planner::PlanGenerator;
use render::FormValues;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{EpisodePreference, MovieQuery, PlanError};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<dyn PlanGenerator>,
}

/// Fields of the submission form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub movie_name: String,
    #[serde(default)]
    pub episodes: Option<String>,
    #[serde(default)]
    pub episode_length: Option<String>,
}

pub fn build_router(planner: Arc<dyn PlanGenerator>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/submit", post(submit))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { planner })
}

async fn index() -> Html<String> {
    Html(render::index_page(&FormValues::default(), None))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "cinechunks-web",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn submit(State(state): State<AppState>, Form(form): Form<SubmitForm>) -> (StatusCode, Html<String>) {
    let query = MovieQuery::new(form.movie_name.as_str());
    if query.is_blank() {
        let values = FormValues {
            movie_name: "",
            episodes: form.episodes.as_deref().unwrap_or_default(),
            episode_length: form.episode_length.as_deref().unwrap_or_default(),
        };
        return (
            StatusCode::BAD_REQUEST,
            Html(render::index_page(&values, Some("Please enter a movie title."))),
        );
    }

    let preference =
        EpisodePreference::from_form(form.episodes.as_deref(), form.episode_length.as_deref());
    info!(title = %query.title, preference = %preference, "Plan requested");

    match state.planner.generate_plan(&query.title, preference).await {
        Ok(plan) => (StatusCode::OK, Html(render::plan_page(&query.title, &plan))),
        Err(e) => {
            let (status, message) = failure_response(&e);
            match e {
                PlanError::MissingApiKey => warn!(title = %query.title, error = %e, "Plan generation unavailable"),
                _ => error!(title = %query.title, error = %e, "Plan generation failed"),
            }
            (status, Html(render::error_page(&query.title, message)))
        }
    }
}

/// Status code and user-facing text for a planning failure
fn failure_response(err: &PlanError) -> (StatusCode, &'static str) {
    match err {
        PlanError::MissingApiKey => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Episode planning is not available right now: the service is not configured.",
        ),
        _ => (
            StatusCode::BAD_GATEWAY,
            "Sorry, we could not generate an episode plan for this movie. Please try again later.",
        ),
    }
}
