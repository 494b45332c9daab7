use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use advisor_core::allocation::AllocationSelector;
use advisor_core::domain::portfolio::PortfolioView;
use advisor_core::error::AdvisorError;
use advisor_core::ingest::YahooChartProvider;
use advisor_core::questionnaire::{questions, AnswerSet, Question};
use advisor_core::scoring::ScoreTable;

mod session;

use session::SessionStore;

const INCOMPLETE_MESSAGE: &str = "Please complete the questionnaire first.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = advisor_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let scores = ScoreTable::default();
    if let Err(e) = scores.validate(questions()) {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "score table does not match questionnaire");
        return Err(e);
    }

    let provider = YahooChartProvider::from_settings(&settings)?;
    let state = AppState {
        sessions: SessionStore::with_limits(
            Duration::from_secs(settings.session_ttl_secs),
            settings.max_sessions,
        ),
        selector: AllocationSelector::new(Arc::new(provider)),
        scores,
    };

    let app = app(state).layer(TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(home))
        .route("/questionnaire", get(get_questionnaire))
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id/answers", put(put_answers))
        .route("/sessions/:session_id/portfolio", get(get_portfolio))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    sessions: SessionStore,
    selector: AllocationSelector,
    scores: ScoreTable,
}

#[derive(Debug, Serialize)]
struct HomeView {
    title: &'static str,
    body: [&'static str; 2],
    links: [(&'static str, &'static str); 3],
}

async fn home() -> Json<HomeView> {
    Json(HomeView {
        title: "Home Page",
        body: [
            "Welcome to the portfolio robot advisor!",
            "Use the navigation links to move between sections.",
        ],
        links: [
            ("Home", "/"),
            ("Questionnaire", "/questionnaire"),
            ("Portfolio", "/sessions/{session_id}/portfolio"),
        ],
    })
}

#[derive(Debug, Serialize)]
struct QuestionnaireView {
    title: &'static str,
    questions: &'static [Question],
}

async fn get_questionnaire() -> Json<QuestionnaireView> {
    Json(QuestionnaireView {
        title: "Risk Assessment Questionnaire",
        questions: questions(),
    })
}

#[derive(Debug, Serialize)]
struct SessionCreated {
    session_id: Uuid,
}

async fn create_session() -> (StatusCode, Json<SessionCreated>) {
    let session_id = SessionStore::new_session_id();
    tracing::debug!(%session_id, "session created");
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

#[derive(Debug, Deserialize)]
struct AnswersRequest {
    answers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AnswersStored {
    session_id: Uuid,
    answered: usize,
    replaced: bool,
}

async fn put_answers(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<AnswersRequest>,
) -> Result<Json<AnswersStored>, ApiError> {
    let answers = AnswerSet::collect(body.answers)?;
    let answered = answers.len();
    let replaced = state.sessions.put_answers(session_id, answers).await;

    tracing::info!(%session_id, replaced, "questionnaire answers stored");

    Ok(Json(AnswersStored {
        session_id,
        answered,
        replaced,
    }))
}

async fn get_portfolio(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PortfolioView>, ApiError> {
    let answers = state.sessions.answers(session_id).await;
    let recommendation = state
        .selector
        .recommend(&state.scores, answers.as_ref())
        .await?;

    Ok(Json(PortfolioView::new(
        recommendation.score,
        &recommendation.allocation,
    )))
}

#[derive(Debug)]
struct ApiError(AdvisorError);

impl From<AdvisorError> for ApiError {
    fn from(value: AdvisorError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AdvisorError::QuestionnaireIncomplete => StatusCode::CONFLICT,
            AdvisorError::AnswerCount { .. }
            | AdvisorError::InvalidAnswer { .. }
            | AdvisorError::InvalidScore(_) => StatusCode::BAD_REQUEST,
            AdvisorError::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AdvisorError::MarketData(_) => StatusCode::BAD_GATEWAY,
            AdvisorError::Optimization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self.0 {
            AdvisorError::QuestionnaireIncomplete => INCOMPLETE_MESSAGE.to_string(),
            other => other.to_string(),
        };

        if self.0.is_client_error() {
            tracing::warn!(%status, error = %self.0, "request rejected");
        } else {
            tracing::error!(%status, error = %self.0, "request failed");
            sentry_anyhow::capture_anyhow(&anyhow::Error::new(self.0));
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &advisor_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
