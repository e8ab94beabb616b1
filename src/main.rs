//! Study Buddy - turns a photographed document into a summary, quiz and flashcards.

mod config;
mod gemini;
mod generation;
mod schema;
mod session;
mod session_store;
mod views;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use config::AppConfig;
use gemini::GeminiClient;
use generation::{GeminiStudyGenerator, StudyGenerator};
use schema::{StudyMode, UploadedDocument, SUPPORTED_MEDIA_TYPES};
use session::{process_document, SessionError, SessionHandle, SessionSnapshot, TransitionError};
use session_store::SessionStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use views::flashcards::{Direction, FLIP_SETTLE_DELAY};
use views::View;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    sessions: SessionStore,
    generator: Arc<dyn StudyGenerator>,
}

type ApiError = (StatusCode, String);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "study_buddy=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    let client = GeminiClient::new(&config.gemini);
    info!("Gemini client initialized (model: {})", client.model());

    let state = AppState {
        sessions: SessionStore::new(),
        generator: Arc::new(GeminiStudyGenerator::new(client, config.study.clone())),
    };

    state.sessions.spawn_sweeper(config.session_idle_timeout);
    info!(
        "Idle sessions expire after {}s",
        config.session_idle_timeout.as_secs()
    );

    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/upload", post(upload_document))
        .route("/sessions/:id/reset", post(reset_session))
        .route("/sessions/:id/mode", put(set_mode))
        .route("/sessions/:id/view", get(get_view))
        .route("/sessions/:id/quiz/answers", post(answer_question))
        .route("/sessions/:id/quiz/submit", post(submit_quiz))
        .route("/sessions/:id/quiz/reset", post(reset_quiz))
        .route("/sessions/:id/flashcards/flip", post(flip_flashcard))
        .route("/sessions/:id/flashcards/next", post(next_flashcard))
        .route("/sessions/:id/flashcards/previous", post(previous_flashcard))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Session lifecycle handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.sessions.create();
    let snapshot = session.read().unwrap().snapshot();
    info!("Created session {} ({} active)", snapshot.id, state.sessions.len());
    (StatusCode::CREATED, Json(snapshot))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = lookup(&state, &id)?;
    let snapshot = session.read().unwrap().snapshot();
    Ok(Json(snapshot))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.sessions.remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Accept a document image and start processing it in the background.
async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let session = lookup(&state, &id)?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("document").to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(|e| {
                (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
            })?;
            upload = Some((filename, content_type, data.to_vec()));
            break;
        }
    }

    let (filename, content_type, data) = upload
        .filter(|(_, _, data)| !data.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "No file uploaded".to_string()))?;

    let document = UploadedDocument::from_upload(filename, content_type.as_deref(), data)
        .ok_or_else(|| {
            (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("Unsupported file type. Supported: {:?}", SUPPORTED_MEDIA_TYPES),
            )
        })?;

    let info = document.info();
    info!(
        "Session {} received {} ({}, {} bytes, sha256 {})",
        id, info.filename, info.media_type, info.size_bytes, info.sha256
    );

    let snapshot = {
        let mut guard = session.write().unwrap();
        guard.begin_upload(info).map_err(transition_error)?;
        guard.snapshot()
    };

    tokio::spawn(process_document(session, state.generator.clone(), document));

    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// Full reset back to the upload screen ("Try Again" / "New file").
async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = lookup(&state, &id)?;
    let mut guard = session.write().unwrap();
    guard.reset().map_err(transition_error)?;
    info!("Session {} reset", id);
    Ok(Json(guard.snapshot()))
}

// ============================================================================
// View handlers
// ============================================================================

#[derive(serde::Deserialize)]
struct ModeBody {
    mode: StudyMode,
}

async fn set_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ModeBody>,
) -> Result<Json<View>, ApiError> {
    let session = lookup(&state, &id)?;
    let mut guard = session.write().unwrap();
    guard.set_mode(body.mode).map_err(transition_error)?;
    Ok(Json(guard.render()))
}

async fn get_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<View>, ApiError> {
    let session = lookup(&state, &id)?;
    let view = session.read().unwrap().render();
    Ok(Json(view))
}

#[derive(serde::Deserialize)]
struct AnswerBody {
    question: usize,
    option: String,
}

async fn answer_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnswerBody>,
) -> Result<Json<View>, ApiError> {
    let session = lookup(&state, &id)?;
    let mut guard = session.write().unwrap();
    guard
        .quiz_select(body.question, &body.option)
        .map_err(session_error)?;
    Ok(Json(guard.render()))
}

async fn submit_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<View>, ApiError> {
    let session = lookup(&state, &id)?;
    let mut guard = session.write().unwrap();
    let score = guard.quiz_submit().map_err(session_error)?;
    info!("Session {} quiz submitted, score {}", id, score);
    Ok(Json(guard.render()))
}

async fn reset_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<View>, ApiError> {
    let session = lookup(&state, &id)?;
    let mut guard = session.write().unwrap();
    guard.quiz_reset().map_err(session_error)?;
    Ok(Json(guard.render()))
}

async fn flip_flashcard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<View>, ApiError> {
    let session = lookup(&state, &id)?;
    let mut guard = session.write().unwrap();
    guard.flashcard_flip().map_err(session_error)?;
    Ok(Json(guard.render()))
}

async fn next_flashcard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<View>, ApiError> {
    navigate_flashcards(&state, &id, Direction::Next).await
}

async fn previous_flashcard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<View>, ApiError> {
    navigate_flashcards(&state, &id, Direction::Previous).await
}

/// Un-flip, let the flip animation settle, then move.
async fn navigate_flashcards(
    state: &AppState,
    id: &str,
    direction: Direction,
) -> Result<Json<View>, ApiError> {
    let session = lookup(state, id)?;
    {
        let mut guard = session.write().unwrap();
        guard.flashcard_unflip().map_err(session_error)?;
    }

    tokio::time::sleep(FLIP_SETTLE_DELAY).await;

    let mut guard = session.write().unwrap();
    guard.flashcard_advance(direction).map_err(session_error)?;
    Ok(Json(guard.render()))
}

// ============================================================================
// Helper functions
// ============================================================================

fn lookup(state: &AppState, id: &str) -> Result<SessionHandle, ApiError> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown session: {}", id)))
}

fn transition_error(e: TransitionError) -> ApiError {
    (StatusCode::CONFLICT, e.to_string())
}

fn session_error(e: SessionError) -> ApiError {
    match e {
        SessionError::Transition(e) => transition_error(e),
        SessionError::Interaction(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}
