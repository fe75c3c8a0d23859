//! HTTP API and chat page for the oral examiner.
//!
//! # Endpoints
//!
//! - `GET /` - Chat page
//! - `GET /api/health` - Liveness and loaded data sizes
//! - `POST /api/sessions` - Start a new session
//! - `GET /api/sessions/:id` - Get a session view
//! - `POST /api/sessions/:id/begin` - Submit email and full name
//! - `POST /api/sessions/:id/answer` - Submit an answer
//! - `POST /api/sessions/:id/finalize` - Grade and persist the exam
//!
//! Each session lives behind its own mutex. The session map lock is only held
//! for lookups, so a slow oracle call blocks nothing but its own session.
//! A request for a session that is already busy is rejected with 409.
//!
//! The map only holds live sessions. A session is released once it is
//! finalized, sessions idle for longer than [`SessionLimits::idle_timeout`]
//! are dropped whenever a new one is created, and creation is refused with
//! 503 while [`SessionLimits::max_pending`] sessions still await an identity.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use examiner_orchestrator::{create_router, AppState, Examiner};
//!
//! # async fn example(examiner: Examiner) {
//! let router = create_router(AppState::new(Arc::new(examiner)));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use examiner_report::ScoreSource;

use crate::config::Config;
use crate::error::ExamError;
use crate::examiner::{AnswerStep, Examiner};
use crate::questions::{QuestionPicker, RandomPicker};
use crate::session::{ExamSession, SessionStatus, SessionView};

const INDEX_HTML: &str = include_str!("../static/index.html");

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/sessions/:id/begin`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginRequest {
    /// Email as typed by the student.
    pub email: String,
    /// Full name as typed by the student.
    pub full_name: String,
}

/// Request body for `POST /api/sessions/:id/answer`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    /// The student's answer.
    pub text: String,
}

/// Response body for the answer endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    /// Examiner feedback with control tags removed.
    pub feedback: String,
    /// What happens next.
    pub step: AnswerStep,
    /// The session after the answer was recorded.
    pub session: SessionView,
}

/// Response body for the finalize endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    /// Final score in `0..=10`.
    pub score: f64,
    /// Whether the score was parsed or the configured fallback.
    pub score_source: ScoreSource,
    /// The examiner's grading reply.
    pub feedback: String,
    /// File name of the written result, without the directory.
    pub result_file: String,
    /// The completed session. It is no longer held by the server.
    pub session: SessionView,
}

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Students on the roster.
    pub roster_size: usize,
    /// Questions in the bank.
    pub question_bank_size: usize,
    /// Sessions currently held in memory.
    pub active_sessions: usize,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
    /// Whether repeating the same request may succeed.
    pub retryable: bool,
}

// ============================================================================
// Application State
// ============================================================================

/// Bounds on the sessions held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions awaiting an identity that may exist at once.
    pub max_pending: usize,
    /// Sessions without a request for this long are dropped.
    pub idle_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionLimits {
    /// Extracts the session limits from a loaded configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            max_pending: config.max_pending_sessions,
            idle_timeout: Duration::from_secs(config.session_idle_minutes.saturating_mul(60)),
        }
    }
}

/// A session in the map, with the time of its last request.
struct SessionEntry {
    session: Mutex<ExamSession>,
    last_seen: std::sync::Mutex<Instant>,
}

impl SessionEntry {
    fn new(session: ExamSession) -> Self {
        Self {
            session: Mutex::new(session),
            last_seen: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Status of the session, or `None` while a request holds it.
    fn status(&self) -> Option<SessionStatus> {
        self.session.try_lock().ok().map(|session| session.status())
    }
}

type SessionMap = HashMap<Uuid, Arc<SessionEntry>>;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The session state machine.
    pub examiner: Arc<Examiner>,
    sessions: Arc<RwLock<SessionMap>>,
    picker: Arc<std::sync::Mutex<Box<dyn QuestionPicker>>>,
    limits: SessionLimits,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("examiner", &self.examiner)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates a new `AppState` drawing questions at random.
    #[must_use]
    pub fn new(examiner: Arc<Examiner>) -> Self {
        Self::with_picker(examiner, Box::new(RandomPicker::from_entropy()))
    }

    /// Creates a new `AppState` with a specific question picker.
    #[must_use]
    pub fn with_picker(examiner: Arc<Examiner>, picker: Box<dyn QuestionPicker>) -> Self {
        Self {
            examiner,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            picker: Arc::new(std::sync::Mutex::new(picker)),
            limits: SessionLimits::default(),
        }
    }

    /// Replaces the default session limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    async fn session(&self, id: Uuid) -> Result<Arc<SessionEntry>, ApiError> {
        let entry = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::Exam(ExamError::session_not_found(id)))?;
        entry.touch();
        Ok(entry)
    }

    /// Drops idle sessions and checks there is room for one more pending one.
    ///
    /// Sessions busy with a request are never dropped.
    fn make_room(&self, sessions: &mut SessionMap) -> Result<(), ApiError> {
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.status().is_none() || entry.idle_for() < self.limits.idle_timeout
        });
        let dropped = before - sessions.len();
        if dropped > 0 {
            info!(dropped, remaining = sessions.len(), "Dropped idle sessions");
        }

        let pending = sessions
            .values()
            .filter(|entry| entry.status() == Some(SessionStatus::AwaitingIdentity))
            .count();
        if pending >= self.limits.max_pending {
            return Err(ApiError::TooManyPending(self.limits.max_pending));
        }
        Ok(())
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// A session operation failed.
    Exam(ExamError),
    /// Another request is still working on this session.
    Busy(Uuid),
    /// Too many sessions are waiting for an identity.
    TooManyPending(usize),
}

impl From<ExamError> for ApiError {
    fn from(err: ExamError) -> Self {
        Self::Exam(err)
    }
}

const fn status_for(err: &ExamError) -> StatusCode {
    match err {
        ExamError::UnauthorizedStudent { .. } => StatusCode::FORBIDDEN,
        ExamError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ExamError::InvalidState { .. } => StatusCode::CONFLICT,
        ExamError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        ExamError::LlmApiError { .. } | ExamError::ScoreParse { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Exam(err) => {
                let status = status_for(&err);
                if err.is_fatal() {
                    error!(error = %err, "Request failed; the examiner cannot serve exams");
                } else if status.is_server_error() {
                    warn!(error = %err, "Request failed");
                }
                (
                    status,
                    ErrorResponse {
                        error: err.to_string(),
                        retryable: err.is_transient(),
                    },
                )
            }
            Self::Busy(id) => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: format!("session {id} is busy with another request"),
                    retryable: true,
                },
            ),
            Self::TooManyPending(limit) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: format!(
                        "{limit} sessions are already waiting for a student; try again later"
                    ),
                    retryable: true,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with the chat page and all API endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/:id", get(handle_get_session))
        .route("/sessions/:id/begin", post(handle_begin))
        .route("/sessions/:id/answer", post(handle_answer))
        .route("/sessions/:id/finalize", post(handle_finalize));

    Router::new()
        .route("/", get(handle_index))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        roster_size: state.examiner.roster().len(),
        question_bank_size: state.examiner.bank().len(),
        active_sessions: state.sessions.read().await.len(),
    })
}

/// Handler for `POST /api/sessions`.
async fn handle_create_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = ExamSession::new();
    let view = SessionView::from(&session);

    {
        let mut sessions = state.sessions.write().await;
        state.make_room(&mut sessions)?;
        sessions.insert(session.id(), Arc::new(SessionEntry::new(session)));
    }

    info!(session_id = %view.id, "Session created");
    Ok((StatusCode::CREATED, Json(view)))
}

async fn handle_get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = state.session(id).await?;
    let session = entry.session.try_lock().map_err(|_| ApiError::Busy(id))?;
    Ok(Json(SessionView::from(&*session)))
}

/// Handler for `POST /api/sessions/:id/begin`.
async fn handle_begin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<BeginRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = state.session(id).await?;
    let mut session = entry.session.try_lock().map_err(|_| ApiError::Busy(id))?;

    {
        let mut picker = state.picker.lock().unwrap_or_else(PoisonError::into_inner);
        state.examiner.begin(
            &mut session,
            &request.email,
            &request.full_name,
            &mut **picker,
        )?;
    }

    Ok(Json(SessionView::from(&*session)))
}

/// Handler for `POST /api/sessions/:id/answer`.
async fn handle_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let entry = state.session(id).await?;
    let mut session = entry.session.try_lock().map_err(|_| ApiError::Busy(id))?;

    let outcome = state
        .examiner
        .submit_answer(&mut session, &request.text)
        .await?;

    Ok(Json(AnswerResponse {
        feedback: outcome.feedback,
        step: outcome.step,
        session: SessionView::from(&*session),
    }))
}

/// Handler for `POST /api/sessions/:id/finalize`.
async fn handle_finalize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let entry = state.session(id).await?;
    let mut session = entry.session.try_lock().map_err(|_| ApiError::Busy(id))?;

    let outcome = state.examiner.finalize(&mut session).await?;

    let response = FinalizeResponse {
        score: outcome.score,
        score_source: outcome.score_source,
        feedback: outcome.feedback,
        result_file: outcome
            .result_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        session: SessionView::from(&*session),
    };
    drop(session);

    // The result file is the record from here on.
    state.sessions.write().await.remove(&id);
    info!(session_id = %id, "Completed session released");

    Ok(Json(response))
}
