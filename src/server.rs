//! JSON HTTP API.
//!
//! Exposes the whole reader workflow (sign-in, upload, analysis, insights,
//! assistant chat, export, profile) over HTTP so any front end can drive it.
//!
//! # Sessions
//!
//! `POST /auth/login` and `POST /auth/guest` return a `session_id`. Every
//! other endpoint except `/health` and `/auth/register` expects it in the
//! `x-session-id` header. Sessions live in memory only and end with
//! `POST /auth/logout` or a server restart.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET` | `/health` | Liveness and version |
//! | `POST` | `/auth/register` | Create an account |
//! | `POST` | `/auth/login` | Sign in, start a session |
//! | `POST` | `/auth/guest` | Start a guest session |
//! | `POST` | `/auth/logout` | End the session |
//! | `GET` / `PUT` | `/session/settings` | Segment size, depth, purpose, API key |
//! | `POST` | `/document?name=` | Upload a PDF (raw body) |
//! | `DELETE` | `/document` | Close the active document |
//! | `POST` | `/analysis/summary` | Generate the summary |
//! | `POST` | `/analysis/questions` | Generate discussion questions |
//! | `POST` | `/analysis/faqs` | Generate FAQs |
//! | `GET` | `/insights` | Readability, sentiment arc, keywords |
//! | `GET` / `POST` | `/chat` | Transcript / ask a question |
//! | `GET` | `/export/{format}` | `txt`, `json`, or `html` report |
//! | `GET` | `/profile` | Preferences and recent history |
//! | `PUT` | `/profile/preferences` | Update preferences |
//! | `DELETE` | `/profile/history` | Clear interaction history |
//!
//! Errors use the body `{ "error": { "code": "...", "message": "..." } }`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::analytics::Insights;
use crate::auth::{self, AuthError, AuthStore, INVALID_LOGIN_MESSAGE};
use crate::config::Config;
use crate::context_store::Preferences;
use crate::db;
use crate::embedding::EmbeddingProvider;
use crate::export::{ExportError, ExportFormat};
use crate::migrate;
use crate::models::{ChatTurn, Faq, SessionUser};
use crate::session::{
    DocumentInfo, Profile, Services, Session, SessionError, SettingsUpdate, SettingsView,
};

/// Header carrying the session identifier.
pub const SESSION_HEADER: &str = "x-session-id";

type SessionMap = HashMap<String, Arc<Mutex<Session>>>;

/// Shared state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    services: Services,
    auth: AuthStore,
    sessions: Arc<RwLock<SessionMap>>,
}

impl AppState {
    /// Connect the user database (creating the schema if needed) and build
    /// the configured embedding provider.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let services = Services::new(config)?;
        Self::from_services(services).await
    }

    /// Like [`AppState::new`] with an explicit embedding provider.
    pub async fn with_embedder(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> anyhow::Result<Self> {
        Self::from_services(Services::with_embedder(config, embedder)).await
    }

    async fn from_services(services: Services) -> anyhow::Result<Self> {
        let pool = db::connect(&services.config).await?;
        migrate::apply(&pool).await?;
        Ok(Self {
            services,
            auth: AuthStore::new(pool),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn open_session(&self, user: SessionUser) -> String {
        let id = Uuid::new_v4().to_string();
        let session = Session::new(user, self.services.clone());
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    async fn session(&self, headers: &HeaderMap) -> Result<Arc<Mutex<Session>>, AppError> {
        let id = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing x-session-id header. Log in or continue as guest."))?;
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| unauthorized("Unknown or expired session."))
    }
}

pub fn router(state: AppState) -> Router {
    let max_upload = state.services.config.server.max_upload_mb * 1024 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .route("/auth/guest", post(handle_guest))
        .route("/auth/logout", post(handle_logout))
        .route("/session/settings", get(handle_get_settings).put(handle_put_settings))
        .route("/document", post(handle_upload).delete(handle_close_document))
        .route("/analysis/summary", post(handle_summary))
        .route("/analysis/questions", post(handle_questions))
        .route("/analysis/faqs", post(handle_faqs))
        .route("/insights", get(handle_insights))
        .route("/chat", get(handle_get_chat).post(handle_ask))
        .route("/export/{format}", get(handle_export))
        .route("/profile", get(handle_profile))
        .route("/profile/preferences", put(handle_preferences))
        .route("/profile/history", delete(handle_clear_history))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(cors)
        .with_state(state)
}

/// Serve `state` on `bind` until the process is terminated.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    println!("Book analyzer listening on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Entry point for `bka serve`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind = config.server.bind.clone();
    let state = AppState::new(config.clone()).await?;
    serve(state, &bind).await
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"no_document"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::NoDocument => AppError::new(StatusCode::CONFLICT, "no_document", message),
            SessionError::Extract(_) => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid_pdf", message)
            }
            SessionError::NoText => AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "no_text", message),
            SessionError::InvalidSetting(_) => bad_request(message),
            SessionError::Export(ExportError::NoAnalysis) => {
                AppError::new(StatusCode::CONFLICT, "no_analysis", message)
            }
            SessionError::Export(ExportError::UnknownFormat(_)) => bad_request(message),
            SessionError::Other(e) => {
                tracing::error!("request failed: {:#}", e);
                internal(message)
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::AlreadyRegistered => AppError::new(StatusCode::CONFLICT, "already_registered", message),
            AuthError::PasswordMismatch | AuthError::MissingCredentials => bad_request(message),
            AuthError::Storage(e) => {
                tracing::error!("auth storage error: {}", e);
                internal(message)
            }
        }
    }
}

// ============ Health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Auth ============

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    confirm_password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: String,
    user: SessionUser,
}

async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    auth::validate_signup(&req.email, &req.password, &req.confirm_password)?;
    let message = state.auth.register(req.email.trim(), &req.password).await?;
    Ok(Json(MessageResponse { message }))
}

async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = state
        .auth
        .login(req.email.trim(), &req.password)
        .await?
        .ok_or_else(|| unauthorized(INVALID_LOGIN_MESSAGE))?;
    let session_id = state.open_session(user.clone()).await;
    Ok(Json(SessionResponse { session_id, user }))
}

async fn handle_guest(State(state): State<AppState>) -> Json<SessionResponse> {
    let user = auth::guest();
    let session_id = state.open_session(user.clone()).await;
    Json(SessionResponse { session_id, user })
}

async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let removed = match headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        Some(id) => state.sessions.write().await.remove(id),
        None => None,
    };
    match removed {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(unauthorized("Unknown or expired session.")),
    }
}

// ============ Settings ============

async fn handle_get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsView>, AppError> {
    let session = state.session(&headers).await?;
    let session = session.lock().await;
    Ok(Json(session.settings_view()))
}

async fn handle_put_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsView>, AppError> {
    let session = state.session(&headers).await?;
    let mut session = session.lock().await;
    session.update_settings(update)?;
    Ok(Json(session.settings_view()))
}

// ============ Document ============

#[derive(Deserialize)]
struct UploadParams {
    name: Option<String>,
}

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<DocumentInfo>, AppError> {
    if body.is_empty() {
        return Err(bad_request("Request body must contain a PDF file."));
    }
    let name = params
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "document.pdf".to_string());

    let session = state.session(&headers).await?;
    let mut session = session.lock().await;
    let info = session.upload(&name, &body).await?;
    Ok(Json(info))
}

async fn handle_close_document(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let session = state.session(&headers).await?;
    session.lock().await.close_document();
    Ok(StatusCode::NO_CONTENT)
}

// ============ Analysis ============

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

#[derive(Serialize)]
struct QuestionsResponse {
    questions: Vec<String>,
}

#[derive(Serialize)]
struct FaqsResponse {
    faqs: Vec<Faq>,
}

async fn handle_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SummaryResponse>, AppError> {
    let session = state.session(&headers).await?;
    let summary = session.lock().await.summary().await?;
    Ok(Json(SummaryResponse { summary }))
}

async fn handle_questions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QuestionsResponse>, AppError> {
    let session = state.session(&headers).await?;
    let questions = session.lock().await.questions().await?;
    Ok(Json(QuestionsResponse { questions }))
}

async fn handle_faqs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FaqsResponse>, AppError> {
    let session = state.session(&headers).await?;
    let faqs = session.lock().await.faqs().await?;
    Ok(Json(FaqsResponse { faqs }))
}

async fn handle_insights(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Insights>, AppError> {
    let session = state.session(&headers).await?;
    let insights = session.lock().await.insights()?;
    Ok(Json(insights))
}

// ============ Chat ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct ChatResponse {
    chat: Vec<ChatTurn>,
}

async fn handle_get_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ChatResponse>, AppError> {
    let session = state.session(&headers).await?;
    let chat = session.lock().await.chat().to_vec();
    Ok(Json(ChatResponse { chat }))
}

async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AskRequest>,
) -> Result<Json<ChatTurn>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let session = state.session(&headers).await?;
    let turn = session.lock().await.ask(question).await?;
    Ok(Json(turn))
}

// ============ Export ============

async fn handle_export(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(format): Path<String>,
) -> Result<Response, AppError> {
    let format = ExportFormat::parse(&format).map_err(SessionError::from)?;
    let session = state.session(&headers).await?;
    let content = session.lock().await.export(format)?;

    let disposition = format!("attachment; filename=\"{}\"", format.file_name(Utc::now()));
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

// ============ Profile ============

#[derive(Deserialize)]
struct PreferencesRequest {
    summary_depth: Option<String>,
    interaction_style: Option<String>,
}

async fn handle_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Profile>, AppError> {
    let session = state.session(&headers).await?;
    let profile = session.lock().await.profile();
    Ok(Json(profile))
}

async fn handle_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PreferencesRequest>,
) -> Result<Json<Preferences>, AppError> {
    let session = state.session(&headers).await?;
    let prefs = session
        .lock()
        .await
        .update_preferences(req.summary_depth.as_deref(), req.interaction_style.as_deref())?;
    Ok(Json(prefs))
}

async fn handle_clear_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    let session = state.session(&headers).await?;
    let message = session.lock().await.clear_history()?;
    Ok(Json(MessageResponse { message }))
}
