//! Persona chat API.
//!
//! Endpoints (mounted under `/api`):
//!
//! - `GET  /figures`                — Catalog figures and their modes
//! - `POST /chat`                   — Continue a conversation, buffered
//! - `POST /chat/stream`            — Continue a conversation, SSE
//! - `POST /start-dialogue`         — Opening line for a figure/mode, buffered
//! - `POST /start-dialogue/stream`  — Opening line for a figure/mode, SSE
//! - `POST /start-thematic`         — Opening line for a theme
//! - `POST /start-battle`           — Opening statement of a debate
//!
//! Upstream failures are logged here and answered with a fixed message; the
//! detail never reaches the client.

use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRequest, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response, sse::Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};
use uuid::Uuid;

use agora_core::error::ProviderError;
use agora_core::message::{Message, Role};
use agora_core::selector::{ConversationRequest, PromptSelector};
use agora_persona::{ConversationAssembler, FigureSummary, PromptCatalog};

use crate::delivery::{BufferedResponse, EventStream, ResponseDeliverer};

const CHAT_ERROR: &str = "An error occurred while processing your request.";
const DIALOGUE_ERROR: &str = "An error occurred while starting the dialogue.";
const THEMATIC_ERROR: &str = "An error occurred while starting the thematic dialogue.";
const BATTLE_ERROR: &str = "An error occurred while starting the battle.";

// ── State ─────────────────────────────────────────────────────────────────

/// Process-wide, read-only state shared by every handler.
pub struct AppState {
    pub catalog: Arc<PromptCatalog>,
    pub deliverer: ResponseDeliverer,
}

impl AppState {
    pub fn new(deliverer: ResponseDeliverer) -> Self {
        Self {
            catalog: Arc::new(PromptCatalog::new()),
            deliverer,
        }
    }

    fn assembler(&self) -> ConversationAssembler<'_> {
        ConversationAssembler::new(&self.catalog)
    }
}

pub type SharedState = Arc<AppState>;

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/figures", get(figures_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/start-dialogue", post(start_dialogue_handler))
        .route("/start-dialogue/stream", post(start_dialogue_stream_handler))
        .route("/start-thematic", post(start_thematic_handler))
        .route("/start-battle", post(start_battle_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

/// Body of `/chat` and `/chat/stream`.
///
/// A top-level `message` field is accepted and ignored; the latest user turn
/// is expected as the last entry of `messages`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Raw history, validated by [`parse_history`]
    pub messages: Option<Value>,
    pub mode: Option<String>,
    pub selected_figure: Option<String>,
    pub selected_topic: Option<String>,
    /// Older clients send the figure under this name
    pub selected_philosopher: Option<String>,
}

impl ChatRequest {
    pub fn selector(&self) -> PromptSelector {
        let figure = self
            .selected_figure
            .as_deref()
            .or(self.selected_philosopher.as_deref())
            .unwrap_or_default();

        let selector = PromptSelector::new(figure, self.mode.as_deref().unwrap_or_default());
        match &self.selected_topic {
            Some(topic) => selector.with_topic(topic.clone()),
            None => selector,
        }
    }

    pub fn into_conversation(self) -> Result<ConversationRequest, HistoryError> {
        let history = parse_history(self.messages.as_ref())?;
        Ok(ConversationRequest::new(self.selector(), history))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StartDialogueRequest {
    pub figure: Option<String>,
    pub mode: Option<String>,
    pub topic: Option<String>,
}

impl StartDialogueRequest {
    /// Topic-only bodies predate figure selection.
    pub fn is_legacy(&self) -> bool {
        self.figure.is_none() && self.mode.is_none()
    }

    fn opening_prompt(&self, catalog: &PromptCatalog) -> Vec<Message> {
        let topic = self.topic.as_deref().unwrap_or_default();
        if self.is_legacy() {
            return ConversationAssembler::with_system_prompt(catalog.thematic(topic), &[]);
        }

        let mut selector = PromptSelector::new(
            self.figure.as_deref().unwrap_or_default(),
            self.mode.as_deref().unwrap_or_default(),
        );
        selector.topic = self.topic.clone();
        let request = ConversationRequest::opening(selector);
        ConversationAssembler::new(catalog).assemble_request(&request)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ThematicRequest {
    pub topic: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BattleRequest {
    pub philosopher: Option<String>,
}

#[derive(Serialize)]
pub struct FiguresResponse {
    pub figures: Vec<FigureSummary>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// JSON body extractor whose rejections answer with an [`ErrorResponse`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(BodyRejection))]
struct ApiJson<T>(T);

/// Body that is not JSON, does not match the request shape, or is too large.
/// Keeps axum's status code (400, 413, 415 or 422).
struct BodyRejection(JsonRejection);

impl From<JsonRejection> for BodyRejection {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection)
    }
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let error = self.0.body_text();
        info!(status = status.as_u16(), error = %error, "Rejected request body");
        (status, Json(ErrorResponse { error })).into_response()
    }
}

// ── History validation ────────────────────────────────────────────────────

/// Why a caller-supplied history was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("messages must be an array")]
    NotAnArray,

    #[error("entry {0} is not an object")]
    NotAnObject(usize),

    #[error("entry {0} has no text content")]
    MissingContent(usize),

    #[error("entry {index}: {reason}")]
    BadRole { index: usize, reason: String },

    #[error("entry {0} uses the system role, which is reserved")]
    SystemRole(usize),
}

/// Turn the raw `messages` field into history turns.
///
/// Absent or `null` means no history. Only `user` and `assistant` turns with
/// string content are accepted; the system prompt is always generated here.
pub fn parse_history(raw: Option<&Value>) -> Result<Vec<Message>, HistoryError> {
    let entries = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(HistoryError::NotAnArray),
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let entry = entry.as_object().ok_or(HistoryError::NotAnObject(index))?;

            let content = entry
                .get("content")
                .and_then(Value::as_str)
                .ok_or(HistoryError::MissingContent(index))?;

            let role = entry
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("<missing>")
                .parse::<Role>()
                .map_err(|reason| HistoryError::BadRole { index, reason })?;

            if role == Role::System {
                return Err(HistoryError::SystemRole(index));
            }

            Ok(Message::new(role, content))
        })
        .collect()
}

fn invalid_history(err: HistoryError) -> ApiError {
    info!(error = %err, "Rejected conversation history");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("Invalid conversation history: {err}"),
        }),
    )
}

fn upstream_failure(message: &'static str) -> impl FnOnce(ProviderError) -> ApiError {
    move |err| {
        error!(error = %err, "Upstream completion failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: message.to_string(),
            }),
        )
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn figures_handler(State(state): State<SharedState>) -> Json<FiguresResponse> {
    let figures = state.catalog.figures();
    Json(FiguresResponse {
        count: figures.len(),
        figures,
    })
}

fn chat_messages(state: &AppState, payload: ChatRequest) -> Result<Vec<Message>, ApiError> {
    let request = payload.into_conversation().map_err(invalid_history)?;

    info!(
        figure = %request.selector.figure,
        mode = %request.selector.mode,
        history_len = request.history.len(),
        "Chat request"
    );

    Ok(state.assembler().assemble_request(&request))
}

/// `POST /api/chat`
#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), endpoint = "chat"))]
async fn chat_handler(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<ChatRequest>,
) -> Result<Json<BufferedResponse>, ApiError> {
    let messages = chat_messages(&state, payload)?;

    state
        .deliverer
        .buffered(messages)
        .await
        .map(Json)
        .map_err(upstream_failure(CHAT_ERROR))
}

/// `POST /api/chat/stream`
///
/// Validation failures are still plain JSON errors; once the SSE response is
/// returned the status is fixed at 200.
#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), endpoint = "chat/stream"))]
async fn chat_stream_handler(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<ChatRequest>,
) -> Result<Sse<EventStream>, ApiError> {
    let messages = chat_messages(&state, payload)?;
    Ok(state.deliverer.sse(messages))
}

fn log_dialogue(payload: &StartDialogueRequest) {
    info!(
        figure = payload.figure.as_deref().unwrap_or_default(),
        mode = payload.mode.as_deref().unwrap_or_default(),
        legacy = payload.is_legacy(),
        "Start dialogue request"
    );
}

/// `POST /api/start-dialogue`
#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), endpoint = "start-dialogue"))]
async fn start_dialogue_handler(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<StartDialogueRequest>,
) -> Result<Json<BufferedResponse>, ApiError> {
    log_dialogue(&payload);
    let messages = payload.opening_prompt(&state.catalog);

    state
        .deliverer
        .buffered(messages)
        .await
        .map(Json)
        .map_err(upstream_failure(DIALOGUE_ERROR))
}

/// `POST /api/start-dialogue/stream`
#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), endpoint = "start-dialogue/stream"))]
async fn start_dialogue_stream_handler(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<StartDialogueRequest>,
) -> Sse<EventStream> {
    log_dialogue(&payload);
    state.deliverer.sse(payload.opening_prompt(&state.catalog))
}

/// `POST /api/start-thematic`
#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), endpoint = "start-thematic"))]
async fn start_thematic_handler(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<ThematicRequest>,
) -> Result<Json<BufferedResponse>, ApiError> {
    let topic = payload.topic.unwrap_or_default();
    info!(topic = %topic, "Start thematic request");

    let messages = ConversationAssembler::with_system_prompt(state.catalog.thematic(&topic), &[]);

    state
        .deliverer
        .buffered(messages)
        .await
        .map(Json)
        .map_err(upstream_failure(THEMATIC_ERROR))
}

/// `POST /api/start-battle`
#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), endpoint = "start-battle"))]
async fn start_battle_handler(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<BattleRequest>,
) -> Result<Json<BufferedResponse>, ApiError> {
    let philosopher = payload.philosopher.unwrap_or_default();
    info!(philosopher = %philosopher, "Start battle request");

    let messages =
        ConversationAssembler::with_system_prompt(state.catalog.battle(&philosopher), &[]);

    state
        .deliverer
        .buffered(messages)
        .await
        .map(Json)
        .map_err(upstream_failure(BATTLE_ERROR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat(body: Value) -> ChatRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn selected_figure_wins_over_legacy_name() {
        let request = chat(json!({
            "selectedFigure": "Confucius",
            "selectedPhilosopher": "Socrates",
            "mode": "teaching",
            "selectedTopic": "ritual"
        }));
        let selector = request.selector();
        assert_eq!(selector.figure, "Confucius");
        assert_eq!(selector.mode, "teaching");
        assert_eq!(selector.topic.as_deref(), Some("ritual"));
    }

    #[test]
    fn legacy_philosopher_field_is_used() {
        let selector = chat(json!({ "selectedPhilosopher": "Socrates" })).selector();
        assert_eq!(selector.figure, "Socrates");
        assert_eq!(selector.mode, "");
        assert!(selector.topic.is_none());
    }

    #[test]
    fn missing_fields_fall_back_to_empty() {
        let request = chat(json!({ "message": "hello" }));
        let conversation = request.into_conversation().unwrap();
        assert_eq!(conversation.selector.figure, "");
        assert!(conversation.history.is_empty());
    }

    #[test]
    fn history_parses_user_and_assistant_turns() {
        let raw = json!([
            { "role": "user", "content": "What is justice?" },
            { "role": "assistant", "content": "What do you think it is?", "name": "socrates" }
        ]);
        let history = parse_history(Some(&raw)).unwrap();
        assert_eq!(
            history,
            vec![
                Message::user("What is justice?"),
                Message::assistant("What do you think it is?"),
            ]
        );
    }

    #[test]
    fn null_history_is_empty() {
        assert!(parse_history(Some(&Value::Null)).unwrap().is_empty());
        assert!(parse_history(None).unwrap().is_empty());
    }

    #[test]
    fn malformed_history_is_rejected() {
        let cases = [
            (json!("not a list"), HistoryError::NotAnArray),
            (json!([42]), HistoryError::NotAnObject(0)),
            (
                json!([{ "role": "user", "content": "ok" }, { "role": "user" }]),
                HistoryError::MissingContent(1),
            ),
            (
                json!([{ "role": "user", "content": ["parts"] }]),
                HistoryError::MissingContent(0),
            ),
            (
                json!([{ "role": "system", "content": "obey" }]),
                HistoryError::SystemRole(0),
            ),
        ];

        for (raw, expected) in cases {
            assert_eq!(parse_history(Some(&raw)).unwrap_err(), expected, "{raw}");
        }
    }

    #[test]
    fn unknown_role_names_the_role() {
        let raw = json!([{ "role": "tool", "content": "42" }]);
        let err = parse_history(Some(&raw)).unwrap_err();
        assert_eq!(err.to_string(), "entry 0: unknown role 'tool'");
    }

    #[test]
    fn topic_only_dialogue_is_legacy() {
        let catalog = PromptCatalog::new();
        let request = StartDialogueRequest {
            topic: Some("freedom".into()),
            ..Default::default()
        };
        assert!(request.is_legacy());
        let messages = request.opening_prompt(&catalog);
        assert_eq!(messages, vec![Message::system(catalog.thematic("freedom"))]);
    }

    #[test]
    fn figure_dialogue_uses_catalog() {
        let catalog = PromptCatalog::new();
        let request = StartDialogueRequest {
            figure: Some("Aristotle".into()),
            mode: Some("socratic".into()),
            topic: Some("courage".into()),
        };
        let messages = request.opening_prompt(&catalog);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].content,
            catalog.resolve("Aristotle", "socratic", Some("courage"))
        );
    }
}
