//! Board endpoints: the chalkboard page and the note mutation form.
//!
//! `/` is the default board. `/boards/{board}/` serves the same page for a
//! named board, with its own notes and its own event stream.

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::hub::Event;
use crate::models::board::BoardName;
use crate::models::note::{Note, MAX_CLIENT_ID};
use crate::AppState;

/// Page served at `/`, looked up in the static directory.
pub const INDEX_FILE: &str = "chalkboard.html";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(mutate))
        .route("/boards/{board}", get(board_index).post(board_mutate))
        .route("/boards/{board}/", get(board_index).post(board_mutate))
}

fn board_name(raw: &str) -> Result<BoardName, ApiError> {
    BoardName::parse(raw).map_err(|err| ApiError::validation(vec![err]))
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/",
    tag = "Board",
    responses(
        (status = 200, description = "Chalkboard page", content_type = "text/html", body = String),
        (status = 404, description = "Page missing from the static directory", body = ApiErrorBody),
    ),
)]
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    page(&state).await
}

#[utoipa::path(
    get,
    path = "/boards/{board}/",
    tag = "Board",
    params(
        ("board" = String, Path, description = "Board name"),
    ),
    responses(
        (status = 200, description = "Chalkboard page", content_type = "text/html", body = String),
        (status = 400, description = "Invalid board name", body = ApiErrorBody),
        (status = 404, description = "Page missing from the static directory", body = ApiErrorBody),
    ),
)]
pub async fn board_index(
    State(state): State<AppState>,
    Path(board): Path<String>,
) -> Result<Html<String>, ApiError> {
    board_name(&board)?;
    page(&state).await
}

/// The page finds its board from its own URL.
async fn page(state: &AppState) -> Result<Html<String>, ApiError> {
    let path = state.config.static_dir.join(INDEX_FILE);
    let page = tokio::fs::read_to_string(&path).await?;
    Ok(Html(page))
}

// ---------------------------------------------------------------------------
// POST /
// ---------------------------------------------------------------------------

/// Raw mutation form. Every field arrives as text and is validated by
/// [`MutationForm::parse`].
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MutationForm {
    /// One of `add`, `update`, `remove`.
    pub action: Option<String>,
    /// Required for `update` and `remove`.
    pub id: Option<String>,
    pub note: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

/// A validated mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Add(Note),
    Update(Note),
    Remove { id: i64 },
}

impl MutationForm {
    /// Validate the form. Missing or non-numeric fields are rejected rather
    /// than read as zero.
    pub fn parse(self) -> Result<Mutation, ApiError> {
        let mut errors = Vec::new();

        let mutation = match self.action.as_deref().map(str::trim) {
            Some("add") => {
                let note = required(&mut errors, "note", self.note);
                let x = integer(&mut errors, "x", self.x.as_deref());
                let y = integer(&mut errors, "y", self.y.as_deref());
                match (note, x, y) {
                    (Some(note), Some(x), Some(y)) => Some(Mutation::Add(Note::draft(note, x, y))),
                    _ => None,
                }
            }
            Some("update") => {
                let id = note_id(&mut errors, self.id.as_deref());
                let note = required(&mut errors, "note", self.note);
                let x = integer(&mut errors, "x", self.x.as_deref());
                let y = integer(&mut errors, "y", self.y.as_deref());
                match (id, note, x, y) {
                    (Some(id), Some(note), Some(x), Some(y)) => {
                        Some(Mutation::Update(Note { id, note, x, y }))
                    }
                    _ => None,
                }
            }
            Some("remove") => {
                note_id(&mut errors, self.id.as_deref()).map(|id| Mutation::Remove { id })
            }
            Some(other) => {
                errors.push(FieldError::new(
                    "action",
                    format!("Unknown action '{other}'; expected add, update or remove"),
                ));
                None
            }
            None => {
                errors.push(FieldError::new("action", "Action is required"));
                None
            }
        };

        match mutation {
            Some(mutation) if errors.is_empty() => Ok(mutation),
            _ => Err(ApiError::validation(errors)),
        }
    }
}

fn required(errors: &mut Vec<FieldError>, field: &str, value: Option<String>) -> Option<String> {
    if value.is_none() {
        errors.push(FieldError::new(field, format!("{field} is required")));
    }
    value
}

fn integer(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>) -> Option<i64> {
    match value.map(str::trim) {
        None => {
            errors.push(FieldError::new(field, format!("{field} is required")));
            None
        }
        Some(raw) => match raw.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                errors.push(FieldError::new(field, format!("{field} must be an integer")));
                None
            }
        },
    }
}

/// Ids are handed out from 1 and clients only ever see ids up to
/// [`MAX_CLIENT_ID`]; anything else is not a note this server created.
fn note_id(errors: &mut Vec<FieldError>, value: Option<&str>) -> Option<i64> {
    let id = integer(errors, "id", value)?;
    if (1..=MAX_CLIENT_ID).contains(&id) {
        Some(id)
    } else {
        errors.push(FieldError::new(
            "id",
            format!("id must be between 1 and {MAX_CLIENT_ID}"),
        ));
        None
    }
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Board",
    request_body(content = MutationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Note created (action=add)", body = Note),
        (status = 204, description = "Update or remove applied"),
        (status = 400, description = "Malformed mutation", body = ApiErrorBody),
    ),
)]
pub async fn mutate(
    State(state): State<AppState>,
    form: Result<Form<MutationForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form?;
    apply(&state, &BoardName::default(), form).await
}

#[utoipa::path(
    post,
    path = "/boards/{board}/",
    tag = "Board",
    params(
        ("board" = String, Path, description = "Board name"),
    ),
    request_body(content = MutationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Note created (action=add)", body = Note),
        (status = 204, description = "Update or remove applied"),
        (status = 400, description = "Malformed mutation or board name", body = ApiErrorBody),
    ),
)]
pub async fn board_mutate(
    State(state): State<AppState>,
    Path(board): Path<String>,
    form: Result<Form<MutationForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let board = board_name(&board)?;
    let Form(form) = form?;
    apply(&state, &board, form).await
}

async fn apply(
    state: &AppState,
    board: &BoardName,
    form: MutationForm,
) -> Result<Response, ApiError> {
    match form.parse()? {
        Mutation::Add(draft) => {
            let note = state.store.add(board.as_str(), draft)?;
            tracing::debug!(id = note.id, %board, "note added");
            publish(state, board, Event::add(&note)).await;
            Ok(Json(note).into_response())
        }
        Mutation::Update(note) => {
            state.store.update(board.as_str(), note.clone());
            tracing::debug!(id = note.id, %board, "note updated");
            publish(state, board, Event::update(&note)).await;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Mutation::Remove { id } => {
            state.store.remove(board.as_str(), id);
            tracing::debug!(id, %board, "note removed");
            publish(state, board, Event::remove(id)).await;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

/// The mutation is already applied, so a stopped hub only costs the broadcast.
async fn publish(state: &AppState, board: &BoardName, event: Event) {
    let kind = event.kind();
    if let Err(err) = state.hub.publish(board.as_str(), event).await {
        tracing::warn!(%err, %kind, %board, "event dropped");
    }
}
