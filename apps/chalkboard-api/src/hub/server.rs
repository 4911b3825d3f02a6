//! Subscribe endpoint: an open-ended `text/event-stream` response per client.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, Extensions, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, Stream, StreamExt};

use crate::error::{ApiError, ApiErrorBody};
use crate::models::board::BoardName;
use crate::AppState;

use super::events::Event;
use super::fanout::{HubClosed, HubHandle};
use super::subscriber::Subscription;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(events))
        .route("/boards/{board}/events", get(board_events))
}

impl From<HubClosed> for ApiError {
    fn from(err: HubClosed) -> Self {
        tracing::warn!(%err, "hub unavailable");
        Self::unavailable("Event stream is shutting down")
    }
}

// ---------------------------------------------------------------------------
// GET /events
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    responses(
        (status = 200, description = "Server-sent event stream of the default board", content_type = "text/event-stream", body = String),
        (status = 503, description = "Hub is shutting down", body = ApiErrorBody),
    ),
)]
pub async fn events(
    State(state): State<AppState>,
    extensions: Extensions,
) -> Result<Response, ApiError> {
    open_stream(&state, BoardName::default(), &extensions).await
}

// ---------------------------------------------------------------------------
// GET /boards/{board}/events
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/boards/{board}/events",
    tag = "Events",
    params(
        ("board" = String, Path, description = "Board name"),
    ),
    responses(
        (status = 200, description = "Server-sent event stream of the board", content_type = "text/event-stream", body = String),
        (status = 400, description = "Invalid board name", body = ApiErrorBody),
        (status = 503, description = "Hub is shutting down", body = ApiErrorBody),
    ),
)]
pub async fn board_events(
    State(state): State<AppState>,
    Path(board): Path<String>,
    extensions: Extensions,
) -> Result<Response, ApiError> {
    let board = BoardName::parse(&board).map_err(|err| ApiError::validation(vec![err]))?;
    open_stream(&state, board, &extensions).await
}

async fn open_stream(
    state: &AppState,
    board: BoardName,
    extensions: &Extensions,
) -> Result<Response, ApiError> {
    let origin = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let subscription = state.hub.subscribe(board.as_str(), origin.clone()).await?;
    tracing::debug!(key = %subscription.key, %board, %origin, "event stream opened");

    let body = stream::once(async { Ok(Event::hello().into_frame()) })
        .chain(subscription_stream(subscription, state.hub.clone()));

    let mut response = Body::from_stream(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}

/// Tells the hub to forget a subscriber whose stream was dropped by the
/// client side before the hub tore it down.
struct UnsubscribeOnDrop {
    hub: HubHandle,
    key: String,
    armed: bool,
}

impl Drop for UnsubscribeOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(key = %self.key, "event stream dropped by client");
            self.hub.unsubscribe_nowait(&self.key);
        }
    }
}

struct StreamState {
    subscription: Subscription,
    guard: UnsubscribeOnDrop,
}

/// Frames written by the hub until its teardown fires.
fn subscription_stream(
    subscription: Subscription,
    hub: HubHandle,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    let guard = UnsubscribeOnDrop {
        hub,
        key: subscription.key.clone(),
        armed: true,
    };
    let state = StreamState {
        subscription,
        guard,
    };

    stream::unfold(state, |mut state| async move {
        let sub = &mut state.subscription;
        let next = tokio::select! {
            // Frames written before teardown still go out.
            biased;
            frame = sub.frames.recv() => frame,
            _ = &mut sub.teardown => None,
        };
        match next {
            Some(frame) => Some((Ok(frame), state)),
            None => {
                // The hub already dropped us.
                state.guard.armed = false;
                tracing::debug!(key = %state.guard.key, "event stream closed by hub");
                None
            }
        }
    })
}
