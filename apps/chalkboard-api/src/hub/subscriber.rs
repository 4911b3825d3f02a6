//! Subscriber halves: the sink the hub writes to, and the subscription the
//! HTTP boundary streams from.

use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use chalkboard_common::id::{prefix, PrefixedId};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};

/// Why a write to a subscriber failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// The receiving side is gone: the client disconnected.
    Closed,
    /// The buffer stayed full for the whole write timeout.
    TimedOut,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Closed => f.write_str("subscriber stream closed"),
            WriteError::TimedOut => f.write_str("subscriber write timed out"),
        }
    }
}

impl std::error::Error for WriteError {}

/// Hub-owned half of one open event stream.
pub struct Subscriber {
    key: String,
    board: String,
    origin: String,
    sink: mpsc::Sender<Bytes>,
    teardown: oneshot::Sender<()>,
}

impl PrefixedId for Subscriber {
    const PREFIX: &'static str = prefix::SUBSCRIBER;
}

impl Subscriber {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn board(&self) -> &str {
        &self.board
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Queue one frame, waiting at most `timeout` for buffer space.
    pub async fn write(&self, frame: Bytes, timeout: Duration) -> Result<(), WriteError> {
        self.sink
            .send_timeout(frame, timeout)
            .await
            .map_err(|err| match err {
                SendTimeoutError::Closed(_) => WriteError::Closed,
                SendTimeoutError::Timeout(_) => WriteError::TimedOut,
            })
    }

    /// Fire the teardown signal. Consumes the subscriber, so it fires at
    /// most once.
    pub fn teardown(self) {
        // The receiver is gone when the client already hung up.
        let _ = self.teardown.send(());
    }
}

/// Connection-owned half: buffered frames plus the teardown signal.
pub struct Subscription {
    pub key: String,
    pub board: String,
    pub frames: mpsc::Receiver<Bytes>,
    /// Resolves once the hub has dropped this subscriber.
    pub teardown: oneshot::Receiver<()>,
}

/// Create a linked subscriber/subscription pair for `board` under a fresh
/// unique key.
pub fn pair(
    board: impl Into<String>,
    origin: impl Into<String>,
    buffer: usize,
) -> (Subscriber, Subscription) {
    pair_with_key(Subscriber::generate(), board, origin, buffer)
}

/// Like [`pair`] but with a caller-chosen key.
pub fn pair_with_key(
    key: impl Into<String>,
    board: impl Into<String>,
    origin: impl Into<String>,
    buffer: usize,
) -> (Subscriber, Subscription) {
    let key = key.into();
    let board = board.into();
    let (sink, frames) = mpsc::channel(buffer.max(1));
    let (teardown_tx, teardown_rx) = oneshot::channel();
    let subscriber = Subscriber {
        key: key.clone(),
        board: board.clone(),
        origin: origin.into(),
        sink,
        teardown: teardown_tx,
    };
    let subscription = Subscription {
        key,
        board,
        frames,
        teardown: teardown_rx,
    };
    (subscriber, subscription)
}
