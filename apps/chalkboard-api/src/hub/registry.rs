//! The subscriber registry. Owned by the hub task and never shared.

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Bytes;
use futures_util::future::join_all;

use super::subscriber::Subscriber;

/// Outcome of one broadcast pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Keys dropped because their write failed.
    pub removed: Vec<String>,
}

/// Subscribers grouped by board, plus a key index for removal by key.
pub struct Registry {
    boards: HashMap<String, HashMap<String, Subscriber>>,
    board_of: HashMap<String, String>,
    write_timeout: Duration,
}

impl Registry {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            boards: HashMap::new(),
            board_of: HashMap::new(),
            write_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.board_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.board_of.is_empty()
    }

    pub fn board_len(&self, board: &str) -> usize {
        self.boards.get(board).map_or(0, HashMap::len)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.board_of.contains_key(key)
    }

    /// Register `subscriber`. A previous entry under the same key is torn
    /// down, so its connection does not wait forever.
    ///
    /// Returns `true` when an entry was replaced.
    pub fn insert(&mut self, subscriber: Subscriber) -> bool {
        let key = subscriber.key().to_string();
        let board = subscriber.board().to_string();
        let replaced = self.take(&key);

        self.board_of.insert(key.clone(), board.clone());
        self.boards.entry(board).or_default().insert(key, subscriber);

        match replaced {
            Some(old) => {
                tracing::info!(key = %old.key(), origin = %old.origin(), "replacing client");
                old.teardown();
                true
            }
            None => false,
        }
    }

    /// Drop `key` and fire its teardown. Unknown keys are ignored.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.take(key) {
            Some(sub) => {
                sub.teardown();
                true
            }
            None => false,
        }
    }

    fn take(&mut self, key: &str) -> Option<Subscriber> {
        let board = self.board_of.remove(key)?;
        let subscribers = self.boards.get_mut(&board)?;
        let sub = subscribers.remove(key);
        if subscribers.is_empty() {
            self.boards.remove(&board);
        }
        sub
    }

    /// Write to a single subscriber. On failure it is removed and torn down.
    pub async fn write_to(&mut self, key: &str, frame: Bytes) -> bool {
        let Some(sub) = self
            .board_of
            .get(key)
            .and_then(|board| self.boards.get(board))
            .and_then(|subscribers| subscribers.get(key))
        else {
            return false;
        };
        let written = sub.write(frame, self.write_timeout).await;
        match written {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(%key, %err, "removing client");
                self.remove(key);
                false
            }
        }
    }

    /// Write `frame` to every subscriber of `board`.
    pub async fn broadcast(&mut self, board: &str, frame: &Bytes) -> BroadcastReport {
        let report = match self.boards.get(board) {
            Some(subscribers) => write_all(subscribers, frame, self.write_timeout).await,
            None => return BroadcastReport::default(),
        };
        self.prune(report)
    }

    /// Write `frame` to every subscriber of every board.
    pub async fn broadcast_all(&mut self, frame: &Bytes) -> BroadcastReport {
        let passes = self
            .boards
            .values()
            .map(|subscribers| write_all(subscribers, frame, self.write_timeout));
        let report = join_all(passes).await.into_iter().fold(
            BroadcastReport::default(),
            |mut total, pass| {
                total.delivered += pass.delivered;
                total.removed.extend(pass.removed);
                total
            },
        );
        self.prune(report)
    }

    /// Removal happens after the full pass: every subscriber has been
    /// attempted against one consistent set before any key is dropped.
    fn prune(&mut self, report: BroadcastReport) -> BroadcastReport {
        for key in &report.removed {
            self.remove(key);
        }
        report
    }

    /// Tear down every subscriber.
    pub fn clear(&mut self) {
        self.board_of.clear();
        for (_, subscribers) in self.boards.drain() {
            for (_, sub) in subscribers {
                sub.teardown();
            }
        }
    }
}

/// Write to all `subscribers` concurrently, so one slow client costs the pass
/// at most one write timeout. Nothing is removed here.
async fn write_all(
    subscribers: &HashMap<String, Subscriber>,
    frame: &Bytes,
    timeout: Duration,
) -> BroadcastReport {
    let writes = subscribers.iter().map(|(key, sub)| {
        let frame = frame.clone();
        async move { (key, sub.origin(), sub.write(frame, timeout).await) }
    });

    let mut report = BroadcastReport::default();
    for (key, origin, written) in join_all(writes).await {
        match written {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                tracing::debug!(%key, %origin, %err, "removing client");
                report.removed.push(key.clone());
            }
        }
    }
    report
}
