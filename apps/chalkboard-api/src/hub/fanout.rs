//! Broadcast hub: one task that owns the subscriber registry.
//!
//! Request handlers never touch the registry. They talk to the hub task
//! through a cloneable [`HubHandle`] holding two queues: `commands` for
//! registration traffic and `events` for pre-serialized mutation events. The
//! task drains both, so every broadcast and every registration is applied in
//! one serial order and all subscribers see events in publish order.
//!
//! Subscribers and events are scoped to a board: an event reaches only the
//! subscribers of the board it was published on. A newly registered
//! subscriber is replayed its board's current notes as `add` events through
//! the same sink live events use, so no live event can overtake its replay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::config::Config;
use crate::db::notes::NoteStore;
use crate::models::note::Note;

use super::events::{heartbeat_frame, Event};
use super::registry::Registry;
use super::subscriber::{self, Subscriber, Subscription};

/// Capacity of the registration queue.
const COMMAND_CAPACITY: usize = 64;

/// Tunables for the hub task and the sinks it creates.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub event_queue_capacity: usize,
    pub subscriber_buffer: usize,
    pub write_timeout: Duration,
    pub heartbeat_interval: Option<Duration>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for HubConfig {
    fn from(config: &Config) -> Self {
        Self {
            event_queue_capacity: config.event_queue_capacity,
            subscriber_buffer: config.subscriber_buffer,
            write_timeout: config.write_timeout,
            heartbeat_interval: config.heartbeat_interval,
        }
    }
}

/// Returned when the hub task is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubClosed;

impl fmt::Display for HubClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("broadcast hub is not running")
    }
}

impl std::error::Error for HubClosed {}

/// Point-in-time counters reported by the hub task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub subscribers: usize,
    pub broadcasts: u64,
}

/// An event bound for the subscribers of one board.
pub struct Publication {
    pub board: String,
    pub event: Event,
}

pub enum HubCommand {
    Subscribe {
        subscriber: Subscriber,
        /// Answered once the subscriber is in the registry, before replay.
        registered: oneshot::Sender<()>,
    },
    Unsubscribe {
        key: String,
    },
    Stats {
        resp: oneshot::Sender<HubStats>,
    },
    Shutdown,
}

/// Cloneable access to the hub task. Store in `AppState`.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    events: mpsc::Sender<Publication>,
    subscriber_buffer: usize,
}

impl HubHandle {
    /// Start the hub task on the current runtime.
    pub fn spawn(store: Arc<dyn NoteStore>, config: HubConfig) -> (Self, JoinHandle<()>) {
        let (handle, hub) = Self::new(store, config);
        (handle, tokio::spawn(hub.run()))
    }

    /// Build a handle and the hub it talks to without starting the task.
    pub fn new(store: Arc<dyn NoteStore>, config: HubConfig) -> (Self, Hub) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(config.event_queue_capacity.max(1));
        let handle = Self {
            commands: commands_tx,
            events: events_tx,
            subscriber_buffer: config.subscriber_buffer,
        };
        let hub = Hub {
            store,
            registry: Registry::new(config.write_timeout),
            commands: commands_rx,
            events: events_rx,
            heartbeat_interval: config.heartbeat_interval,
            broadcasts: 0,
        };
        (handle, hub)
    }

    /// Register a new subscriber to `board` for `origin` under a fresh
    /// unique key.
    ///
    /// Returns once the subscriber is registered: every event published to
    /// `board` after this call returns reaches it, after its replay.
    pub async fn subscribe(
        &self,
        board: impl Into<String>,
        origin: impl Into<String>,
    ) -> Result<Subscription, HubClosed> {
        let (subscriber, subscription) =
            subscriber::pair(board, origin, self.subscriber_buffer);
        self.register(subscriber).await?;
        Ok(subscription)
    }

    /// Register a subscriber built by the caller.
    pub async fn register(&self, subscriber: Subscriber) -> Result<(), HubClosed> {
        let (registered, ack) = oneshot::channel();
        self.commands
            .send(HubCommand::Subscribe {
                subscriber,
                registered,
            })
            .await
            .map_err(|_| HubClosed)?;
        ack.await.map_err(|_| HubClosed)
    }

    /// Hand `event` for `board` to the hub. Returns once it is queued, not
    /// delivered.
    pub async fn publish(&self, board: impl Into<String>, event: Event) -> Result<(), HubClosed> {
        let publication = Publication {
            board: board.into(),
            event,
        };
        self.events.send(publication).await.map_err(|_| HubClosed)
    }

    /// Drop the subscriber registered under `key` and fire its teardown.
    pub async fn unsubscribe(&self, key: &str) -> Result<(), HubClosed> {
        self.commands
            .send(HubCommand::Unsubscribe {
                key: key.to_string(),
            })
            .await
            .map_err(|_| HubClosed)
    }

    /// Best-effort [`unsubscribe`](Self::unsubscribe) usable from `Drop`.
    /// If the queue is full the next failed write prunes the subscriber.
    pub fn unsubscribe_nowait(&self, key: &str) {
        let _ = self.commands.try_send(HubCommand::Unsubscribe {
            key: key.to_string(),
        });
    }

    pub async fn stats(&self) -> Result<HubStats, HubClosed> {
        let (resp, rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Stats { resp })
            .await
            .map_err(|_| HubClosed)?;
        rx.await.map_err(|_| HubClosed)
    }

    pub async fn subscriber_count(&self) -> Result<usize, HubClosed> {
        Ok(self.stats().await?.subscribers)
    }

    /// Tear down every subscriber and stop the hub task.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(HubCommand::Shutdown).await;
    }
}

/// The hub task state. Only ever touched from [`Hub::run`].
pub struct Hub {
    store: Arc<dyn NoteStore>,
    registry: Registry,
    commands: mpsc::Receiver<HubCommand>,
    events: mpsc::Receiver<Publication>,
    heartbeat_interval: Option<Duration>,
    broadcasts: u64,
}

impl Hub {
    /// Serve until shut down or until every handle is dropped.
    pub async fn run(mut self) {
        let mut heartbeat = self.heartbeat_interval.map(|period| {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        tracing::info!(heartbeat = ?self.heartbeat_interval, "broadcast hub started");

        loop {
            tokio::select! {
                // Events first: anything queued before a registration is
                // delivered before that subscriber's replay is taken.
                biased;

                publication = self.events.recv() => match publication {
                    Some(publication) => self.deliver(publication).await,
                    None => break,
                },

                command = self.commands.recv() => match command {
                    Some(HubCommand::Subscribe { subscriber, registered }) => {
                        self.add_subscriber(subscriber, registered).await;
                    }
                    Some(HubCommand::Unsubscribe { key }) => {
                        if self.registry.remove(&key) {
                            tracing::info!(%key, "client unsubscribed");
                        }
                    }
                    Some(HubCommand::Stats { resp }) => {
                        let _ = resp.send(HubStats {
                            subscribers: self.registry.len(),
                            broadcasts: self.broadcasts,
                        });
                    }
                    Some(HubCommand::Shutdown) | None => break,
                },

                _ = tick(&mut heartbeat) => self.heartbeat().await,
            }
        }

        tracing::info!(subscribers = self.registry.len(), "broadcast hub stopping");
        self.registry.clear();
    }

    async fn add_subscriber(&mut self, subscriber: Subscriber, registered: oneshot::Sender<()>) {
        let key = subscriber.key().to_string();
        let board = subscriber.board().to_string();
        tracing::info!(%key, %board, origin = %subscriber.origin(), "adding client");
        self.registry.insert(subscriber);
        let _ = registered.send(());

        // Snapshot under the store lock, write after releasing it.
        let mut replay = Vec::new();
        self.store
            .for_each(&board, &mut |note: &Note| replay.push(Event::add(note).into_frame()));

        for frame in replay {
            if !self.registry.write_to(&key, frame).await {
                tracing::debug!(%key, "client dropped during replay");
                return;
            }
        }
    }

    async fn deliver(&mut self, Publication { board, event }: Publication) {
        self.broadcasts += 1;
        tracing::debug!(
            kind = %event.kind(),
            %board,
            clients = self.registry.board_len(&board),
            "broadcast"
        );
        let report = self.registry.broadcast(&board, event.frame()).await;
        if !report.removed.is_empty() {
            tracing::info!(
                removed = report.removed.len(),
                remaining = self.registry.len(),
                "removed unreachable clients"
            );
        }
    }

    async fn heartbeat(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        let report = self.registry.broadcast_all(&heartbeat_frame()).await;
        if !report.removed.is_empty() {
            tracing::info!(
                removed = report.removed.len(),
                remaining = self.registry.len(),
                "heartbeat pruned clients"
            );
        }
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
