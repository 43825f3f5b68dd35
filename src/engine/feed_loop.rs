//! The evaluation loop: the seam between multi-threaded feeds and the
//! single-threaded alert graph.
//!
//! Real-time feeds may produce data on network callbacks, timers, or worker
//! threads, but nothing in the alert graph is touched from those contexts.
//! Producers hold a cloneable [`FeedHandle`] and submit [`FeedUpdate`]s; the
//! loop receives them on the evaluation thread and applies each one fully
//! (source mutation, condition re-evaluation, model mutation, aggregate
//! recomputation) before the next update is taken. Updates from different
//! sources never interleave.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::EngineConfig,
    events::{Subscribers, Subscription},
    geometry::Geometry,
    models::value::AlertValue,
    source::{AlertSource, SourceId},
};

/// One marshalled feed event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// A new feed exists; the loop creates and registers a live source.
    Announce {
        /// Identifier of the new feed.
        source_id: SourceId,
    },
    /// The feed reported a new value.
    Value {
        /// Identifier of the reporting feed.
        source_id: SourceId,
        /// The reported value.
        value: AlertValue,
    },
    /// The feed reported a new geometry.
    Geometry {
        /// Identifier of the reporting feed.
        source_id: SourceId,
        /// The reported geometry.
        geometry: Geometry,
    },
    /// The feed is permanently gone; the loop invalidates its source.
    Invalidate {
        /// Identifier of the departed feed.
        source_id: SourceId,
    },
}

/// Errors producers can hit when submitting updates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The evaluation loop is no longer running.
    #[error("the evaluation loop is no longer running")]
    Closed,
    /// The feed channel is at capacity (only from [`FeedHandle::try_send`]).
    #[error("the feed channel is full")]
    Full,
}

/// A cloneable, thread-safe producer handle onto the evaluation loop.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    tx: mpsc::Sender<FeedUpdate>,
}

impl FeedHandle {
    /// Submits an update, waiting for channel capacity if necessary.
    pub async fn send(&self, update: FeedUpdate) -> Result<(), FeedError> {
        self.tx.send(update).await.map_err(|_| FeedError::Closed)
    }

    /// Submits an update without waiting; fails when the channel is full.
    pub fn try_send(&self, update: FeedUpdate) -> Result<(), FeedError> {
        self.tx.try_send(update).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => FeedError::Full,
            mpsc::error::TrySendError::Closed(_) => FeedError::Closed,
        })
    }

    /// Announces a new feed.
    pub async fn announce(&self, source_id: SourceId) -> Result<(), FeedError> {
        self.send(FeedUpdate::Announce { source_id }).await
    }

    /// Reports a new value for a feed.
    pub async fn value(
        &self,
        source_id: SourceId,
        value: impl Into<AlertValue>,
    ) -> Result<(), FeedError> {
        self.send(FeedUpdate::Value { source_id, value: value.into() }).await
    }

    /// Reports a new geometry for a feed.
    pub async fn geometry(&self, source_id: SourceId, geometry: Geometry) -> Result<(), FeedError> {
        self.send(FeedUpdate::Geometry { source_id, geometry }).await
    }

    /// Reports that a feed is permanently gone.
    pub async fn invalidate(&self, source_id: SourceId) -> Result<(), FeedError> {
        self.send(FeedUpdate::Invalidate { source_id }).await
    }
}

/// The single-threaded evaluation loop.
///
/// The future returned by [`EvaluationLoop::run`] is not `Send` (it owns the
/// alert graph); drive it with `tokio::task::spawn_local` or a
/// current-thread runtime. The loop stops when its cancellation token fires
/// or every [`FeedHandle`] is dropped; either way it invalidates every
/// remaining source on the way out so all dependents detach cleanly.
pub struct EvaluationLoop {
    rx: mpsc::Receiver<FeedUpdate>,
    sources: HashMap<SourceId, AlertSource>,
    registered: Subscribers<AlertSource>,
    auto_register: bool,
    cancellation_token: CancellationToken,
}

impl EvaluationLoop {
    /// Creates a loop and the producer handle feeding it.
    pub fn new(config: &EngineConfig) -> (Self, FeedHandle) {
        let (tx, rx) = mpsc::channel(config.feed_capacity);
        let feed_loop = Self {
            rx,
            sources: HashMap::new(),
            registered: Subscribers::new(),
            auto_register: config.auto_register_sources,
            cancellation_token: CancellationToken::new(),
        };
        (feed_loop, FeedHandle { tx })
    }

    /// A token the host can use to request a graceful shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Registers an externally constructed live source with the loop,
    /// announcing it to registration subscribers. Updates for unregistered
    /// sources are dropped (unless auto-registration is configured).
    pub fn register_source(&mut self, source: AlertSource) {
        if self.sources.contains_key(source.id()) {
            tracing::warn!(source = %source.id(), "source already registered");
            return;
        }
        tracing::info!(source = %source.id(), "source registered");
        self.sources.insert(source.id().clone(), source.clone());
        self.registered.emit(&source);
    }

    /// The registered source with identifier `id`, if any.
    pub fn source(&self, id: &SourceId) -> Option<AlertSource> {
        self.sources.get(id).cloned()
    }

    /// Subscribes to source registrations. This is where the host binds new
    /// source instances to the conditions that should watch them; the
    /// callback runs on the evaluation thread.
    pub fn on_source_registered(&self, callback: impl Fn(&AlertSource) + 'static) -> Subscription {
        self.registered.subscribe(callback)
    }

    /// Runs until cancellation or until every producer handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("evaluation loop cancellation signal received, shutting down...");
                    break;
                }

                update = self.rx.recv() => match update {
                    Some(update) => self.apply(update),
                    None => {
                        tracing::info!("all feed handles dropped, shutting down evaluation loop");
                        break;
                    }
                }
            }
        }

        // Teardown: invalidation is the one cancellation primitive the graph
        // understands, so every remaining source gets it before the loop is
        // gone.
        for (_, source) in self.sources.drain() {
            source.invalidate();
        }
        tracing::info!("evaluation loop has shut down");
    }

    fn apply(&mut self, update: FeedUpdate) {
        match update {
            FeedUpdate::Announce { source_id } => {
                if self.sources.contains_key(&source_id) {
                    tracing::warn!(source = %source_id, "announce for an already registered source");
                    return;
                }
                self.register_source(AlertSource::new(source_id));
            }
            FeedUpdate::Value { source_id, value } => match self.lookup(&source_id) {
                Some(source) => source.push_value(value),
                None => tracing::warn!(source = %source_id, "value update for unknown source dropped"),
            },
            FeedUpdate::Geometry { source_id, geometry } => match self.lookup(&source_id) {
                Some(source) => source.push_geometry(geometry),
                None => tracing::warn!(source = %source_id, "geometry update for unknown source dropped"),
            },
            FeedUpdate::Invalidate { source_id } => match self.sources.remove(&source_id) {
                Some(source) => source.invalidate(),
                None => tracing::warn!(source = %source_id, "invalidate for unknown source"),
            },
        }
    }

    fn lookup(&mut self, source_id: &SourceId) -> Option<AlertSource> {
        if let Some(source) = self.sources.get(source_id) {
            return Some(source.clone());
        }
        if self.auto_register {
            let source = AlertSource::new(source_id.clone());
            self.register_source(source.clone());
            return Some(source);
        }
        None
    }
}
