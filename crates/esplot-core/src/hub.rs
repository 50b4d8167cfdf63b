//! Broadcast hub: the single owner of the viewer session set.
//!
//! Every mutation of the set goes through one control loop ([`Hub::run`]).
//! Register, unregister and broadcast requests share one ordered event queue,
//! so the loop handles them one at a time in the order they were handed in.
//! Other tasks only ever hold a [`HubHandle`].
//!
//! Fan-out never waits on a viewer: each payload is offered to every session
//! queue with `try_send`, and a session whose queue is full is evicted on the
//! spot.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{EsplotError, EsplotResult};
use crate::payload::Payload;
use crate::session::{SessionHandle, SessionId};

/// Counters reported by the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStats {
    /// Sessions currently registered.
    pub sessions: usize,
    /// Payloads fanned out so far.
    pub broadcasts: u64,
    /// Successful enqueues across all sessions.
    pub deliveries: u64,
    /// Sessions dropped during fan-out because their queue was full or closed.
    pub evictions: u64,
}

/// A request for the control loop.
#[derive(Debug)]
enum HubEvent {
    Register(SessionHandle),
    Unregister(SessionId),
    Broadcast(Payload),
    Stats(oneshot::Sender<HubStats>),
}

/// Cloneable sender side of the hub's event queue.
#[derive(Clone, Debug)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl HubHandle {
    async fn send(&self, event: HubEvent) -> EsplotResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| EsplotError::HubClosed)
    }

    /// Hand a session to the hub. Waits for room in the event queue, never
    /// for any viewer.
    pub async fn register(&self, session: SessionHandle) -> EsplotResult<()> {
        self.send(HubEvent::Register(session)).await
    }

    /// Ask the hub to drop a session. Unknown ids are ignored.
    pub async fn unregister(&self, id: SessionId) -> EsplotResult<()> {
        self.send(HubEvent::Unregister(id)).await
    }

    /// Queue a payload for fan-out. Returns once the hub has accepted it,
    /// without waiting for delivery.
    pub async fn broadcast(&self, payload: Payload) -> EsplotResult<()> {
        self.send(HubEvent::Broadcast(payload)).await
    }

    /// Current counters. Answered after every event already handed to the
    /// hub has been processed.
    pub async fn stats(&self) -> EsplotResult<HubStats> {
        let (tx, rx) = oneshot::channel();
        self.send(HubEvent::Stats(tx)).await?;
        rx.await.map_err(|_| EsplotError::HubClosed)
    }

    /// Stop the control loop. All sessions are released.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// The control loop state.
pub struct Hub {
    sessions: HashMap<SessionId, SessionHandle>,
    events: mpsc::Receiver<HubEvent>,
    shutdown_rx: watch::Receiver<bool>,
    stats: HubStats,
}

impl Hub {
    /// Create a hub whose event queue holds `capacity` pending events.
    pub fn new(capacity: usize) -> (Self, HubHandle) {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let hub = Self {
            sessions: HashMap::new(),
            events: events_rx,
            shutdown_rx,
            stats: HubStats::default(),
        };
        let handle = HubHandle {
            events: events_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        };
        (hub, handle)
    }

    /// Create a hub and run its control loop on a new task.
    pub fn spawn(capacity: usize) -> (HubHandle, JoinHandle<HubStats>) {
        let (hub, handle) = Self::new(capacity);
        (handle, tokio::spawn(hub.run()))
    }

    /// Process events until shutdown or until every handle is gone.
    pub async fn run(mut self) -> HubStats {
        info!("Broadcast hub started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }

        let abandoned = self.sessions.len();
        self.sessions.clear();
        info!(abandoned, "Broadcast hub stopped");
        self.snapshot()
    }

    fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register(session) => self.register(session),
            HubEvent::Unregister(id) => self.unregister(id),
            HubEvent::Broadcast(payload) => self.broadcast(payload),
            HubEvent::Stats(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn register(&mut self, session: SessionHandle) {
        let id = session.id();
        self.sessions.insert(id, session);
        info!(session_id = %id, sessions = self.sessions.len(), "Viewer session registered");
    }

    fn unregister(&mut self, id: SessionId) {
        // Removing the handle closes the session's queue; absent ids are a no-op.
        if self.sessions.remove(&id).is_some() {
            info!(session_id = %id, sessions = self.sessions.len(), "Viewer session unregistered");
        } else {
            debug!(session_id = %id, "Unregister for unknown session ignored");
        }
    }

    fn broadcast(&mut self, payload: Payload) {
        self.stats.broadcasts += 1;
        let mut delivered = 0u64;
        let mut to_evict = Vec::new();

        for (id, session) in &self.sessions {
            match session.try_deliver(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(session_id = %id, "Viewer queue full, evicting slow session");
                    to_evict.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session_id = %id, "Viewer queue closed, dropping session");
                    to_evict.push(*id);
                }
            }
        }

        for id in &to_evict {
            if self.sessions.remove(id).is_some() {
                self.stats.evictions += 1;
            }
        }
        self.stats.deliveries += delivered;

        debug!(
            bytes = payload.len(),
            recipients = delivered,
            evicted = to_evict.len(),
            queued_ms = payload.age().num_milliseconds(),
            "Broadcast payload"
        );
    }

    fn snapshot(&self) -> HubStats {
        HubStats {
            sessions: self.sessions.len(),
            ..self.stats
        }
    }
}
