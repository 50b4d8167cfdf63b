//! Viewer sessions.
//!
//! A session pairs one [`Connection`] with a bounded outbound queue. The hub
//! keeps a [`SessionHandle`] (the write end of the queue); the session keeps
//! the [`SessionQueue`] (the read end) and runs two pumps:
//!
//! - the outbound pump drains the queue into the connection, FIFO;
//! - the inbound pump drains and discards whatever the viewer sends.
//!
//! Whichever pump notices a failure first sends the single unregister event.
//! Dropping the handle (unregister, eviction or hub shutdown) releases the
//! session, which stops the outbound pump and closes the connection.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::connection::{Connection, Inbound, InboundHalf, OutboundHalf};
use crate::error::EsplotResult;
use crate::hub::HubHandle;
use crate::payload::Payload;

/// Upper bound on a graceful transport close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Opaque session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The hub's side of a session: the write end of its outbound queue.
///
/// Dropping the handle closes the queue and releases the session.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    outbound: mpsc::Sender<Payload>,
    _release: oneshot::Sender<()>,
}

impl SessionHandle {
    /// Create a session handle with a fresh outbound queue of `capacity`
    /// payloads (at least one).
    pub fn new(capacity: usize) -> (Self, SessionQueue) {
        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (release_tx, release_rx) = oneshot::channel();
        let handle = Self {
            id,
            outbound: tx,
            _release: release_tx,
        };
        let queue = SessionQueue {
            id,
            payloads: rx,
            released: release_rx,
        };
        (handle, queue)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Enqueue without waiting. Fails when the queue is full or the session
    /// has stopped reading it.
    pub(crate) fn try_deliver(&self, payload: Payload) -> Result<(), TrySendError<Payload>> {
        self.outbound.try_send(payload)
    }
}

/// The session's side of its outbound queue.
#[derive(Debug)]
pub struct SessionQueue {
    id: SessionId,
    payloads: mpsc::Receiver<Payload>,
    released: oneshot::Receiver<()>,
}

impl SessionQueue {
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.payloads.try_recv().ok()
    }

    /// Whether the hub has dropped this session's handle.
    pub fn is_released(&mut self) -> bool {
        matches!(
            self.released.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        )
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The hub dropped the session (unregistered, evicted, or shut down).
    Released,
    /// Writing to the viewer failed.
    WriteFailed,
    /// The viewer closed the connection.
    PeerClosed,
    /// Reading from the viewer failed.
    ReadFailed,
}

/// Close-once guard shared by both pumps.
struct Teardown {
    id: SessionId,
    hub: HubHandle,
    fired: AtomicBool,
}

impl Teardown {
    /// Send the single unregister event for this session. Later calls, and
    /// calls after the hub already released the session, do nothing.
    async fn fire(&self, reason: TeardownReason) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(session_id = %self.id, ?reason, "Tearing down session");
        if reason == TeardownReason::Released {
            return;
        }
        if self.hub.unregister(self.id).await.is_err() {
            debug!(session_id = %self.id, "Hub already stopped, nothing to unregister");
        }
    }
}

/// One viewer connection bridged to the hub.
pub struct ClientSession<C: Connection> {
    connection: C,
    queue: SessionQueue,
    hub: HubHandle,
}

impl<C: Connection> ClientSession<C> {
    pub fn new(connection: C, queue: SessionQueue, hub: HubHandle) -> Self {
        Self {
            connection,
            queue,
            hub,
        }
    }

    /// Run the session on its own task.
    pub fn spawn(self) -> JoinHandle<TeardownReason> {
        tokio::spawn(self.run())
    }

    /// Drive both pumps until the session ends, then close the connection.
    pub async fn run(self) -> TeardownReason {
        let id = self.queue.id;
        let (mut outbound, mut inbound) = self.connection.split();
        let SessionQueue {
            mut payloads,
            mut released,
            ..
        } = self.queue;
        let teardown = Arc::new(Teardown {
            id,
            hub: self.hub,
            fired: AtomicBool::new(false),
        });

        let send_teardown = teardown.clone();
        let mut send_task = tokio::spawn(async move {
            let reason = tokio::select! {
                reason = pump_outbound(id, &mut payloads, &mut outbound) => reason,
                _ = &mut released => TeardownReason::Released,
            };
            send_teardown.fire(reason).await;
            if tokio::time::timeout(CLOSE_TIMEOUT, outbound.close())
                .await
                .is_err()
            {
                warn!(session_id = %id, "Timed out closing viewer connection");
            }
            reason
        });

        let recv_teardown = teardown.clone();
        let mut recv_task = tokio::spawn(async move {
            let reason = pump_inbound(id, &mut inbound).await;
            recv_teardown.fire(reason).await;
            reason
        });

        // The first pump to finish decides the reason. An inbound failure
        // reaches the outbound pump through the hub releasing the session.
        // A pump that panicked never fired; fire on its behalf.
        let reason = tokio::select! {
            res = &mut send_task => {
                recv_task.abort();
                let reason = res.unwrap_or_else(|e| {
                    warn!(session_id = %id, error = %e, "Outbound pump task failed");
                    TeardownReason::WriteFailed
                });
                teardown.fire(reason).await;
                reason
            }
            res = &mut recv_task => {
                let reason = res.unwrap_or_else(|e| {
                    warn!(session_id = %id, error = %e, "Inbound pump task failed");
                    TeardownReason::ReadFailed
                });
                teardown.fire(reason).await;
                if let Err(e) = send_task.await {
                    warn!(session_id = %id, error = %e, "Outbound pump task failed");
                }
                reason
            }
        };

        info!(session_id = %id, ?reason, "Viewer session ended");
        reason
    }
}

async fn pump_outbound<O: OutboundHalf>(
    id: SessionId,
    payloads: &mut mpsc::Receiver<Payload>,
    outbound: &mut O,
) -> TeardownReason {
    while let Some(payload) = payloads.recv().await {
        if let Err(e) = outbound.send(&payload).await {
            debug!(session_id = %id, error = %e, "Viewer write failed");
            return TeardownReason::WriteFailed;
        }
        trace!(session_id = %id, bytes = payload.len(), "Payload written");
    }
    TeardownReason::Released
}

async fn pump_inbound<I: InboundHalf>(id: SessionId, inbound: &mut I) -> TeardownReason {
    loop {
        match inbound.recv().await {
            Some(Ok(Inbound::Message(bytes))) => {
                trace!(session_id = %id, bytes = bytes.len(), "Discarding viewer message");
            }
            Some(Ok(Inbound::Close)) | None => return TeardownReason::PeerClosed,
            Some(Err(e)) => {
                debug!(session_id = %id, error = %e, "Viewer read failed");
                return TeardownReason::ReadFailed;
            }
        }
    }
}

/// Turn an upgraded connection into a live, registered session.
///
/// The session is registered before its pumps start, so its own unregister
/// event can never overtake its registration. If the hub is gone the
/// connection is dropped and nothing stays reachable.
pub async fn attach<C: Connection>(
    connection: C,
    hub: &HubHandle,
    queue_capacity: usize,
) -> EsplotResult<(SessionId, JoinHandle<TeardownReason>)> {
    let (handle, queue) = SessionHandle::new(queue_capacity);
    let id = handle.id();
    hub.register(handle).await?;
    let task = ClientSession::new(connection, queue, hub.clone()).spawn();
    Ok((id, task))
}
