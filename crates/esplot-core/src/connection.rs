//! Connection adapter seam between a session and its transport.
//!
//! A transport (WebSocket, in-memory pipe, ...) implements [`Connection`] and
//! splits into an outbound half written by the session's outbound pump and an
//! inbound half drained by its inbound pump. The two halves are driven by
//! independent tasks, so neither may rely on the other making progress.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::payload::Payload;

/// A message received from a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Any data frame. Viewers have nothing meaningful to say, so these are
    /// drained and discarded.
    Message(Bytes),
    /// The viewer closed the connection.
    Close,
}

/// Write side of a viewer connection.
#[async_trait]
pub trait OutboundHalf: Send + 'static {
    /// Write one payload as one discrete message.
    async fn send(&mut self, payload: &Payload) -> Result<(), TransportError>;

    /// Close the transport. Must tolerate an already-closed peer.
    async fn close(&mut self);
}

/// Read side of a viewer connection.
#[async_trait]
pub trait InboundHalf: Send + 'static {
    /// Next inbound message, or `None` once the stream has ended.
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;
}

/// One bidirectional viewer transport.
pub trait Connection: Send + 'static {
    type Outbound: OutboundHalf;
    type Inbound: InboundHalf;

    fn split(self) -> (Self::Outbound, Self::Inbound);
}

#[cfg(test)]
pub(crate) mod memory {
    //! Channel-backed connection used by session tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    /// Test-side view of an in-memory connection.
    pub struct Peer {
        /// Payloads the session wrote, in order.
        pub written: mpsc::UnboundedReceiver<Payload>,
        /// Feed inbound messages to the session. Dropping it ends the stream.
        pub inbound: mpsc::UnboundedSender<Result<Inbound, TransportError>>,
        /// Number of times the outbound half was closed.
        pub closes: Arc<AtomicUsize>,
    }

    impl Peer {
        pub fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    pub struct MemoryConnection {
        written: mpsc::UnboundedSender<Payload>,
        inbound: mpsc::UnboundedReceiver<Result<Inbound, TransportError>>,
        closes: Arc<AtomicUsize>,
        stalled: bool,
        fail_writes: bool,
        panic_on_write: bool,
    }

    pub struct MemoryOutbound {
        written: mpsc::UnboundedSender<Payload>,
        closes: Arc<AtomicUsize>,
        stalled: bool,
        fail_writes: bool,
        panic_on_write: bool,
    }

    pub struct MemoryInbound {
        inbound: mpsc::UnboundedReceiver<Result<Inbound, TransportError>>,
    }

    /// A healthy connection.
    pub fn pair() -> (MemoryConnection, Peer) {
        build(false, false)
    }

    /// A connection whose writes never complete.
    pub fn stalled() -> (MemoryConnection, Peer) {
        build(true, false)
    }

    /// A connection whose writes always fail.
    pub fn broken() -> (MemoryConnection, Peer) {
        build(false, true)
    }

    /// A connection whose first write panics.
    pub fn panicking() -> (MemoryConnection, Peer) {
        let (mut conn, peer) = build(false, false);
        conn.panic_on_write = true;
        (conn, peer)
    }

    fn build(stalled: bool, fail_writes: bool) -> (MemoryConnection, Peer) {
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let conn = MemoryConnection {
            written: written_tx,
            inbound: inbound_rx,
            closes: closes.clone(),
            stalled,
            fail_writes,
            panic_on_write: false,
        };
        let peer = Peer {
            written: written_rx,
            inbound: inbound_tx,
            closes,
        };
        (conn, peer)
    }

    impl Connection for MemoryConnection {
        type Outbound = MemoryOutbound;
        type Inbound = MemoryInbound;

        fn split(self) -> (MemoryOutbound, MemoryInbound) {
            (
                MemoryOutbound {
                    written: self.written,
                    closes: self.closes,
                    stalled: self.stalled,
                    fail_writes: self.fail_writes,
                    panic_on_write: self.panic_on_write,
                },
                MemoryInbound {
                    inbound: self.inbound,
                },
            )
        }
    }

    #[async_trait]
    impl OutboundHalf for MemoryOutbound {
        async fn send(&mut self, payload: &Payload) -> Result<(), TransportError> {
            if self.stalled {
                std::future::pending::<()>().await;
            }
            if self.panic_on_write {
                panic!("write panicked");
            }
            if self.fail_writes {
                return Err(TransportError::send("broken pipe"));
            }
            self.written
                .send(payload.clone())
                .map_err(|_| TransportError::Closed)
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl InboundHalf for MemoryInbound {
        async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
            self.inbound.recv().await
        }
    }
}
