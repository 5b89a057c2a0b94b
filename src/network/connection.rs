use crate::config::{OverflowPolicy, PeerConfig};
use crate::network::codec::FrameCodec;
use crate::network::message::Event;
use crate::network::stats::MessageStats;
use crate::utils::{HarnessError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives every successfully decoded inbound message of a connection, in arrival order.
///
/// Handlers run on the connection's dispatcher task, never on the read loop. Up to
/// `queue_capacity` decoded events wait for a slow handler; beyond that the read loop
/// stops pulling from the socket until the handler catches up.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn on_event(&self, conn: &Connection, event: &Event);
}

/// Adapter turning a plain closure into an [`EventHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Connection, &Event) + Send + Sync + 'static,
{
    async fn on_event(&self, conn: &Connection, event: &Event) {
        (self.0)(conn, event)
    }
}

pub fn handler_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&Connection, &Event) + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Handler list shared between a client and the dispatchers of its connections.
pub type Handlers = Arc<RwLock<Vec<Arc<dyn EventHandler>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

struct Shared {
    peer_name: String,
    peer_addr: SocketAddr,
    running: AtomicBool,
    /// I/O tasks still holding a socket half
    live_io: AtomicUsize,
    cancel: CancellationToken,
    outbound: Mutex<Option<mpsc::Sender<Event>>>,
    capacity: usize,
    overflow: OverflowPolicy,
    stats: Arc<MessageStats>,
}

/// A running connection to a peer.
/// Cheap to clone; all clones refer to the same socket. Read, write and dispatch run in
/// background tasks until [`Connection::close`] or until either I/O loop stops.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.inner.peer_name)
            .field("addr", &self.inner.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Spawn read/write/dispatch tasks for `stream` on `runtime` and return the handle.
    pub fn spawn(
        runtime: &Handle,
        stream: TcpStream,
        peer_name: String,
        cfg: &PeerConfig,
        handlers: Handlers,
    ) -> Result<Connection> {
        cfg.validate()?;
        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let reader = FramedRead::new(read_half, FrameCodec::new(cfg.max_frame_length));
        let writer = FramedWrite::new(write_half, FrameCodec::new(cfg.max_frame_length));

        // outbound queue
        let (out_tx, out_rx) = mpsc::channel::<Event>(cfg.queue_capacity);
        // decoded inbound events on their way to the handlers
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<Event>(cfg.queue_capacity);

        let conn = Connection {
            inner: Arc::new(Shared {
                peer_name,
                peer_addr,
                running: AtomicBool::new(true),
                live_io: AtomicUsize::new(2),
                cancel: CancellationToken::new(),
                outbound: Mutex::new(Some(out_tx)),
                capacity: cfg.queue_capacity,
                overflow: cfg.overflow,
                stats: Arc::new(MessageStats::new()),
            }),
        };

        runtime.spawn(conn.clone().run_input(reader, dispatch_tx, cfg.frame_read_timeout()));
        runtime.spawn(conn.clone().run_output(writer, out_rx));
        runtime.spawn(conn.clone().run_dispatch(handlers, dispatch_rx));

        info!("[{}] connected to {}", conn.inner.peer_name, peer_addr);
        Ok(conn)
    }

    pub fn peer_name(&self) -> &str {
        &self.inner.peer_name
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_running() {
            ConnectionState::Connected
        } else if self.inner.live_io.load(Ordering::Acquire) > 0 {
            ConnectionState::Closing
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn stats(&self) -> Arc<MessageStats> {
        self.inner.stats.clone()
    }

    /// Queue `event` for transmission without waiting.
    pub fn send(&self, event: Event) -> Result<()> {
        let name = &self.inner.peer_name;
        let outbound = self.inner.outbound.lock();
        let tx = match outbound.as_ref() {
            Some(tx) if self.is_running() => tx,
            _ => return Err(HarnessError::NotConnected(name.clone())),
        };
        let case = event.results_case();
        debug!("{} <--p2p-- {}", name, case);
        match tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => match self.inner.overflow {
                OverflowPolicy::Fail => Err(HarnessError::QueueOverflow {
                    peer: name.clone(),
                    capacity: self.inner.capacity,
                }),
                OverflowPolicy::Drop => {
                    warn!(
                        "Not writing event {} to peer {} because write queue is full.",
                        case, name
                    );
                    Ok(())
                }
            },
            Err(TrySendError::Closed(_)) => Err(HarnessError::NotConnected(name.clone())),
        }
    }

    /// Stop both I/O loops and drop the queue. Returns true only for the call that
    /// actually closed the connection; every later (or concurrent) call is a no-op.
    pub fn close(&self) -> bool {
        if self
            .inner
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        debug!("[{}] closing connection", self.inner.peer_name);
        self.inner.outbound.lock().take();
        self.inner.cancel.cancel();
        true
    }

    /// Resolves once the connection has started closing, for whatever reason.
    pub async fn closed(&self) {
        self.inner.cancel.cancelled().await
    }

    async fn run_input(
        self,
        mut reader: FramedRead<OwnedReadHalf, FrameCodec>,
        dispatch: mpsc::Sender<Event>,
        window: Duration,
    ) {
        let name = self.inner.peer_name.clone();
        // buffered byte count seen at the previous idle tick
        let mut stalled_at = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => {
                    debug!("[{}] Input stream task shutting down", name);
                    break;
                }
                next = timeout(window, reader.next()) => next,
            };
            match next {
                Err(_) => {
                    let buffered = reader.read_buffer().len();
                    if buffered > 0 && buffered == stalled_at {
                        error!(
                            "{} misbehaved! Incomplete frame stalled with {} bytes buffered (head {}).",
                            name,
                            buffered,
                            hex::encode(&reader.read_buffer()[..buffered.min(8)])
                        );
                        break;
                    }
                    stalled_at = buffered;
                }
                Ok(None) => {
                    debug!("[{}] Disconnected from peer - EOF.", name);
                    break;
                }
                Ok(Some(Err(e))) => {
                    warn!("[{}] Socket error: {}", name, e);
                    break;
                }
                Ok(Some(Ok(frame))) => {
                    stalled_at = 0;
                    match Event::from_frame(&name, &frame) {
                        Ok(event) => {
                            let case = event.results_case();
                            debug!("{} --p2p--> {}", name, case);
                            self.inner.stats.record_received(case);
                            let delivered = tokio::select! {
                                biased;
                                _ = self.inner.cancel.cancelled() => false,
                                sent = dispatch.send(event) => sent.is_ok(),
                            };
                            if !delivered {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("{} misbehaved! Can't parse Event of size {}: {}", name, frame.len(), e);
                            break;
                        }
                    }
                }
            }
        }
        drop(reader);
        self.inner.live_io.fetch_sub(1, Ordering::AcqRel);
        self.close();
    }

    async fn run_output(
        self,
        mut writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
        mut queue: mpsc::Receiver<Event>,
    ) {
        let name = self.inner.peer_name.clone();
        loop {
            let event = tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => {
                    debug!("[{}] Output stream task shutting down - Cancelled", name);
                    break;
                }
                event = queue.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("[{}] outbound queue closed", name);
                        break;
                    }
                },
            };
            let case = event.results_case();
            let sent = tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => break,
                sent = writer.send(event.to_frame()) => sent,
            };
            if let Err(e) = sent {
                warn!("[{}] Error in output stream task: {}", name, e);
                break;
            }
            self.inner.stats.record_sent(case);
        }
        queue.close();
        drop(writer);
        self.inner.live_io.fetch_sub(1, Ordering::AcqRel);
        self.close();
    }

    async fn run_dispatch(self, handlers: Handlers, mut inbound: mpsc::Receiver<Event>) {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => break,
                event = inbound.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let current: Vec<Arc<dyn EventHandler>> = handlers.read().clone();
            for handler in current {
                tokio::select! {
                    biased;
                    _ = self.inner.cancel.cancelled() => return,
                    _ = handler.on_event(&self, &event) => {}
                }
            }
        }
    }
}
