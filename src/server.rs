//! Modbus TCP server
//!
//! One accept loop, one task per connection. A connection keeps a
//! receive buffer, extracts complete MBAP frames from it in arrival
//! order and writes each response before looking at the next frame, so
//! pipelined requests are answered in order.
//!
//! Failure scope:
//! - protocol errors become exception responses (see [`Dispatcher`])
//! - a malformed frame or an I/O error closes that connection only
//! - failing to bind is the only fatal error

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{encode_frame, FrameDecoder};
use crate::constants::RECEIVE_BUFFER_SIZE;
use crate::context::ServerContext;
use crate::dispatcher::Dispatcher;
use crate::error::{ModbusError, ModbusResult};
use crate::logging::hex_dump;
use crate::shutdown::Shutdown;

/// Pause after a failed accept (e.g. file descriptor exhaustion)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Counters {
    connections_total: AtomicU64,
    connections_active: AtomicU64,
    requests: AtomicU64,
    exceptions: AtomicU64,
    malformed_frames: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
}

/// Point-in-time server statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub connections_total: u64,
    pub connections_active: u64,
    pub requests: u64,
    pub exceptions: u64,
    pub malformed_frames: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

/// Shared handle for reading statistics while the server runs
#[derive(Debug, Clone)]
pub struct StatsHandle {
    started_at: DateTime<Utc>,
    counters: Arc<Counters>,
}

impl StatsHandle {
    pub fn snapshot(&self) -> ServerStats {
        let c = &self.counters;
        ServerStats {
            started_at: self.started_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            connections_total: c.connections_total.load(Ordering::Relaxed),
            connections_active: c.connections_active.load(Ordering::Relaxed),
            requests: c.requests.load(Ordering::Relaxed),
            exceptions: c.exceptions.load(Ordering::Relaxed),
            malformed_frames: c.malformed_frames.load(Ordering::Relaxed),
            bytes_received: c.bytes_received.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Modbus TCP slave bound to a listening socket
pub struct ModbusTcpServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
    stats: StatsHandle,
}

impl ModbusTcpServer {
    /// Bind the listening socket
    ///
    /// This is the only step whose failure should abort the process.
    pub async fn bind(addr: SocketAddr, context: Arc<ServerContext>) -> ModbusResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ModbusError::connection(format!("Failed to bind to {}: {}", addr, e)))?;

        info!(
            "Modbus TCP server listening on {} (units {:?})",
            listener.local_addr()?,
            context.unit_ids()
        );

        Ok(Self {
            listener,
            dispatcher: Dispatcher::new(context),
            stats: StatsHandle {
                started_at: Utc::now(),
                counters: Arc::new(Counters::default()),
            },
        })
    }

    pub fn local_addr(&self) -> ModbusResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        self.dispatcher.context()
    }

    /// Accept connections until `shutdown` fires
    pub async fn run(self, shutdown: Shutdown) -> ModbusResult<()> {
        let mut stop = shutdown.clone();
        loop {
            tokio::select! {
                _ = stop.wait() => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer, shutdown.clone()),
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Modbus TCP server stopped: {} connections, {} requests, {} exceptions",
            stats.connections_total, stats.requests, stats.exceptions
        );
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, shutdown: Shutdown) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
        }

        let counters = Arc::clone(&self.stats.counters);
        counters.connections_total.fetch_add(1, Ordering::Relaxed);
        counters.connections_active.fetch_add(1, Ordering::Relaxed);
        info!("Client connected: {}", peer);

        let connection = Connection {
            stream,
            peer,
            dispatcher: self.dispatcher.clone(),
            counters: Arc::clone(&counters),
        };

        tokio::spawn(async move {
            match connection.serve(shutdown).await {
                Ok(()) => info!("Client disconnected: {}", peer),
                Err(e @ ModbusError::Frame { .. }) => {
                    counters.malformed_frames.fetch_add(1, Ordering::Relaxed);
                    warn!("Closing connection {} on malformed frame: {}", peer, e);
                }
                Err(e) if e.is_connection_fatal() => warn!("Connection {} dropped: {}", peer, e),
                Err(e) => error!("Connection {} failed: {}", peer, e),
            }
            counters.connections_active.fetch_sub(1, Ordering::Relaxed);
        });
    }
}

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    counters: Arc<Counters>,
}

impl Connection {
    async fn serve(mut self, mut shutdown: Shutdown) -> ModbusResult<()> {
        let mut decoder = FrameDecoder::new();
        let mut rx = BytesMut::with_capacity(RECEIVE_BUFFER_SIZE);
        let mut tx = BytesMut::with_capacity(RECEIVE_BUFFER_SIZE);

        loop {
            while let Some(frame) = decoder.decode(&mut rx)? {
                trace!("{} <- {}", self.peer, hex_dump(&frame.pdu));

                let response = self.dispatcher.dispatch(frame.unit_id(), &frame.pdu);
                self.counters.requests.fetch_add(1, Ordering::Relaxed);
                if response.is_exception() {
                    self.counters.exceptions.fetch_add(1, Ordering::Relaxed);
                }

                tx.clear();
                encode_frame(frame.transaction_id(), frame.unit_id(), &response, &mut tx);
                trace!("{} -> {}", self.peer, hex_dump(&tx));
                self.stream.write_all(&tx).await?;
                self.counters
                    .bytes_sent
                    .fetch_add(tx.len() as u64, Ordering::Relaxed);
            }

            let n = tokio::select! {
                _ = shutdown.wait() => {
                    debug!("Shutdown signal received for client {}", self.peer);
                    return Ok(());
                }
                read = self.stream.read_buf(&mut rx) => read?,
            };

            if n == 0 {
                if !rx.is_empty() {
                    debug!(
                        "Client {} closed with {} bytes of an incomplete frame",
                        self.peer,
                        rx.len()
                    );
                }
                return Ok(());
            }
            self.counters
                .bytes_received
                .fetch_add(n as u64, Ordering::Relaxed);
        }
    }
}
