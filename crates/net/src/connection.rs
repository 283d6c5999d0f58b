//! TCP connection to the game server
//!
//! A `Connection` owns one stream, performs the mandatory handshake and
//! exchanges one request for one response at a time. Failures are fed
//! through the retry supervisor so callers only ever see terminal errors.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{decode_response, read_frame, write_frame};
use crate::protocol::{response_error, Command, Handshake, Request};
use crate::supervisor::{send_with_policy, Link, RetryPolicy};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything needed to reach and authenticate with the server
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// Stable per-installation identity presented in the handshake
    pub node: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry_delay: Duration,
}

impl ConnectOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A single authenticated stream to the server
pub struct Connection {
    options: ConnectOptions,
    stream: Option<TcpStream>,
    state: ConnectionState,
    /// Set when an exchange was abandoned mid-frame; the stream must be
    /// re-opened before it can carry another request.
    desynced: bool,
    /// A handshake has succeeded at least once on this handle
    authenticated: bool,
}

impl Connection {
    /// Create an unconnected handle
    pub fn new(options: ConnectOptions) -> Self {
        Self {
            options,
            stream: None,
            state: ConnectionState::Disconnected,
            desynced: false,
            authenticated: false,
        }
    }

    /// Open the stream and complete the handshake
    pub async fn connect(options: ConnectOptions) -> Result<Self> {
        let mut connection = Self::new(options);
        connection.establish().await?;
        Ok(connection)
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connect if the stream was never opened or has been lost
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.state != ConnectionState::Connected {
            self.establish().await?;
        }
        Ok(())
    }

    /// Send a command and wait for its response
    pub async fn send(&mut self, command: Command, message: Value) -> Result<Value> {
        let request = Request::new(command, message);
        debug!(id = %request.id, command = %command, "Sending request");

        let policy = RetryPolicy::commands(self.options.retry_delay);
        send_with_policy(self, &request, policy).await
    }

    /// Drop the stream
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            info!(addr = %self.options.addr(), "Disconnected from server");
        }
        self.state = ConnectionState::Disconnected;
        self.desynced = false;
    }

    /// Open the socket and run the handshake; any failure leaves the
    /// connection `Disconnected`.
    async fn establish(&mut self) -> Result<()> {
        self.close();
        self.state = ConnectionState::Connecting;

        let result = self.open_and_handshake().await;
        match &result {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.authenticated = true;
                info!(addr = %self.options.addr(), node = %self.options.node, "Connected to server");
            }
            Err(e) => {
                warn!(addr = %self.options.addr(), error = %e, "Failed to connect");
                self.close();
            }
        }
        result
    }

    async fn open_and_handshake(&mut self) -> Result<()> {
        self.open().await?;

        let handshake = Handshake {
            node: self.options.node.clone(),
            password: self.options.password.clone(),
        };
        let message = serde_json::to_value(&handshake)
            .map_err(|e| Error::Protocol(format!("Serialization failed: {}", e)))?;
        let request = Request::new(Command::Handshake, message);
        let policy = RetryPolicy::handshake(self.options.retry_delay);

        let response = send_with_policy(&mut Handshaking(self), &request, policy)
            .await
            .map_err(|e| Error::HandshakeFailed(Box::new(e)))?;

        if let Some(reason) = response_error(&response) {
            return Err(Error::HandshakeRejected(reason.to_string()));
        }

        Ok(())
    }

    /// Resolve the server address and open the socket within the timeout
    async fn open(&mut self) -> Result<()> {
        let addr = self.options.addr();
        info!(addr = %addr, "Connecting to server");

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr)
            .await
            .map_err(|_| Error::AddressResolution(addr.clone()))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::AddressResolution(addr));
        }

        let stream = tokio::time::timeout(
            self.options.connect_timeout,
            TcpStream::connect(addrs.as_slice()),
        )
        .await
        .map_err(|_| Error::ConnectTimeout(addr.clone()))?
        .map_err(|e| match e.kind() {
            io::ErrorKind::ConnectionRefused => Error::ConnectRefused(addr.clone()),
            io::ErrorKind::TimedOut => Error::ConnectTimeout(addr.clone()),
            _ => Error::Io(e),
        })?;
        stream.set_nodelay(true)?;

        self.stream = Some(stream);
        self.desynced = false;
        Ok(())
    }

    /// One write + read on the current stream, bounded by the request timeout
    async fn round_trip(&mut self, request: &Request) -> Result<Value> {
        let payload = request
            .to_bytes()
            .map_err(|e| Error::Protocol(format!("Serialization failed: {}", e)))?;
        let timeout = self.options.request_timeout;
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let outcome = tokio::time::timeout(timeout, async {
            write_frame(&mut *stream, &payload).await?;
            read_frame(&mut *stream).await
        })
        .await;

        let result = match outcome {
            Ok(Ok(bytes)) => return decode_response(&bytes),
            Ok(Err(e)) => e,
            Err(_) => Error::RequestTimeout,
        };

        if result.is_transient() {
            self.desynced = true;
        } else if result.is_broken() {
            self.stream = None;
            self.state = ConnectionState::Disconnected;
        }
        Err(result)
    }
}

impl Link for Connection {
    fn exchange(&mut self, request: &Request) -> impl Future<Output = Result<Value>> + Send {
        async move {
            if self.state != ConnectionState::Connected {
                // A stream lost mid-session is eligible for a reconnect; one
                // that never completed a handshake is not.
                return Err(if self.authenticated {
                    Error::BrokenConnection
                } else {
                    Error::NotConnected
                });
            }

            if self.desynced {
                debug!("Re-opening desynchronised stream");
                self.establish().await?;
            }

            self.round_trip(request).await
        }
    }

    fn reconnect(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.establish()
    }
}

/// Link used while the handshake itself is in flight; the connection is not
/// yet `Connected` and must never recurse into a full reconnect.
struct Handshaking<'a>(&'a mut Connection);

impl Link for Handshaking<'_> {
    fn exchange(&mut self, request: &Request) -> impl Future<Output = Result<Value>> + Send {
        async move {
            if self.0.desynced {
                self.0.open().await?;
            }
            self.0.round_trip(request).await
        }
    }

    fn reconnect(&mut self) -> impl Future<Output = Result<()>> + Send {
        async { Err(Error::BrokenConnection) }
    }
}
