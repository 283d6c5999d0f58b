//! Non-blocking frame poller
//!
//! The poller owns its own authenticated connection. Starting a poll lends
//! that connection to a task on the runtime; the caller checks back on later
//! ticks with [`Poller::try_finish`]. While a poll is in flight the
//! connection is away, so a second poll cannot start.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::connection::{ConnectOptions, Connection};
use crate::error::{Error, Result};
use crate::protocol::{parse_reply, Command, FramesQuery, FramesReply, PeekReply};

/// Result of one peek (plus the follow-up fetch when frames were missing)
#[derive(Debug, Clone)]
pub struct PollOutcome<F> {
    /// Latest frame number the server reported
    pub server_frame_no: u64,
    /// Frames fetched in this poll, as `(frame_no, record)` pairs
    pub frames: Vec<(u64, F)>,
}

type InFlight<F> = oneshot::Receiver<(Connection, Result<PollOutcome<F>>)>;

pub struct Poller<F> {
    handle: Handle,
    options: ConnectOptions,
    idle: Option<Connection>,
    in_flight: Option<InFlight<F>>,
}

impl<F> Poller<F>
where
    F: DeserializeOwned + Send + 'static,
{
    /// Connect the polling connection, blocking the calling thread
    pub fn connect(handle: Handle, options: ConnectOptions) -> Result<Self> {
        let connection = handle.block_on(Connection::connect(options.clone()))?;
        Ok(Self {
            handle,
            options,
            idle: Some(connection),
            in_flight: None,
        })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a poll in the background.
    ///
    /// `known` is the last frame the caller already holds; `None` means
    /// nothing is held yet and only the current frame number is wanted.
    pub fn start(&mut self, known: Option<u64>) -> Result<()> {
        let mut connection = self.idle.take().ok_or(Error::PollInFlight)?;
        let (tx, rx) = oneshot::channel();

        self.handle.spawn(async move {
            let result = poll_once(&mut connection, known).await;
            // The receiver is gone only when the poller itself was dropped
            let _ = tx.send((connection, result));
        });

        self.in_flight = Some(rx);
        Ok(())
    }

    /// Collect a finished poll without waiting
    pub fn try_finish(&mut self) -> Option<Result<PollOutcome<F>>> {
        let rx = self.in_flight.as_mut()?;

        match rx.try_recv() {
            Ok((connection, result)) => {
                self.in_flight = None;
                self.idle = Some(connection);
                Some(result)
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                // The task died with the connection; start over next time
                warn!("Poll task ended without a result");
                self.in_flight = None;
                self.idle = Some(Connection::new(self.options.clone()));
                Some(Err(Error::BrokenConnection))
            }
        }
    }
}

async fn poll_once<F: DeserializeOwned>(
    connection: &mut Connection,
    known: Option<u64>,
) -> Result<PollOutcome<F>> {
    connection.ensure_connected().await?;

    let peek: PeekReply = parse_reply(
        Command::Peek,
        connection.send(Command::Peek, Value::Null).await?,
    )?;

    let from = match known {
        Some(known) if peek.frame_no > known => known + 1,
        _ => {
            return Ok(PollOutcome {
                server_frame_no: peek.frame_no,
                frames: Vec::new(),
            })
        }
    };

    debug!(from = from, to = peek.frame_no, "Fetching missing frames");
    let query = FramesQuery { frame_no: from };
    let message = serde_json::to_value(query)
        .map_err(|e| Error::Protocol(format!("Serialization failed: {}", e)))?;
    let reply: FramesReply<F> = parse_reply(
        Command::GetFrames,
        connection.send(Command::GetFrames, message).await?,
    )?;

    Ok(PollOutcome {
        server_frame_no: peek.frame_no,
        frames: reply.frames,
    })
}
