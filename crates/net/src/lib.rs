//! RateLimit Network Library
//!
//! TCP transport between the game client and the authoritative server.
//!
//! # Architecture
//!
//! - **Frame**: length-prefixed JSON payloads on the wire
//! - **Connection**: one socket, handshake first, one request at a time
//! - **Supervisor**: bounded retry on timeouts, one reconnect on a broken stream
//! - **BlockingClient**: command path that blocks the caller
//! - **Poller**: background `peek`/`get_frames` path, one poll in flight at most
//!
//! # Usage
//!
//! ```ignore
//! let mut client = BlockingClient::connect(runtime.handle().clone(), options.clone())?;
//! let party = client.send(Command::PartyRead, Value::Null)?;
//!
//! let mut poller: Poller<Frame> = Poller::connect(runtime.handle().clone(), options)?;
//! poller.start(Some(last_frame_no))?;
//! // ...later, once per tick
//! if let Some(outcome) = poller.try_finish() { /* merge */ }
//! ```

pub mod blocking;
pub mod connection;
pub mod error;
pub mod frame;
pub mod poll;
pub mod protocol;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use blocking::BlockingClient;
pub use connection::{ConnectOptions, Connection, ConnectionState};
pub use error::{Error, Result};
pub use poll::{PollOutcome, Poller};
pub use protocol::{Command, Request};
pub use supervisor::{Link, RetryPolicy};
