//! Blocking command client
//!
//! Used for user- and state-initiated commands where suspending the caller
//! until the response arrives is acceptable.

use serde_json::Value;
use tokio::runtime::Handle;

use crate::connection::{ConnectOptions, Connection, ConnectionState};
use crate::error::Result;
use crate::protocol::Command;

pub struct BlockingClient {
    handle: Handle,
    connection: Connection,
}

impl BlockingClient {
    /// Connect and handshake, blocking the calling thread.
    ///
    /// Must not be called from inside an async context.
    pub fn connect(handle: Handle, options: ConnectOptions) -> Result<Self> {
        let connection = handle.block_on(Connection::connect(options))?;
        Ok(Self { handle, connection })
    }

    /// Send a command and block until its response (or terminal failure)
    pub fn send(&mut self, command: Command, message: Value) -> Result<Value> {
        self.handle.block_on(self.connection.send(command, message))
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }
}
