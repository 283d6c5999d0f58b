//! Game context shared by every state
//!
//! Owns the settings, the local identity, both transports and the frame
//! ledger. Everything here lives on the driving thread.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ratelimit_core::{Absorb, FrameLedger, FrameRecord, PlayerId, Settings};
use ratelimit_net::{BlockingClient, Command, ConnectOptions, PollOutcome, Poller};
use serde_json::Value;
use tokio::runtime::Handle;

use crate::error::{AppError, Result};

/// Consecutive connect-class poll failures tolerated before giving up
const MAX_POLL_FAILURES: u32 = 3;

/// Command path: one request at a time, caller waits for the reply
pub trait Commands {
    fn send(&mut self, command: Command, message: Value) -> ratelimit_net::Result<Value>;
}

impl Commands for BlockingClient {
    fn send(&mut self, command: Command, message: Value) -> ratelimit_net::Result<Value> {
        BlockingClient::send(self, command, message)
    }
}

/// Poll path: checked once per tick, never waited on
pub trait FramePoll {
    fn start(&mut self, known: Option<u64>) -> ratelimit_net::Result<()>;
    fn try_finish(&mut self) -> Option<ratelimit_net::Result<PollOutcome<FrameRecord>>>;
    fn is_in_flight(&self) -> bool;
}

impl FramePoll for Poller<FrameRecord> {
    fn start(&mut self, known: Option<u64>) -> ratelimit_net::Result<()> {
        Poller::start(self, known)
    }

    fn try_finish(&mut self) -> Option<ratelimit_net::Result<PollOutcome<FrameRecord>>> {
        Poller::try_finish(self)
    }

    fn is_in_flight(&self) -> bool {
        Poller::is_in_flight(self)
    }
}

/// Both transports, authenticated with the same identity
pub struct Transports {
    pub commands: Box<dyn Commands>,
    pub poll: Box<dyn FramePoll>,
}

/// Opens the transports
pub trait Connector {
    fn connect(&mut self, options: ConnectOptions) -> ratelimit_net::Result<Transports>;
}

/// Connects real sockets on the tokio runtime
pub struct RuntimeConnector {
    handle: Handle,
}

impl RuntimeConnector {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Connector for RuntimeConnector {
    fn connect(&mut self, options: ConnectOptions) -> ratelimit_net::Result<Transports> {
        let commands = BlockingClient::connect(self.handle.clone(), options.clone())?;
        let poller: Poller<FrameRecord> = Poller::connect(self.handle.clone(), options)?;
        Ok(Transports {
            commands: Box::new(commands),
            poll: Box::new(poller),
        })
    }
}

pub struct Game {
    pub settings: Settings,
    pub me: PlayerId,
    pub ledger: FrameLedger,
    reports_dir: PathBuf,
    connector: Box<dyn Connector>,
    transports: Option<Transports>,
    since_poll: Duration,
    poll_failures: u32,
    /// A gameplay state replayed from the ledger since the last poll pump
    frames_held: bool,
}

impl Game {
    pub fn new(
        settings: Settings,
        me: PlayerId,
        connector: Box<dyn Connector>,
        reports_dir: PathBuf,
    ) -> Self {
        // First poll goes out on the first tick after connecting
        let since_poll = settings.game.peek_interval();
        Self {
            settings,
            me,
            ledger: FrameLedger::new(),
            reports_dir,
            connector,
            transports: None,
            since_poll,
            poll_failures: 0,
            frames_held: false,
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub fn is_connected(&self) -> bool {
        self.transports.is_some()
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let server = &self.settings.server;
        let net = &self.settings.net;
        ConnectOptions {
            host: server.host.clone(),
            port: server.port,
            node: self.me.to_string(),
            password: server.password.clone(),
            connect_timeout: net.connect_timeout(),
            request_timeout: net.request_timeout(),
            retry_delay: net.retry_delay(),
        }
    }

    /// Open both transports; blocks until both handshakes resolve
    pub fn connect(&mut self) -> Result<()> {
        let options = self.connect_options();
        tracing::info!(addr = %options.addr(), node = %options.node, "Connecting to server");
        let transports = self.connector.connect(options)?;
        self.transports = Some(transports);
        tracing::info!("Connected");
        Ok(())
    }

    /// Drop both transports; nothing is polled afterwards
    pub fn disconnect(&mut self) {
        if self.transports.take().is_some() {
            tracing::info!("Disconnected");
        }
    }

    /// Send on the command path and wait for the reply
    pub fn send(&mut self, command: Command, message: Value) -> Result<Value> {
        let transports = self
            .transports
            .as_mut()
            .ok_or(ratelimit_net::Error::NotConnected)?;
        tracing::debug!(command = %command, "Sending command");
        Ok(transports.commands.send(command, message)?)
    }

    /// Keep the ledger's frames through the next poll pump. Called each tick
    /// by the state replaying them; otherwise they are dropped as they arrive.
    pub fn hold_frames(&mut self) {
        self.frames_held = true;
    }

    /// Collect a finished poll into the ledger and start the next one when
    /// the interval has passed.
    ///
    /// Timeouts and broken streams are logged and retried on the next
    /// interval. Repeated connect failures and anything else the transport
    /// could not resolve are returned.
    pub fn pump_poll(&mut self, dt: Duration) -> Result<Option<Absorb>> {
        if !std::mem::take(&mut self.frames_held) {
            self.ledger.prune_through(self.ledger.client_frame_no());
        }

        let Some(transports) = self.transports.as_mut() else {
            return Ok(None);
        };

        let mut absorbed = None;
        match transports.poll.try_finish() {
            Some(Ok(outcome)) => {
                self.poll_failures = 0;
                absorbed = Some(self.ledger.absorb(outcome.server_frame_no, outcome.frames));
            }
            Some(Err(e)) if e.is_connect_failure() => {
                tracing::warn!(error = %e, failures = self.poll_failures + 1, "Poll could not reach server");
                self.poll_failures += 1;
                if self.poll_failures >= MAX_POLL_FAILURES {
                    return Err(AppError::Net(e));
                }
            }
            Some(Err(e)) if e.is_transient() || e.is_broken() => {
                tracing::warn!(error = %e, "Poll failed, retrying next interval");
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Poll failed");
                return Err(AppError::Net(e));
            }
            None => {}
        }

        self.since_poll += dt;
        if self.since_poll >= self.settings.game.peek_interval() && !transports.poll.is_in_flight() {
            self.since_poll = Duration::ZERO;
            transports.poll.start(self.ledger.known())?;
        }

        Ok(absorbed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transports for state and loop tests

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    /// What the fake server saw and will answer
    #[derive(Default)]
    pub struct Script {
        pub sent: Vec<(Command, Value)>,
        pub replies: VecDeque<ratelimit_net::Result<Value>>,
        pub polls: VecDeque<ratelimit_net::Result<PollOutcome<FrameRecord>>>,
        pub poll_starts: Vec<Option<u64>>,
        pub connects: u32,
        pub connect_error: Option<fn() -> ratelimit_net::Error>,
    }

    impl Script {
        pub fn count(&self, command: Command) -> usize {
            self.sent.iter().filter(|(c, _)| *c == command).count()
        }
    }

    pub type Shared = Rc<RefCell<Script>>;

    struct FakeCommands(Shared);

    impl Commands for FakeCommands {
        fn send(&mut self, command: Command, message: Value) -> ratelimit_net::Result<Value> {
            let mut script = self.0.borrow_mut();
            script.sent.push((command, message));
            script
                .replies
                .pop_front()
                .unwrap_or_else(|| Ok(Value::Object(Default::default())))
        }
    }

    struct FakePoll {
        script: Shared,
        in_flight: bool,
    }

    impl FramePoll for FakePoll {
        fn start(&mut self, known: Option<u64>) -> ratelimit_net::Result<()> {
            if self.in_flight {
                return Err(ratelimit_net::Error::PollInFlight);
            }
            self.script.borrow_mut().poll_starts.push(known);
            self.in_flight = true;
            Ok(())
        }

        fn try_finish(&mut self) -> Option<ratelimit_net::Result<PollOutcome<FrameRecord>>> {
            if !self.in_flight {
                return None;
            }
            let next = self.script.borrow_mut().polls.pop_front();
            if next.is_some() {
                self.in_flight = false;
            }
            next
        }

        fn is_in_flight(&self) -> bool {
            self.in_flight
        }
    }

    pub struct FakeConnector(pub Shared);

    impl Connector for FakeConnector {
        fn connect(&mut self, _options: ConnectOptions) -> ratelimit_net::Result<Transports> {
            let mut script = self.0.borrow_mut();
            script.connects += 1;
            if let Some(error) = script.connect_error {
                return Err(error());
            }
            Ok(Transports {
                commands: Box::new(FakeCommands(self.0.clone())),
                poll: Box::new(FakePoll {
                    script: self.0.clone(),
                    in_flight: false,
                }),
            })
        }
    }

    /// A game wired to a fresh script
    pub fn game(me: &str) -> (Game, Shared) {
        game_in(me, std::env::temp_dir().join("ratelimit-test-reports"))
    }

    pub fn game_in(me: &str, reports_dir: PathBuf) -> (Game, Shared) {
        let script: Shared = Rc::new(RefCell::new(Script::default()));
        let game = Game::new(
            Settings::default(),
            PlayerId::new(me),
            Box::new(FakeConnector(script.clone())),
            reports_dir,
        );
        (game, script)
    }
}
