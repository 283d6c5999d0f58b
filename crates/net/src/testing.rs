//! Scripted in-process server for transport tests

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};

use crate::connection::ConnectOptions;
use crate::frame::{read_frame, write_frame};
use crate::protocol::Request;

/// What the server does with one request
pub(crate) enum Reply {
    Json(Value),
    /// Read the request but never answer
    Silent,
    /// Drop the connection without answering
    Hangup,
}

type Handler = dyn Fn(&Request) -> Reply + Send + Sync;

pub(crate) struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl TestServer {
    pub(crate) async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, handler.clone(), log.clone()));
            }
        });

        Self { addr, requests }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests seen for a command
    pub(crate) fn count(&self, kind: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }
}

async fn serve(mut stream: TcpStream, handler: Arc<Handler>, log: Arc<Mutex<Vec<Request>>>) {
    while let Ok(bytes) = read_frame(&mut stream).await {
        let request = Request::from_bytes(&bytes).unwrap();
        let reply = handler(&request);
        log.lock().unwrap().push(request);

        match reply {
            Reply::Json(value) => {
                let payload = serde_json::to_vec(&value).unwrap();
                if write_frame(&mut stream, &payload).await.is_err() {
                    return;
                }
            }
            Reply::Silent => {}
            Reply::Hangup => return,
        }
    }
}

/// Options with short timeouts so failure paths run quickly
pub(crate) fn test_options(addr: SocketAddr) -> ConnectOptions {
    ConnectOptions {
        host: addr.ip().to_string(),
        port: addr.port(),
        node: "test-node".to_string(),
        password: "secret".to_string(),
        connect_timeout: Duration::from_millis(500),
        request_timeout: Duration::from_millis(200),
        retry_delay: Duration::from_millis(5),
    }
}
