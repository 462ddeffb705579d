//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use handoff_frontend::{CancellationFlag, Frontend, FrontendConfig, FrontendError};

pub const PROCESS_NAME: &str = "test-frontend";

/// Find a loopback port that is free right now.
pub fn free_port() -> u16 {
    let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Config with short timers so tests run quickly.
pub fn test_config(socket_path: &Path, port: u16) -> FrontendConfig {
    let mut config = FrontendConfig::default();
    config.listener.bind_address = loopback(port).to_string();
    config.listener.backlog = 16;
    config.channel.socket_path = socket_path.to_path_buf();
    config.channel.reconnect_backoff_ms = 50;
    config.channel.handoff_timeout_ms = 1000;
    config.event_loop.poll_timeout_ms = 50;
    config.greeting.process_name = PROCESS_NAME.to_string();
    config
}

pub fn expected_greeting() -> String {
    format!("Hello from {} on PID ({})!\n", PROCESS_NAME, std::process::id())
}

/// Start a front end on the current runtime.
pub fn spawn_frontend(
    config: FrontendConfig,
) -> (CancellationFlag, JoinHandle<Result<(), FrontendError>>) {
    let cancel = CancellationFlag::new();
    let frontend = Frontend::new(config, cancel.clone());
    let handle = tokio::spawn(frontend.run());
    (cancel, handle)
}

/// Request termination and wait for the loop to finish.
pub async fn stop(
    cancel: CancellationFlag,
    handle: JoinHandle<Result<(), FrontendError>>,
) -> Result<(), FrontendError> {
    cancel.raise(libc::SIGTERM);
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("front end did not stop within the shutdown bound")
        .expect("front end task panicked")
}

/// Connect once the front end is listening, retrying for up to two seconds.
pub async fn connect_when_listening(addr: SocketAddr) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {}", addr);
}

/// Wait until connections to `addr` are refused, for up to two seconds.
pub async fn wait_until_not_listening(addr: SocketAddr) {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} is still accepting connections", addr);
}

/// Read everything the server sends until it closes the connection.
pub async fn read_until_eof(stream: &mut TcpStream) -> String {
    let mut received = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut received))
        .await
        .expect("connection was not closed")
        .unwrap();
    received
}
