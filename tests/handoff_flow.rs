//! End-to-end handoff through a real listener and a scripted worker.

use std::net::Shutdown;
use std::os::fd::OwnedFd;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UnixListener, UnixStream};

use handoff_frontend::handoff::recv_handoff;

mod common;

async fn accept_channel(worker: &UnixListener) -> UnixStream {
    let (channel, _) = tokio::time::timeout(Duration::from_secs(2), worker.accept())
        .await
        .expect("front end never connected")
        .unwrap();
    channel
}

async fn receive(channel: &UnixStream) -> OwnedFd {
    tokio::time::timeout(Duration::from_secs(2), recv_handoff(channel))
        .await
        .expect("no handoff arrived")
        .unwrap()
}

fn into_tokio(fd: OwnedFd) -> TcpStream {
    let stream = std::net::TcpStream::from(fd);
    stream.set_nonblocking(true).unwrap();
    TcpStream::from_std(stream).unwrap()
}

#[tokio::test]
async fn client_gets_greeting_then_worker_owns_connection() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("worker.sock");
    let worker = UnixListener::bind(&socket).unwrap();
    let port = common::free_port();

    let (cancel, handle) = common::spawn_frontend(common::test_config(&socket, port));
    let channel = accept_channel(&worker).await;

    let mut client = common::connect_when_listening(common::loopback(port)).await;
    let mut handed = into_tokio(receive(&channel).await);
    handed.write_all(b"served by worker\n").await.unwrap();
    drop(handed);

    // EOF here also proves the front end kept no copy of the socket.
    let received = common::read_until_eof(&mut client).await;
    assert_eq!(
        received,
        format!("{}served by worker\n", common::expected_greeting())
    );

    common::stop(cancel, handle).await.unwrap();
}

#[tokio::test]
async fn connections_handed_off_in_accept_order() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("worker.sock");
    let worker = UnixListener::bind(&socket).unwrap();
    let port = common::free_port();

    let (cancel, handle) = common::spawn_frontend(common::test_config(&socket, port));
    let channel = accept_channel(&worker).await;

    let first = common::connect_when_listening(common::loopback(port)).await;
    let first_fd = receive(&channel).await;

    let mut clients = vec![first];
    let mut handed = vec![first_fd];
    for _ in 0..3 {
        let client = TcpStream::connect(common::loopback(port)).await.unwrap();
        handed.push(receive(&channel).await);
        clients.push(client);
    }

    for (client, fd) in clients.iter().zip(handed) {
        let stream = into_tokio(fd);
        assert_eq!(stream.peer_addr().unwrap(), client.local_addr().unwrap());
    }

    common::stop(cancel, handle).await.unwrap();
}

#[tokio::test]
async fn pending_connection_served_before_channel_close() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("worker.sock");
    let worker = UnixListener::bind(&socket).unwrap();
    let port = common::free_port();
    let addr = common::loopback(port);

    let (cancel, handle) = common::spawn_frontend(common::test_config(&socket, port));
    let channel = accept_channel(&worker).await;
    let _first = common::connect_when_listening(addr).await;
    drop(receive(&channel).await);

    // The test runtime is current-thread: the front end does not run again
    // until the next await, so it wakes up with both the listener and the
    // channel ready.
    let client = std::net::TcpStream::connect(addr).unwrap();
    let channel = channel.into_std().unwrap();
    channel.shutdown(Shutdown::Write).unwrap();
    drop(worker);
    let channel = UnixStream::from_std(channel).unwrap();

    let handed = std::net::TcpStream::from(receive(&channel).await);
    assert_eq!(handed.peer_addr().unwrap(), client.local_addr().unwrap());

    // The channel close is handled next and takes the listener with it.
    common::wait_until_not_listening(addr).await;

    common::stop(cancel, handle).await.unwrap();
}

#[tokio::test]
async fn no_listener_while_worker_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.sock");
    let port = common::free_port();

    let (cancel, handle) = common::spawn_frontend(common::test_config(&socket, port));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(TcpStream::connect(common::loopback(port)).await.is_err());

    common::stop(cancel, handle).await.unwrap();
}

#[tokio::test]
async fn listener_follows_channel_and_rebinds_same_port() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("worker.sock");
    let worker = UnixListener::bind(&socket).unwrap();
    let port = common::free_port();
    let addr = common::loopback(port);

    let (cancel, handle) = common::spawn_frontend(common::test_config(&socket, port));
    let channel = accept_channel(&worker).await;
    let _client = common::connect_when_listening(addr).await;
    let _fd = receive(&channel).await;

    // Worker goes away entirely.
    drop(channel);
    drop(worker);
    std::fs::remove_file(&socket).unwrap();

    common::wait_until_not_listening(addr).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(TcpStream::connect(addr).await.is_err());

    // Worker returns; the front end reconnects and binds the same port again.
    let worker = UnixListener::bind(&socket).unwrap();
    let channel = accept_channel(&worker).await;

    let mut client = common::connect_when_listening(addr).await;
    drop(receive(&channel).await);
    assert_eq!(common::read_until_eof(&mut client).await, common::expected_greeting());

    common::stop(cancel, handle).await.unwrap();
}

#[tokio::test]
async fn shutdown_is_prompt_during_long_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.sock");
    let mut config = common::test_config(&socket, common::free_port());
    config.channel.reconnect_backoff_ms = 60_000;

    let (cancel, handle) = common::spawn_frontend(config);
    tokio::time::sleep(Duration::from_millis(100)).await;

    common::stop(cancel, handle).await.unwrap();
}
