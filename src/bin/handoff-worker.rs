//! Sample worker: receives handed-off connections and answers them.
//!
//! Binds the channel socket, serves one front end at a time, greets every
//! received client with its own PID line and closes it.

use std::io;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UnixListener, UnixStream};

use handoff_frontend::handoff::{recv_handoff, HandoffError};
use handoff_frontend::lifecycle::signals::{is_termination, signal_name};
use handoff_frontend::lifecycle::{install_signal_handlers, CancellationFlag};
use handoff_frontend::net::Greeting;
use handoff_frontend::observability::logging;

#[derive(Parser)]
#[command(name = "handoff-worker")]
#[command(about = "Receive connections handed off by handoff-frontend", long_about = None)]
struct Cli {
    /// Channel socket to bind.
    #[arg(short, long, default_value = "fd-pass.sock")]
    socket: PathBuf,

    /// Name announced to clients.
    #[arg(long, default_value = "handoff-worker")]
    name: String,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    tracing::info!(pid = std::process::id(), "Starting worker");

    let cancel = CancellationFlag::new();
    if let Err(e) = install_signal_handlers(cancel.clone()) {
        tracing::error!(error = %e, "Could not install signal handlers");
        return ExitCode::FAILURE;
    }

    match std::fs::remove_file(&cli.socket) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!(path = %cli.socket.display(), error = %e, "Could not remove stale socket");
            return ExitCode::FAILURE;
        }
    }

    let listener = match UnixListener::bind(&cli.socket) {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(path = %cli.socket.display(), error = %e, "Could not bind channel socket");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(path = %cli.socket.display(), "Listening for handoffs");

    let greeting = Greeting::for_current_process(&cli.name);
    let mut channel: Option<UnixStream> = None;

    loop {
        if let Some(signo) = cancel.take() {
            tracing::info!(signal = signal_name(signo), "Processing signal");
            if is_termination(signo) {
                break;
            }
        }

        tokio::select! {
            biased;
            accepted = listener.accept(), if channel.is_none() => match accepted {
                Ok((stream, _)) => {
                    tracing::info!("Front end connected");
                    channel = Some(stream);
                }
                Err(e) => tracing::warn!(error = %e, "Could not accept front end"),
            },
            received = recv_on(channel.as_ref()) => match received {
                Ok(fd) => {
                    if let Err(e) = serve(fd, &greeting).await {
                        tracing::warn!(error = %e, "Could not serve handed-off connection");
                    }
                }
                Err(HandoffError::ChannelClosed) => {
                    tracing::info!("Connection on channel closed");
                    channel = None;
                }
                Err(HandoffError::Io(e)) => {
                    tracing::warn!(error = %e, "Channel failed");
                    channel = None;
                }
                Err(e) => tracing::warn!(error = %e, "Rejected handoff"),
            },
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    tracing::info!("Shutting down");
    drop(channel);
    let _ = std::fs::remove_file(&cli.socket);
    ExitCode::SUCCESS
}

async fn recv_on(channel: Option<&UnixStream>) -> Result<OwnedFd, HandoffError> {
    match channel {
        Some(channel) => recv_handoff(channel).await,
        None => std::future::pending().await,
    }
}

async fn serve(fd: OwnedFd, greeting: &Greeting) -> io::Result<()> {
    let std_stream = std::net::TcpStream::from(fd);
    std_stream.set_nonblocking(true)?;
    let mut stream = TcpStream::from_std(std_stream)?;
    let peer = stream.peer_addr()?;

    tracing::info!(peer = %peer, "Handling connection");
    stream.write_all(greeting.as_bytes()).await?;
    tracing::info!(peer = %peer, "Closing connection");
    Ok(())
}
