//! WebSocket link over a plain TCP stream.
//!
//! TCP connect and handshake run on a short-lived helper thread, bounded by
//! the connect timeout. The tick only checks the hand-off channel. Once
//! established the socket is non-blocking, so reads and writes never stall
//! a tick either.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};
use tungstenite::{Message, WebSocket};

use super::{ConnectProgress, InboundMessage, StreamLink};
use crate::error::{Result, WhiskerError};

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

type Socket = WebSocket<TcpStream>;

pub struct WsLink {
    host: String,
    port: u16,
    url: String,
    connect_timeout: Duration,
    socket: Option<Socket>,
    pending: Option<Receiver<Result<Socket>>>,
}

impl WsLink {
    pub fn new(host: impl Into<String>, port: u16, path: &str, connect_timeout: Duration) -> Self {
        let host = host.into();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let url = format!("ws://{host}:{port}{path}");
        Self {
            host,
            port,
            url,
            connect_timeout,
            socket: None,
            pending: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connecting(&self) -> bool {
        self.pending.is_some()
    }

    fn spawn_attempt(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let host = self.host.clone();
        let port = self.port;
        let url = self.url.clone();
        let timeout = self.connect_timeout;
        thread::Builder::new()
            .name("whisker-ws-connect".into())
            .spawn(move || {
                // Receiver gone means the link was dropped; nothing to report.
                let _ = tx.send(open_socket(&host, port, &url, timeout));
            })?;
        debug!(url = self.url.as_str(), "websocket connect started");
        self.pending = Some(rx);
        Ok(())
    }

    fn write(&mut self, message: Message) -> Result<()> {
        let socket = self.socket.as_mut().ok_or(WhiskerError::NotConnected)?;
        match socket.send(message) {
            Ok(()) => Ok(()),
            // Queued; flushed on a later read or write.
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(tungstenite::Error::WriteBufferFull(_)) => {
                Err(WhiskerError::Transport("write buffer full".into()))
            }
            Err(e) => {
                self.socket = None;
                Err(e.into())
            }
        }
    }
}

impl StreamLink for WsLink {
    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn connect(&mut self) -> Result<ConnectProgress> {
        if self.socket.is_some() {
            return Ok(ConnectProgress::Connected);
        }
        let Some(rx) = self.pending.as_ref() else {
            self.spawn_attempt()?;
            return Ok(ConnectProgress::Pending);
        };
        let outcome = match rx.try_recv() {
            Err(TryRecvError::Empty) => return Ok(ConnectProgress::Pending),
            Err(TryRecvError::Disconnected) => {
                Err(WhiskerError::Transport("connect worker exited".into()))
            }
            Ok(result) => result,
        };
        self.pending = None;
        let socket = outcome?;
        info!(url = self.url.as_str(), "websocket established");
        self.socket = Some(socket);
        Ok(ConnectProgress::Connected)
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        self.write(Message::text(text.to_owned()))
    }

    fn send_binary(&mut self, payload: &[u8]) -> Result<()> {
        self.write(Message::binary(payload.to_vec()))
    }

    fn recv(&mut self) -> Result<Option<InboundMessage>> {
        let socket = self.socket.as_mut().ok_or(WhiskerError::NotConnected)?;
        let outcome = loop {
            match socket.read() {
                Ok(Message::Text(text)) => break Ok(Some(InboundMessage::Text(text.to_string()))),
                Ok(Message::Binary(data)) => break Ok(Some(InboundMessage::Binary(data.to_vec()))),
                Ok(Message::Close(frame)) => {
                    info!(?frame, "backend closed the stream");
                    break Err(WhiskerError::Transport("closed by peer".into()));
                }
                // Ping replies are queued by tungstenite itself.
                Ok(_) => continue,
                Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    break flush_pending(socket).map(|()| None);
                }
                Err(e) => break Err(e.into()),
            }
        };
        if outcome.is_err() {
            self.socket = None;
        }
        outcome
    }
}

/// Blocking connect plus handshake. Runs off the tick thread.
fn open_socket(host: &str, port: u16, url: &str, timeout: Duration) -> Result<Socket> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| WhiskerError::Transport(format!("cannot resolve {host}")))?;

    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;

    let (socket, _response) = tungstenite::client(url, stream)
        .map_err(|e| WhiskerError::Transport(format!("handshake failed: {e}")))?;
    socket.get_ref().set_nonblocking(true)?;
    Ok(socket)
}

fn flush_pending(socket: &mut Socket) -> Result<()> {
    match socket.flush() {
        Ok(()) => Ok(()),
        Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        Err(e) => Err(e.into()),
    }
}
