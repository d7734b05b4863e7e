use std::{future, path::PathBuf, time::Duration};

use futures_util::StreamExt;
use tokio::{
    net::TcpStream,
    sync::watch,
    task::{JoinError, JoinHandle},
    time::{sleep_until, timeout, Instant},
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::SocketError,
    view::{ConnectionStatus, Page},
};

use super::{
    connection::{Backoff, Connection, ConnectionState, Reconnect},
    dispatch::dispatch,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What the manager last published: connection state plus the rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: ConnectionState,
    pub attempts: u32,
    pub html: String,
}

/// Owns the socket, the reconnect timer and the page. Everything runs on one
/// task, so socket events and timers are handled strictly one at a time.
pub struct ConnectionManager<P> {
    url: Url,
    connection: Connection,
    page: P,
    output: Option<PathBuf>,
    connect_timeout: Duration,
    cancel: CancellationToken,
    snapshots: watch::Sender<Snapshot>,
}

/// Control side of a spawned manager.
pub struct ManagerHandle<P> {
    cancel: CancellationToken,
    snapshots: watch::Receiver<Snapshot>,
    task: JoinHandle<P>,
}

impl<P> ManagerHandle<P> {
    /// Stops reconnecting, closes the live socket and drops view timers.
    /// Safe to call any number of times.
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    pub fn snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the manager to stop and hands back the page.
    pub async fn join(self) -> Result<P, JoinError> {
        self.task.await
    }
}

enum Phase {
    Continue,
    Stop,
}

impl<P: Page + Send + 'static> ConnectionManager<P> {
    pub fn new(url: Url, backoff: Backoff, page: P) -> Self {
        let snapshot = Snapshot {
            state: ConnectionState::Disconnected,
            attempts: 0,
            html: page.render(),
        };
        Self {
            url,
            connection: Connection::new(backoff),
            page,
            output: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cancel: CancellationToken::new(),
            snapshots: watch::channel(snapshot).0,
        }
    }

    /// Writes the rendered page to `path` whenever it changes.
    pub fn with_output(mut self, path: Option<PathBuf>) -> Self {
        self.output = path;
        self
    }

    /// Gives up on a handshake that takes longer than `limit`; the attempt
    /// then counts as a failed connect.
    pub fn with_connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    pub fn spawn(self) -> ManagerHandle<P> {
        let cancel = self.cancel.clone();
        let snapshots = self.snapshots.subscribe();
        let task = tokio::spawn(self.run());
        ManagerHandle {
            cancel,
            snapshots,
            task,
        }
    }

    async fn run(mut self) -> P {
        info!(page = self.page.name(), "Connection manager started");
        self.publish(true).await;

        while let Phase::Continue = self.connect_and_serve().await {}

        self.connection.dispose();
        self.page.dispose();
        self.publish(false).await;
        info!(page = self.page.name(), "Connection manager stopped");
        self.page
    }

    /// One connection lifetime: connect, read until the socket drops, then
    /// wait out the reconnect delay.
    async fn connect_and_serve(&mut self) -> Phase {
        if let Err(e) = self.connection.begin_connect() {
            debug!("Not connecting: {e}");
            return Phase::Stop;
        }
        self.publish(false).await;

        let Some(result) = self.open().await else {
            return Phase::Stop;
        };
        match result {
            Ok(socket) => {
                info!(url = %self.url, "WebSocket connected");
                self.connection.on_open();
                self.page.set_status(ConnectionStatus::Connected);
                self.publish(false).await;
                if let Phase::Stop = self.serve(socket).await {
                    return Phase::Stop;
                }
                info!("WebSocket disconnected");
            }
            Err(e) => warn!(url = %self.url, "WebSocket error: {e}"),
        }

        self.wait_for_reconnect().await
    }

    /// Connects, still firing view timers while the handshake is pending.
    /// `None` means the manager was disposed meanwhile.
    async fn open(&mut self) -> Option<Result<Socket, SocketError>> {
        info!(url = %self.url, "Connecting");
        let cancel = self.cancel.clone();
        let limit = self.connect_timeout;
        let connect = timeout(limit, connect_async(self.url.to_string()));
        tokio::pin!(connect);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                result = &mut connect => {
                    let result = match result {
                        Ok(Ok((socket, _response))) => Ok(socket),
                        Ok(Err(e)) => Err(SocketError::from(e)),
                        Err(_) => Err(SocketError::Timeout(limit)),
                    };
                    return Some(result);
                }
                _ = sleep_until_deadline(self.page.next_deadline()) => self.fire_timers().await,
            }
        }
    }

    async fn serve(&mut self, mut socket: Socket) -> Phase {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = socket.close(None).await {
                        debug!("Failed to close socket: {e}");
                    }
                    return Phase::Stop;
                }
                msg = socket.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatch(&text, &mut self.page, Instant::now());
                        self.publish(false).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Server closed the socket");
                        // Flushes the queued close reply.
                        if let Err(e) = socket.close(None).await {
                            debug!("Failed to complete close handshake: {e}");
                        }
                        return Phase::Continue;
                    }
                    Some(Ok(other)) => debug!("Ignoring frame: {other:?}"),
                    Some(Err(e)) => {
                        warn!("WebSocket error: {e}");
                        return Phase::Continue;
                    }
                    None => return Phase::Continue,
                },
                _ = sleep_until_deadline(self.page.next_deadline()) => self.fire_timers().await,
            }
        }
    }

    async fn wait_for_reconnect(&mut self) -> Phase {
        let cancel = self.cancel.clone();
        let wake = match self.connection.on_close() {
            Reconnect::After(delay) => {
                self.page.set_status(ConnectionStatus::Disconnected);
                Some(Instant::now() + delay)
            }
            Reconnect::GiveUp => {
                self.page.set_status(ConnectionStatus::GaveUp);
                None
            }
            Reconnect::Stopped => return Phase::Stop,
        };
        self.publish(false).await;

        // After giving up there is nothing left to wait for except dispose;
        // view timers keep running so the page settles.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Phase::Stop,
                _ = sleep_until_deadline(wake) => return Phase::Continue,
                _ = sleep_until_deadline(self.page.next_deadline()) => self.fire_timers().await,
            }
        }
    }

    async fn fire_timers(&mut self) {
        self.page.fire_timers(Instant::now());
        self.publish(false).await;
    }

    /// Pushes a new snapshot if anything changed and mirrors the page to the
    /// output file.
    async fn publish(&mut self, force_write: bool) {
        let page_changed = self.page.take_dirty();
        let state = self.connection.state();
        let attempts = self.connection.attempts();
        let html = self.page.render();

        if page_changed || force_write {
            if let Some(path) = &self.output {
                if let Err(e) = tokio::fs::write(path, &html).await {
                    warn!("Failed to write {}: {e}", path.display());
                }
            }
        }

        self.snapshots.send_if_modified(|snapshot| {
            if snapshot.state == state && snapshot.attempts == attempts && snapshot.html == html {
                return false;
            }
            *snapshot = Snapshot {
                state,
                attempts,
                html,
            };
            true
        });
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
