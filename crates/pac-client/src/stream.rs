//! Monitor stream connection management.
//!
//! At most one connection is live per [`ConnectionManager`]. `open` always
//! tears down the previous connection first, and every connection gets a
//! fresh generation number that is stamped on each signal it emits, so the
//! consumer can discard anything still queued from a connection it closed.

use crate::error::ClientError;
use futures_util::StreamExt;
use pac_core::StreamEvent;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, Request};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

pub const SIGNAL_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Closed,
    Connecting,
    Open,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Closed => "Closed",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Open => "Open",
            ConnectionStatus::Error => "Error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    Status {
        generation: u64,
        status: ConnectionStatus,
    },
    Event {
        generation: u64,
        event: StreamEvent,
    },
}

impl StreamSignal {
    pub fn generation(&self) -> u64 {
        match self {
            StreamSignal::Status { generation, .. } | StreamSignal::Event { generation, .. } => {
                *generation
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub token: Option<String>,
    pub handshake_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            token: None,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    live: Option<u64>,
    status: ConnectionStatus,
}

/// Lets the connection task update status only while it is still the live
/// connection.
#[derive(Clone)]
struct StatusCell {
    shared: Arc<Mutex<Shared>>,
    signals: mpsc::Sender<StreamSignal>,
    generation: u64,
}

impl StatusCell {
    /// Waits for queue space: a status transition is never dropped, even
    /// behind a burst of events.
    async fn publish(&self, status: ConnectionStatus) {
        {
            let mut shared = lock(&self.shared);
            if shared.live != Some(self.generation) {
                return;
            }
            shared.status = status;
        }
        debug!(generation = self.generation, %status, "stream_status");
        let signal = StreamSignal::Status {
            generation: self.generation,
            status,
        };
        if self.signals.send(signal).await.is_err() {
            debug!(generation = self.generation, "stream_consumer_gone");
        }
    }
}

struct ActiveConnection {
    generation: u64,
    address: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

pub struct ConnectionManager {
    config: StreamConfig,
    signals: mpsc::Sender<StreamSignal>,
    shared: Arc<Mutex<Shared>>,
    last_generation: u64,
    target: Option<String>,
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    pub fn new(config: StreamConfig, signals: mpsc::Sender<StreamSignal>) -> Self {
        Self {
            config,
            signals,
            shared: Arc::new(Mutex::new(Shared::default())),
            last_generation: 0,
            target: None,
            active: None,
        }
    }

    /// Close whatever is open, then connect to `address`. Returns the new
    /// connection's generation. Must be called from within a tokio runtime.
    pub fn open(&mut self, address: &str) -> u64 {
        self.close();
        self.last_generation += 1;
        let generation = self.last_generation;
        {
            let mut shared = lock(&self.shared);
            shared.live = Some(generation);
            shared.status = ConnectionStatus::Connecting;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let cell = StatusCell {
            shared: self.shared.clone(),
            signals: self.signals.clone(),
            generation,
        };
        let task = tokio::spawn(run_connection(
            address.to_string(),
            self.config.clone(),
            cell,
            shutdown_rx,
        ));
        info!(generation, address, "stream_open");
        self.target = Some(address.to_string());
        self.active = Some(ActiveConnection {
            generation,
            address: address.to_string(),
            shutdown: Some(shutdown_tx),
            task,
        });
        generation
    }

    /// Tear down the live connection, if any. Signals it already queued keep
    /// their old generation and fail [`ConnectionManager::is_live`].
    pub fn close(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        {
            let mut shared = lock(&self.shared);
            shared.live = None;
            shared.status = ConnectionStatus::Closed;
        }
        if let Some(shutdown) = active.shutdown.take() {
            let _ = shutdown.send(());
        }
        if active.task.is_finished() {
            debug!(generation = active.generation, "stream_task_already_done");
        }
        info!(generation = active.generation, address = %active.address, "stream_close");
    }

    /// Close then reopen the last target, even after an explicit close.
    pub fn reconnect(&mut self) -> Option<u64> {
        let address = self.target.clone()?;
        Some(self.open(&address))
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.shared).status
    }

    pub fn live_generation(&self) -> Option<u64> {
        lock(&self.shared).live
    }

    pub fn is_live(&self, generation: u64) -> bool {
        self.live_generation() == Some(generation)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn build_request(address: &str, token: Option<&str>) -> Result<Request<()>, ClientError> {
    let parsed = url::Url::parse(address).map_err(|err| ClientError::InvalidUrl {
        url: address.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(ClientError::InvalidUrl {
            url: address.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    let mut request = address.into_client_request()?;
    if let Some(token) = token.filter(|token| !token.trim().is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::InvalidToken)?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

async fn run_connection(
    address: String,
    config: StreamConfig,
    cell: StatusCell,
    mut shutdown: oneshot::Receiver<()>,
) {
    let generation = cell.generation;
    cell.publish(ConnectionStatus::Connecting).await;
    let request = match build_request(&address, config.token.as_deref()) {
        Ok(request) => request,
        Err(err) => {
            warn!("stream_request_error: {err}");
            cell.publish(ConnectionStatus::Error).await;
            return;
        }
    };

    let handshake = tokio::time::timeout(
        config.handshake_timeout,
        tokio_tungstenite::connect_async(request),
    );
    let mut ws = tokio::select! {
        _ = &mut shutdown => return,
        result = handshake => match result {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(err)) => {
                warn!("stream_connect_error: {err}");
                cell.publish(ConnectionStatus::Error).await;
                return;
            }
            Err(_) => {
                warn!(
                    "stream_handshake_timeout: after {}s",
                    config.handshake_timeout.as_secs()
                );
                cell.publish(ConnectionStatus::Error).await;
                return;
            }
        },
    };
    cell.publish(ConnectionStatus::Open).await;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = ws.close(None).await;
                debug!(generation, "stream_shutdown");
                return;
            }
            frame = ws.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!("stream_decode_error: binary frame is not utf-8: {err}");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!(generation, "stream_closed_by_peer");
                        cell.publish(ConnectionStatus::Closed).await;
                        return;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!("stream_read_error: {err}");
                        cell.publish(ConnectionStatus::Error).await;
                        return;
                    }
                };
                match StreamEvent::parse(&text) {
                    Ok(event) => {
                        let signal = StreamSignal::Event { generation, event };
                        if cell.signals.send(signal).await.is_err() {
                            let _ = ws.close(None).await;
                            return;
                        }
                    }
                    Err(err) => warn!("stream_decode_error: {err}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_bearer_token() {
        let request = build_request("ws://localhost:8080/ws/monitor", Some("abc")).unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            &HeaderValue::from_static("Bearer abc")
        );
        let request = build_request("ws://localhost:8080/ws/monitor", None).unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn request_rejects_bad_targets() {
        assert!(matches!(
            build_request("", None),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            build_request("http://localhost/ws", None),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            build_request("ws://localhost/ws", Some("bad\ntoken")),
            Err(ClientError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn closed_manager_reports_closed() {
        let (tx, _rx) = mpsc::channel(8);
        let mut manager = ConnectionManager::new(StreamConfig::default(), tx);
        assert_eq!(manager.status(), ConnectionStatus::Closed);
        assert_eq!(manager.reconnect(), None);
        manager.close();
        assert_eq!(manager.live_generation(), None);
    }

    #[tokio::test]
    async fn open_on_invalid_address_ends_in_error() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut manager = ConnectionManager::new(StreamConfig::default(), tx);
        let generation = manager.open("not a url");
        assert_eq!(
            rx.recv().await,
            Some(StreamSignal::Status {
                generation,
                status: ConnectionStatus::Connecting
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(StreamSignal::Status {
                generation,
                status: ConnectionStatus::Error
            })
        );
        assert_eq!(manager.status(), ConnectionStatus::Error);
    }
}
