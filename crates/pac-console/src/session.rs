//! Session lifecycle: one store, one REST client, one stream connection.
//!
//! Reloads win over buffered events. A reload records the live stream
//! generation when it starts; once its snapshot lands the store is fenced at
//! that generation, so anything still queued from an older connection is
//! discarded. Events that arrive on the live connection while the fetch is in
//! flight are held and replayed on top of the snapshot. Reconciliation is
//! idempotent and never regresses a job, so a replayed event the snapshot
//! already reflects is a no-op.

use chrono::{DateTime, Local};
use pac_client::{
    ClientConfig, ClientError, ConnectionManager, ConnectionStatus, SnapshotClient,
    SnapshotHealth, SnapshotRead, StreamConfig, StreamSignal, SIGNAL_QUEUE_CAPACITY,
};
use pac_core::{ApplyOutcome, JobId, StateStore, StreamEvent};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const ACTIVITY_CAPACITY: usize = 32;
/// Events held during one reload. Past this the held events are dropped and
/// another reload is requested once the current one lands.
pub const HELD_CAPACITY: usize = SIGNAL_QUEUE_CAPACITY;

#[derive(Debug)]
pub struct SnapshotDelivery {
    pub ticket: u64,
    pub read: SnapshotRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingReload {
    ticket: u64,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub at: DateTime<Local>,
    pub kind: &'static str,
    pub job_id: JobId,
    pub outcome: ApplyOutcome,
}

/// What happened to a stream signal handed to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Status(ConnectionStatus),
    Applied(ApplyOutcome),
    Held,
    /// Dropped because the held buffer overflowed during a reload.
    Overflowed,
    /// From a connection that is no longer live.
    Ignored,
}

/// Session bookkeeping with no I/O, driven by [`Session`].
#[derive(Debug, Default)]
pub struct SessionState {
    store: StateStore,
    health: SnapshotHealth,
    status: ConnectionStatus,
    live: Option<u64>,
    reload: Option<PendingReload>,
    next_ticket: u64,
    held: Vec<(u64, StreamEvent)>,
    overflowed: bool,
    follow_up: bool,
    activity: VecDeque<Activity>,
    loaded_at: Option<DateTime<Local>>,
}

impl SessionState {
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn health(&self) -> &SnapshotHealth {
        &self.health
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn live_generation(&self) -> Option<u64> {
        self.live
    }

    pub fn is_reloading(&self) -> bool {
        self.reload.is_some()
    }

    pub fn held_events(&self) -> usize {
        self.held.len()
    }

    pub fn activity(&self) -> impl Iterator<Item = &Activity> {
        self.activity.iter()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Local>> {
        self.loaded_at
    }

    pub fn connection_opened(&mut self, generation: u64) {
        self.live = Some(generation);
        self.status = ConnectionStatus::Connecting;
        self.held.retain(|(held, _)| *held >= generation);
    }

    pub fn connection_closed(&mut self) {
        self.live = None;
        self.status = ConnectionStatus::Closed;
    }

    /// Start a reload and return its ticket. A newer reload supersedes an
    /// older one still in flight.
    pub fn begin_reload(&mut self) -> u64 {
        self.next_ticket += 1;
        self.overflowed = false;
        self.follow_up = false;
        let generation = self.live.unwrap_or(self.store.fence());
        self.reload = Some(PendingReload {
            ticket: self.next_ticket,
            generation,
        });
        debug!(ticket = self.next_ticket, generation, "reload_started");
        self.next_ticket
    }

    /// Load a fetched snapshot. Returns false when the delivery belongs to a
    /// superseded reload and was dropped.
    pub fn finish_reload(&mut self, delivery: SnapshotDelivery) -> bool {
        let Some(pending) = self.reload else {
            debug!(ticket = delivery.ticket, "reload_unexpected");
            return false;
        };
        if pending.ticket != delivery.ticket {
            debug!(
                ticket = delivery.ticket,
                current = pending.ticket,
                "reload_superseded"
            );
            return false;
        }
        self.reload = None;
        let read = delivery.read;
        let failures = [
            ("jobs", read.jobs.error()),
            ("elements", read.elements.error()),
        ];
        for (resource, failure) in failures {
            if let Some(err) = failure {
                warn!(
                    "snapshot_partial: resource={resource} kind={} error={err}",
                    err.kind()
                );
            }
        }
        let (snapshot, health) = read.into_parts();
        self.store.load_snapshot_fenced(snapshot, pending.generation);
        self.health = health;
        self.loaded_at = Some(Local::now());

        if std::mem::take(&mut self.overflowed) {
            info!("reload_follow_up: held events overflowed");
            self.follow_up = true;
        }
        let held = std::mem::take(&mut self.held);
        if !held.is_empty() {
            info!(count = held.len(), "replaying_held_events");
        }
        for (generation, event) in held {
            if self.live == Some(generation) {
                self.apply(generation, &event);
            }
        }
        true
    }

    /// True once after a reload whose held events overflowed; the caller
    /// should start another reload.
    pub fn take_follow_up(&mut self) -> bool {
        std::mem::take(&mut self.follow_up)
    }

    pub fn accept(&mut self, signal: StreamSignal) -> SignalOutcome {
        let generation = signal.generation();
        if self.live != Some(generation) {
            debug!(generation, live = ?self.live, "signal_from_closed_connection");
            return SignalOutcome::Ignored;
        }
        match signal {
            StreamSignal::Status { status, .. } => {
                self.status = status;
                SignalOutcome::Status(status)
            }
            StreamSignal::Event { event, .. } => {
                if self.reload.is_some() {
                    if self.overflowed {
                        return SignalOutcome::Overflowed;
                    }
                    if self.held.len() == HELD_CAPACITY {
                        warn!("held_events_overflow: dropped={}", self.held.len() + 1);
                        self.held.clear();
                        self.overflowed = true;
                        return SignalOutcome::Overflowed;
                    }
                    self.held.push((generation, event));
                    return SignalOutcome::Held;
                }
                SignalOutcome::Applied(self.apply(generation, &event))
            }
        }
    }

    fn apply(&mut self, generation: u64, event: &StreamEvent) -> ApplyOutcome {
        let outcome = self.store.apply_delivery(generation, event);
        if outcome != ApplyOutcome::Stale {
            if self.activity.len() == ACTIVITY_CAPACITY {
                self.activity.pop_back();
            }
            self.activity.push_front(Activity {
                at: Local::now(),
                kind: event.kind(),
                job_id: event.job_id(),
                outcome: outcome.clone(),
            });
        }
        outcome
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }
}

pub struct Session {
    state: SessionState,
    client: SnapshotClient,
    manager: ConnectionManager,
    stream_url: String,
    loads: mpsc::Sender<SnapshotDelivery>,
}

impl Session {
    pub fn new(
        client: &ClientConfig,
        stream: StreamConfig,
        stream_url: impl Into<String>,
        signals: mpsc::Sender<StreamSignal>,
        loads: mpsc::Sender<SnapshotDelivery>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            state: SessionState::default(),
            client: SnapshotClient::new(client)?,
            manager: ConnectionManager::new(stream, signals),
            stream_url: stream_url.into(),
            loads,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn api_base(&self) -> &str {
        self.client.base_url()
    }

    /// Open the stream, then take the first snapshot.
    pub fn start(&mut self) {
        let generation = self.manager.open(&self.stream_url);
        self.state.connection_opened(generation);
        self.reload();
    }

    pub fn reload(&mut self) {
        let ticket = self.state.begin_reload();
        let client = self.client.clone();
        let loads = self.loads.clone();
        tokio::spawn(async move {
            let read = client.fetch_snapshot().await;
            let _ = loads.send(SnapshotDelivery { ticket, read }).await;
        });
    }

    /// Close then reopen the stream and reload, so the snapshot taken on the
    /// new connection is authoritative over anything buffered on the old one.
    pub fn reconnect(&mut self) {
        let generation = match self.manager.reconnect() {
            Some(generation) => generation,
            None => self.manager.open(&self.stream_url),
        };
        info!(generation, "session_reconnect");
        self.state.connection_opened(generation);
        self.reload();
    }

    pub fn handle_signal(&mut self, signal: StreamSignal) -> SignalOutcome {
        self.state.accept(signal)
    }

    pub fn finish_reload(&mut self, delivery: SnapshotDelivery) -> bool {
        let loaded = self.state.finish_reload(delivery);
        if self.state.take_follow_up() {
            self.reload();
        }
        loaded
    }

    pub fn close(&mut self) {
        self.manager.close();
        self.state.connection_closed();
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
