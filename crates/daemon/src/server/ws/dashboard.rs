// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard broadcast channel.
//!
//! State changes coalesce behind a trailing debounce; the signal path calls
//! [`Broadcaster::broadcast_now`] directly so attention latency is dominated
//! by the network, not timers. Each connection gets a bounded queue drained
//! by a single writer task, so writes are serialized per connection and a
//! slow client can never block the daemon (its frames drop instead).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::protocol::build_sessions_message;
use crate::storage::StateStore;

/// Frames queued per connection before drops start.
const QUEUE_DEPTH: usize = 64;

pub struct Broadcaster {
    store: Arc<StateStore>,
    conns: Mutex<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
    pending: Notify,
}

impl Broadcaster {
    pub fn new(store: Arc<StateStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            conns: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            pending: Notify::new(),
        })
    }

    /// Register a connection; returns its id and the frame queue to drain.
    pub fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.conns.lock().insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, id: u64) {
        self.conns.lock().remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.conns.lock().len()
    }

    /// Queue a debounced broadcast.
    pub fn schedule(&self) {
        self.pending.notify_one();
    }

    /// Build and fan out the sessions frame immediately (signal path).
    pub fn broadcast_now(&self) {
        let message = build_sessions_message(&self.store.snapshot());
        match serde_json::to_string(&message) {
            Ok(frame) => self.send_frame_string(frame),
            Err(e) => tracing::error!(error = %e, "failed to serialize sessions frame"),
        }
    }

    /// Fan out an arbitrary frame (linear-sync progress, conflict prompts).
    pub fn send_frame(&self, frame: &serde_json::Value) {
        self.send_frame_string(frame.to_string());
    }

    fn send_frame_string(&self, frame: String) {
        let conns = self.conns.lock();
        for (id, tx) in conns.iter() {
            // Non-blocking: a full queue means a slow client; drop the frame
            // rather than stall the fan-out.
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(frame.clone()) {
                tracing::warn!(conn = *id, "dashboard queue full; dropping frame");
            }
        }
    }

    /// Debounce loop: a burst of `schedule` calls produces one broadcast.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let debounce = crate::env::broadcast_debounce();
        loop {
            tokio::select! {
                _ = self.pending.notified() => {}
                _ = cancel.cancelled() => return,
            }
            tokio::select! {
                _ = tokio::time::sleep(debounce) => {}
                _ = cancel.cancelled() => return,
            }
            self.broadcast_now();
        }
    }
}

#[cfg(test)]
#[path = "dashboard_tests.rs"]
mod tests;
