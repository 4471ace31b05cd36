//! Position flushing: one request per dirty entity, last write wins.
//!
//! DESIGN
//! ======
//! The optional autosave task wakes on a fixed interval, snapshots the
//! pending writes under the session lock, releases the lock, sends the
//! writes, then re-locks to acknowledge them. Acknowledgement is by
//! revision, so an entity dropped again while its older write was in flight
//! stays dirty and goes out on the next tick. Failed writes stay queued.

use std::sync::Arc;
use std::time::Duration;

use canvas::pending::PendingWrite;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::CanvasApi;
use crate::session::CanvasSession;

/// Outcome of one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub flushed: usize,
    pub failed: usize,
}

/// Send each write; returns the ones the backend accepted.
pub async fn send_writes(api: &dyn CanvasApi, writes: &[PendingWrite]) -> Vec<PendingWrite> {
    let mut sent = Vec::with_capacity(writes.len());
    for write in writes {
        match api.flush_position(write.id, write.position).await {
            Ok(()) => sent.push(*write),
            Err(e) => tracing::warn!(id = %write.id, error = %e, "position flush failed, will retry"),
        }
    }
    sent
}

/// Flush a shared session without holding its lock across network calls.
pub async fn flush_shared(session: &Mutex<CanvasSession>) -> FlushReport {
    let (api, writes) = {
        let guard = session.lock().await;
        (guard.api(), guard.engine().pending_writes())
    };
    if writes.is_empty() {
        return FlushReport::default();
    }

    let sent = send_writes(api.as_ref(), &writes).await;

    let mut guard = session.lock().await;
    for write in &sent {
        guard.engine_mut().acknowledge_write(write);
    }
    let report = FlushReport { flushed: sent.len(), failed: writes.len() - sent.len() };
    tracing::debug!(flushed = report.flushed, failed = report.failed, "autosave flush");
    report
}

/// Spawn the autosave task. `None` interval means autosave is off.
pub fn spawn_flush_task(session: Arc<Mutex<CanvasSession>>, interval: Option<Duration>) -> Option<JoinHandle<()>> {
    let period = interval?;
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            flush_shared(&session).await;
        }
    }))
}

#[cfg(test)]
#[path = "flush_test.rs"]
mod tests;
