use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::store::JobStore;
use crate::types::{JobStatus, JobStatusChange};

const BROADCAST_CAPACITY: usize = 256;

/// Polls the shared job record space and emits exactly one `job:completed`
/// event per queued/running → completed/failed transition (§4.L).
///
/// A fixed-interval loop that diffs against a last-known-status map and
/// forwards transitions over a non-blocking broadcast channel so a slow
/// subscriber never stalls the tick.
pub struct JobWatcher {
    store: JobStore,
    events: broadcast::Sender<JobStatusChange>,
    /// Last status observed per job id, paired with the tick-local
    /// insertion sequence number used to find the oldest entries when the
    /// watch-set cap is exceeded. A job polled twice in the same state
    /// emits nothing the second time.
    last_known: Arc<DashMap<String, (JobStatus, u64)>>,
    poll_interval: Duration,
    /// Caps how many in-flight jobs are tracked at once; oldest entries are
    /// evicted from `last_known` once exceeded (configurable watch-set cap).
    /// An evicted job simply stops being watched — its eventual completion
    /// will not be detected — rather than the watch set growing unbounded.
    watch_set_cap: usize,
    insertion_seq: AtomicU64,
}

impl JobWatcher {
    pub fn new(store: JobStore, poll_interval: Duration, watch_set_cap: usize) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { store, events, last_known: Arc::new(DashMap::new()), poll_interval, watch_set_cap, insertion_seq: AtomicU64::new(0) }
    }

    /// Subscribe to `job:completed` transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<JobStatusChange> {
        self.events.subscribe()
    }

    /// Run the poll loop until `shutdown` signals true. Takes `Arc<Self>` so
    /// the gateway can both spawn this loop and hold the same instance in
    /// `AppState` for `subscribe()`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "job watcher started");
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        warn!(error = %e, "job watcher tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("job watcher shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn tick(&self) -> crate::error::Result<()> {
        let in_flight = self.store.list_in_flight()?;
        let seen_ids: std::collections::HashSet<&str> = in_flight.iter().map(|j| j.id.as_str()).collect();

        for job in &in_flight {
            self.last_known
                .entry(job.id.clone())
                .and_modify(|(status, _seq)| *status = job.status)
                .or_insert_with(|| (job.status, self.insertion_seq.fetch_add(1, Ordering::Relaxed)));
        }
        self.evict_oldest_over_cap();

        // Jobs we were tracking that are no longer in-flight have transitioned
        // to a terminal state since the last tick.
        let transitioned: Vec<String> =
            self.last_known.iter().map(|e| e.key().clone()).filter(|id| !seen_ids.contains(id.as_str())).collect();

        for job_id in transitioned {
            self.last_known.remove(&job_id);
            let Some(job) = self.store.get(&job_id)? else { continue };
            if !job.status.is_terminal() {
                continue;
            }
            let change = JobStatusChange {
                job_id: job.id,
                session_id: job.session_id,
                user_id: job.user_id,
                status: job.status,
                result: job.result,
                error: job.error,
            };
            // send() errors only when there are no subscribers; that's fine,
            // the transition has still been consumed from the watch set.
            let _ = self.events.send(change);
        }

        Ok(())
    }

    /// Evicts the oldest-inserted entries from `last_known` until it's back
    /// at or under `watch_set_cap`. An evicted job's eventual transition to
    /// a terminal state goes undetected — the cap trades completeness for a
    /// bounded watch set.
    fn evict_oldest_over_cap(&self) {
        let over = self.last_known.len().saturating_sub(self.watch_set_cap);
        if over == 0 {
            return;
        }
        let mut by_age: Vec<(String, u64)> = self.last_known.iter().map(|e| (e.key().clone(), e.value().1)).collect();
        by_age.sort_by_key(|(_, seq)| *seq);
        for (job_id, _) in by_age.into_iter().take(over) {
            self.last_known.remove(&job_id);
            warn!(job_id, cap = self.watch_set_cap, "job watcher watch-set cap exceeded; evicting oldest-tracked job");
        }
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    #[tokio::test]
    async fn transition_to_completed_emits_exactly_one_event() {
        let store = JobStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let job = store.enqueue("s1", "u1").unwrap();

        let watcher = JobWatcher::new(store.clone(), Duration::from_millis(10), 1000);
        let mut rx = watcher.subscribe();

        // First tick: job is in flight, gets tracked, nothing fires.
        watcher.tick().unwrap();
        assert!(rx.try_recv().is_err());

        store.mark_completed(&job.id, serde_json::json!({"ok": true})).unwrap();

        // Second tick: the job is no longer in-flight, so it fires once.
        watcher.tick().unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.job_id, job.id);
        assert!(matches!(event.status, JobStatus::Completed));

        // Third tick: already removed from the watch set, nothing fires again.
        watcher.tick().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn job_never_polled_while_in_flight_does_not_fire() {
        let store = JobStore::new(Connection::open_in_memory().unwrap()).unwrap();
        store.enqueue("s1", "u1").unwrap();
        let watcher = JobWatcher::new(store, Duration::from_millis(10), 1000);
        let mut rx = watcher.subscribe();
        watcher.tick().unwrap();
        watcher.tick().unwrap();
        assert!(rx.try_recv().is_err());
    }

    /// Watch-set cap actually evicts the oldest-tracked job rather than
    /// just warning and continuing to track everything unbounded.
    #[tokio::test]
    async fn watch_set_cap_evicts_the_oldest_tracked_job() {
        let store = JobStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let oldest = store.enqueue("s1", "u1").unwrap();
        let newer = store.enqueue("s1", "u1").unwrap();
        let newest = store.enqueue("s1", "u1").unwrap();

        let watcher = JobWatcher::new(store.clone(), Duration::from_millis(10), 2);
        let mut rx = watcher.subscribe();

        // All three are in flight; the cap of 2 evicts the oldest.
        watcher.tick().unwrap();
        assert_eq!(watcher.last_known.len(), 2);
        assert!(!watcher.last_known.contains_key(&oldest.id));

        store.mark_completed(&oldest.id, serde_json::json!({})).unwrap();
        store.mark_completed(&newer.id, serde_json::json!({})).unwrap();
        store.mark_completed(&newest.id, serde_json::json!({})).unwrap();

        watcher.tick().unwrap();
        let mut fired = Vec::new();
        while let Ok(event) = rx.try_recv() {
            fired.push(event.job_id);
        }
        // The evicted job's completion goes undetected; the two still
        // being tracked both fire.
        assert!(!fired.contains(&oldest.id));
        assert!(fired.contains(&newer.id));
        assert!(fired.contains(&newest.id));
    }
}
