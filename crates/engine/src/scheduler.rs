//! Recompute scheduler: deduplicated, bounded-concurrency background jobs.
//!
//! Jobs are keyed by a hash of (batch, window, assignment filter); a pending
//! or running duplicate returns the existing task id instead of enqueueing
//! again. Worker slots come from a semaphore; each job runs under a
//! deadline, after which its transaction work is dropped (rolled back) and
//! the job retries once.

use chrono::{Duration as ChronoDuration, NaiveDate};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::recompute::Recomputer;

/// One recompute request, at batch granularity.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub batch_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub assignment_ids: Option<Vec<i64>>,
}

impl JobSpec {
    /// Rolling-window job used by the feeding/sampling triggers.
    pub fn rolling(batch_id: i64, window_days: i64, today: NaiveDate) -> Self {
        Self {
            batch_id,
            start_date: today - ChronoDuration::days(window_days),
            end_date: Some(today),
            assignment_ids: None,
        }
    }

    /// Stable deduplication key over the job's identity.
    pub fn dedup_key(&self) -> String {
        let mut ids = self.assignment_ids.clone().unwrap_or_default();
        ids.sort_unstable();
        let raw = format!(
            "{}|{}|{}|{:?}",
            self.batch_id,
            self.start_date,
            self.end_date.map(|d| d.to_string()).unwrap_or_default(),
            ids
        );
        let digest = Sha256::digest(raw.as_bytes());
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(&mut out, "{byte:02x}");
        }
        out
    }
}

/// What `enqueue` hands back: the task id, and whether an identical job was
/// already in flight.
#[derive(Debug, Clone, Copy)]
pub struct EnqueueReceipt {
    pub task_id: Uuid,
    pub deduplicated: bool,
}

pub struct Scheduler {
    recomputer: Arc<Recomputer>,
    semaphore: Arc<Semaphore>,
    pending: Arc<DashMap<String, Uuid>>,
    deadline: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        recomputer: Arc<Recomputer>,
        max_concurrency: usize,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            recomputer,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            pending: Arc::new(DashMap::new()),
            deadline,
            cancel,
        }
    }

    /// Enqueue a job unless an identical one is already pending or running.
    pub fn enqueue(&self, spec: JobSpec) -> EnqueueReceipt {
        use dashmap::mapref::entry::Entry;

        let key = spec.dedup_key();
        match self.pending.entry(key.clone()) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    task_id = %existing.get(),
                    batch_id = spec.batch_id,
                    "recompute job deduplicated"
                );
                EnqueueReceipt {
                    task_id: *existing.get(),
                    deduplicated: true,
                }
            }
            Entry::Vacant(slot) => {
                let task_id = Uuid::new_v4();
                slot.insert(task_id);
                self.spawn_worker(task_id, key, spec);
                EnqueueReceipt {
                    task_id,
                    deduplicated: false,
                }
            }
        }
    }

    fn spawn_worker(&self, task_id: Uuid, key: String, spec: JobSpec) {
        let recomputer = self.recomputer.clone();
        let semaphore = self.semaphore.clone();
        let pending = self.pending.clone();
        let deadline = self.deadline;
        let cancel = self.cancel.clone();

        let span = tracing::info_span!(
            "recompute_job",
            task_id = %task_id,
            batch_id = spec.batch_id,
            start = %spec.start_date,
        );

        tokio::spawn(
            async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    pending.remove(&key);
                    return;
                };

                let mut attempt: u8 = 0;
                loop {
                    attempt += 1;
                    let run = recomputer.recompute_batch(
                        spec.batch_id,
                        spec.start_date,
                        spec.end_date,
                        spec.assignment_ids.as_deref(),
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!("scheduler shutting down; job abandoned");
                            break;
                        }
                        result = tokio::time::timeout(deadline, run) => match result {
                            Ok(Ok(outcome)) => {
                                tracing::info!(
                                    assignments_processed = outcome.assignments_processed,
                                    rows_created = outcome.total_rows_created,
                                    rows_updated = outcome.total_rows_updated,
                                    errors = outcome.total_errors,
                                    "recompute job finished"
                                );
                                break;
                            }
                            Ok(Err(err)) => {
                                tracing::warn!(error = %err, "recompute job failed");
                                break;
                            }
                            Err(_) => {
                                // Deadline: the in-flight transaction dropped and
                                // rolled back; partial progress is never visible.
                                if attempt >= 2 {
                                    tracing::warn!(attempt, "recompute job deadline exceeded; giving up");
                                    break;
                                }
                                tracing::warn!(attempt, "recompute job deadline exceeded; re-running");
                            }
                        }
                    }
                }

                pending.remove(&key);
            }
            .instrument(span),
        );
    }

    /// Number of jobs pending or running (used by health reporting).
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}
