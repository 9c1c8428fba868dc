//! Decomposition Worker Pool (C3).
//!
//! A fixed number of long-lived Tokio tasks drain a bounded job queue and
//! run the CPU-bound harmonic decomposition via `spawn_blocking` — the
//! idiom that replaces the original's `ProcessPoolExecutor`: it isolates
//! CPU-bound work onto the blocking thread pool without stealing the async
//! executor's worker threads. Results are delivered over a channel, never
//! a callback (Design Notes: "callbacks become message passing").

use std::sync::Arc;
use std::time::Duration;

use resonance_core::{DecomposeJob, DecomposeResult};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct WorkerPool {
    submit_tx: mpsc::Sender<DecomposeJob>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `max_workers` worker tasks sharing one bounded job queue.
    /// `results_tx` is cloned into every worker; the orchestrator owns the
    /// matching receiver.
    pub fn new(
        max_workers: usize,
        queue_max_size: usize,
        job_timeout: Duration,
        results_tx: mpsc::UnboundedSender<DecomposeResult>,
    ) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel(queue_max_size);
        let shared_rx = Arc::new(Mutex::new(submit_rx));

        let workers = (0..max_workers.max(1))
            .map(|worker_id| {
                let shared_rx = shared_rx.clone();
                let results_tx = results_tx.clone();
                tokio::spawn(async move { worker_loop(worker_id, shared_rx, results_tx, job_timeout).await })
            })
            .collect();

        Self { submit_tx, workers }
    }

    /// Non-blocking submit. Returns `false` (never errors, never blocks)
    /// when the queue is full — matching the original's
    /// `asyncio.QueueFull` → drop semantics.
    pub fn submit(&self, job: DecomposeJob) -> bool {
        match self.submit_tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => false,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Closes the submission channel and waits for every worker to drain
    /// its in-flight job (bounded by that job's own timeout) rather than
    /// cancelling them outright.
    pub async fn shutdown(self) {
        drop(self.submit_tx);
        for handle in self.workers {
            if let Err(err) = handle.await {
                warn!(%err, "worker task panicked during shutdown");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    shared_rx: Arc<Mutex<mpsc::Receiver<DecomposeJob>>>,
    results_tx: mpsc::UnboundedSender<DecomposeResult>,
    job_timeout: Duration,
) {
    loop {
        let job = {
            let mut rx = shared_rx.lock().await;
            rx.recv().await
        };

        let Some(job) = job else {
            info!(worker_id, "worker shutting down, queue closed");
            return;
        };

        let result = run_job(job.clone(), job_timeout).await;
        if results_tx.send(result).is_err() {
            warn!(worker_id, "results receiver dropped, discarding decomposition result");
        }
    }
}

async fn run_job(job: DecomposeJob, job_timeout: Duration) -> DecomposeResult {
    let start = std::time::Instant::now();
    let job_for_blocking = job.clone();

    let outcome = tokio::time::timeout(
        job_timeout,
        tokio::task::spawn_blocking(move || resonance_audio::decompose(&job_for_blocking)),
    )
    .await;

    match outcome {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(err))) => {
            DecomposeResult::failure(job, err.to_string(), start.elapsed().as_secs_f64() * 1000.0)
        }
        Ok(Err(join_err)) => {
            DecomposeResult::failure(job, format!("worker task panicked: {join_err}"), start.elapsed().as_secs_f64() * 1000.0)
        }
        Err(_) => DecomposeResult::failure(
            job,
            format!("decomposition exceeded {job_timeout:?} timeout"),
            start.elapsed().as_secs_f64() * 1000.0,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::SlotId;
    use std::path::PathBuf;

    fn sample_job() -> DecomposeJob {
        DecomposeJob {
            session_id: uuid::Uuid::nil(),
            turn_index: 1,
            slot_id: SlotId::new(1).unwrap(),
            agent_id: "lumen".to_string(),
            voice_profile: "warm_professional".to_string(),
            tts_basename: "slot-1_lumen_warm_professional".to_string(),
            input_path: PathBuf::from("/nonexistent/input.wav"),
            output_dir: PathBuf::from("/nonexistent/out"),
            target_slot_id: None,
            n_waves: 3,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_past_capacity_is_dropped_not_blocked() {
        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(1, 1, Duration::from_secs(5), results_tx);

        assert!(pool.submit(sample_job()));
        // Queue capacity 1 and the single worker may have already pulled the
        // first job, so submit several more to reliably observe a drop.
        let mut saw_drop = false;
        for _ in 0..8 {
            if !pool.submit(sample_job()) {
                saw_drop = true;
                break;
            }
        }
        assert!(saw_drop, "expected at least one submission to be dropped under sustained load");

        pool.shutdown().await;
        while results_rx.try_recv().is_ok() {}
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_input_file_reports_failure_not_panic() {
        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(1, 4, Duration::from_secs(5), results_tx);
        assert!(pool.submit(sample_job()));

        let result = tokio::time::timeout(Duration::from_secs(5), results_rx.recv())
            .await
            .expect("result should arrive")
            .expect("channel should not close early");
        assert!(!result.success);
        assert!(result.error.is_some());

        pool.shutdown().await;
    }
}
