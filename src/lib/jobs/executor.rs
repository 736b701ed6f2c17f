use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::store::JobStore;
use super::types::{Job, JobKind, JobResult};
use crate::lib::apps::types::{AppAction, OpReport};

/// The work a job carries: an already-bound provisioning or lifecycle
/// call producing its outcome report.
pub type JobWork = Pin<Box<dyn Future<Output = OpReport> + Send + 'static>>;

struct QueuedJob {
    job_id: String,
    work: JobWork,
}

/// Worker pool decoupling engine operations from the request path.
/// `submit` persists the queued record and returns it immediately; a
/// fixed number of workers drain the queue, so one slow engine call
/// cannot stall unrelated requests. The job store is the single source
/// of truth for the outcome.
#[derive(Clone)]
pub struct JobExecutor {
    store: JobStore,
    tx: mpsc::UnboundedSender<QueuedJob>,
}

impl JobExecutor {
    pub fn start(store: JobStore, workers: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        for worker_id in 0..workers.max(1) {
            tokio::spawn(run_worker(worker_id, store.clone(), rx.clone()));
        }
        JobExecutor { store, tx }
    }

    pub fn submit(
        &self,
        kind: JobKind,
        app_id: &str,
        action: Option<AppAction>,
        work: JobWork,
    ) -> JobResult<Job> {
        let job = self
            .store
            .create(kind, app_id, action.map(|a| a.as_str()))?;

        if self
            .tx
            .send(QueuedJob {
                job_id: job.id.clone(),
                work,
            })
            .is_err()
        {
            // No workers left to drain the queue; record that instead of
            // leaving the job queued forever.
            self.store.finish(&job.id, false, "executor is not running")?;
        }

        Ok(job)
    }
}

async fn run_worker(
    worker_id: usize,
    store: JobStore,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
) {
    loop {
        let queued = { rx.lock().await.recv().await };
        let Some(QueuedJob { job_id, work }) = queued else {
            break;
        };

        if let Err(err) = store.mark_running(&job_id) {
            eprintln!("Worker {}: marking job {} running: {}", worker_id, job_id, err);
        }

        // The work runs under its own task so a panic surfaces here as a
        // JoinError and lands on the record; nothing escapes the worker.
        let report = match tokio::spawn(work).await {
            Ok(report) => report,
            Err(err) => OpReport::failure(format!("job aborted: {}", err)),
        };

        if let Err(err) = store.finish(&job_id, report.ok, &report.message) {
            eprintln!("Worker {}: finishing job {}: {}", worker_id, job_id, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::jobs::types::JobStatus;
    use std::time::Duration;

    async fn wait_terminal(store: &JobStore, job_id: &str) -> Job {
        for _ in 0..200 {
            let job = store.get(job_id).unwrap().unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached a terminal status", job_id);
    }

    #[tokio::test]
    async fn submitted_job_runs_to_success() {
        let store = JobStore::open_in_memory().unwrap();
        let executor = JobExecutor::start(store.clone(), 2);

        let job = executor
            .submit(
                JobKind::Install,
                "demo",
                None,
                Box::pin(async { OpReport::success("demo installed") }),
            )
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let done = wait_terminal(&store, &job.id).await;
        assert_eq!(done.status, JobStatus::Success);
        assert_eq!(done.message.as_deref(), Some("demo installed"));

        let started = done.started_at.unwrap();
        let finished = done.finished_at.unwrap();
        assert!(started <= finished);
    }

    #[tokio::test]
    async fn failed_work_lands_as_error_with_its_message() {
        let store = JobStore::open_in_memory().unwrap();
        let executor = JobExecutor::start(store.clone(), 1);

        let job = executor
            .submit(
                JobKind::Action,
                "demo",
                Some(AppAction::Down),
                Box::pin(async { OpReport::failure("engine operation failed: no such image") }),
            )
            .unwrap();
        assert_eq!(job.action.as_deref(), Some("down"));

        let done = wait_terminal(&store, &job.id).await;
        assert_eq!(done.status, JobStatus::Error);
        assert!(done.message.unwrap().contains("no such image"));
    }

    #[tokio::test]
    async fn panicking_work_is_folded_into_the_record() {
        let store = JobStore::open_in_memory().unwrap();
        let executor = JobExecutor::start(store.clone(), 1);

        let job = executor
            .submit(
                JobKind::Install,
                "demo",
                None,
                Box::pin(async { panic!("unexpected fault") }),
            )
            .unwrap();

        let done = wait_terminal(&store, &job.id).await;
        assert_eq!(done.status, JobStatus::Error);
        assert!(done.message.unwrap().contains("job aborted"));
    }

    #[tokio::test]
    async fn a_slow_job_does_not_block_an_unrelated_one() {
        let store = JobStore::open_in_memory().unwrap();
        let executor = JobExecutor::start(store.clone(), 2);

        let slow = executor
            .submit(
                JobKind::Install,
                "slow",
                None,
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(1000)).await;
                    OpReport::success("slow done")
                }),
            )
            .unwrap();
        let fast = executor
            .submit(
                JobKind::Install,
                "fast",
                None,
                Box::pin(async { OpReport::success("fast done") }),
            )
            .unwrap();

        let fast_done = wait_terminal(&store, &fast.id).await;
        assert_eq!(fast_done.status, JobStatus::Success);

        let slow_now = store.get(&slow.id).unwrap().unwrap();
        assert!(!slow_now.status.is_terminal());

        let slow_done = wait_terminal(&store, &slow.id).await;
        assert_eq!(slow_done.status, JobStatus::Success);
    }
}
