//! Bounded worker pool over a pluggable job processor.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sievefile_core::{DEFAULT_BUFFER_SIZE, Job, MAX_WORKER_COUNT, ScanError, ScanResult};

/// Turns one [`Job`] into zero or more results.
///
/// Implementations run on tokio's blocking thread pool, so they may perform
/// synchronous file system I/O.
pub trait JobProcessor: Send + Sync + 'static {
    /// Process a single job.
    fn process(&self, job: Job) -> Vec<ScanResult>;
}

impl<F> JobProcessor for F
where
    F: Fn(Job) -> Vec<ScanResult> + Send + Sync + 'static,
{
    fn process(&self, job: Job) -> Vec<ScanResult> {
        self(job)
    }
}

/// Resolve a requested worker count to an effective one.
///
/// Zero means the available parallelism. The result is always in
/// `1..=MAX_WORKER_COUNT`.
pub fn effective_worker_count(requested: usize) -> usize {
    let count = if requested == 0 {
        num_cpus::get()
    } else {
        requested
    };
    count.clamp(1, MAX_WORKER_COUNT)
}

/// Fixed-size pool of workers fed through a bounded job queue.
///
/// A pool is scan-scoped: create it, [`start`](Self::start) it, submit jobs,
/// then [`stop`](Self::stop) it once. Results stream out of
/// [`take_results`](Self::take_results) and the stream closes after `stop`
/// has drained every worker.
pub struct WorkerPool<P> {
    worker_count: usize,
    processor: Arc<P>,
    cancel: CancellationToken,
    job_tx: Option<mpsc::Sender<Job>>,
    job_rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    result_tx: Option<mpsc::Sender<ScanResult>>,
    result_rx: Option<mpsc::Receiver<ScanResult>>,
    workers: Vec<JoinHandle<()>>,
    started: bool,
}

impl<P: JobProcessor> WorkerPool<P> {
    /// Create a pool. `worker_count == 0` auto-detects; `buffer_size == 0`
    /// uses the default capacity.
    pub fn new(worker_count: usize, buffer_size: usize, processor: P) -> Self {
        let buffer_size = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        let (job_tx, job_rx) = mpsc::channel(buffer_size);
        let (result_tx, result_rx) = mpsc::channel(buffer_size);

        Self {
            worker_count: effective_worker_count(worker_count),
            processor: Arc::new(processor),
            cancel: CancellationToken::new(),
            job_tx: Some(job_tx),
            job_rx: Arc::new(Mutex::new(job_rx)),
            result_tx: Some(result_tx),
            result_rx: Some(result_rx),
            workers: Vec::new(),
            started: false,
        }
    }

    /// Tie the pool to an external cancellation signal.
    ///
    /// The pool cancels only its own child token, never `parent`.
    pub fn with_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Number of workers this pool runs.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The pool's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Take the result stream. Returns `None` after the first call.
    pub fn take_results(&mut self) -> Option<mpsc::Receiver<ScanResult>> {
        self.result_rx.take()
    }

    /// Spawn the workers. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.started {
            tracing::warn!("worker pool already started");
            return;
        }
        let Some(result_tx) = self.result_tx.as_ref() else {
            tracing::warn!("worker pool already stopped");
            return;
        };
        self.started = true;

        for id in 0..self.worker_count {
            self.workers.push(tokio::spawn(run_worker(
                id,
                Arc::clone(&self.job_rx),
                result_tx.clone(),
                Arc::clone(&self.processor),
                self.cancel.clone(),
            )));
        }
        tracing::debug!(workers = self.worker_count, "worker pool started");
    }

    /// Queue a job, waiting while the queue is full.
    ///
    /// Returns `false` if the job was dropped because the pool is stopped or
    /// cancelled. A dropped job is not an error.
    pub async fn submit(&self, job: Job) -> bool {
        let Some(job_tx) = self.job_tx.as_ref() else {
            tracing::debug!(path = %job.path.display(), "pool stopped, dropping job");
            return false;
        };
        if self.cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = job_tx.send(job) => sent.is_ok(),
        }
    }

    /// Send a result that needs no processing straight to the result stream.
    ///
    /// Follows the same rules as [`submit`](Self::submit): returns `false`
    /// once the pool is stopped or cancelled.
    pub async fn forward(&self, result: ScanResult) -> bool {
        let (Some(_), Some(result_tx)) = (self.job_tx.as_ref(), self.result_tx.as_ref()) else {
            return false;
        };
        if self.cancel.is_cancelled() {
            return false;
        }

        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            sent = result_tx.send(result) => sent,
        };
        if sent.is_err() {
            self.cancel.cancel();
            return false;
        }
        true
    }

    /// Close the queue, wait for every worker to drain, then close the
    /// result stream.
    pub async fn stop(&mut self) {
        if self.job_tx.take().is_none() {
            tracing::warn!("worker pool already stopped");
            return;
        }

        for worker in self.workers.drain(..) {
            if let Err(err) = worker.await {
                tracing::warn!(%err, "worker task ended abnormally");
            }
        }

        self.result_tx = None;
        tracing::debug!("worker pool stopped");
    }
}

async fn run_worker<P: JobProcessor>(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<ScanResult>,
    processor: Arc<P>,
    cancel: CancellationToken,
) {
    loop {
        let job = {
            let mut jobs = jobs.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = jobs.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };
        if cancel.is_cancelled() {
            break;
        }

        let path = job.path.clone();
        let processor = Arc::clone(&processor);
        let produced = match tokio::task::spawn_blocking(move || processor.process(job)).await {
            Ok(produced) => produced,
            Err(err) => {
                tracing::warn!(worker = id, path = %path.display(), %err, "job processing failed");
                vec![ScanResult::Error(ScanError::Worker {
                    message: format!("{}: {err}", path.display()),
                })]
            }
        };

        for result in produced {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                sent = results.send(result) => sent,
            };
            if sent.is_err() {
                // Nobody is listening any more; unblock the producer.
                cancel.cancel();
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::Duration;

    use sievefile_core::FileEntry;

    fn fake_entry(job: &Job) -> FileEntry {
        FileEntry {
            path: job.path.clone(),
            name: job.path.to_string_lossy().as_ref().into(),
            is_dir: false,
            is_symlink: false,
            is_binary: false,
            size: job.depth as u64,
            modified: std::time::SystemTime::UNIX_EPOCH,
        }
    }

    fn echo(job: Job) -> Vec<ScanResult> {
        vec![ScanResult::Entry(fake_entry(&job))]
    }

    #[test]
    fn test_effective_worker_count() {
        assert_eq!(effective_worker_count(0), num_cpus::get().clamp(1, MAX_WORKER_COUNT));
        assert_eq!(effective_worker_count(3), 3);
        assert_eq!(effective_worker_count(MAX_WORKER_COUNT + 1), MAX_WORKER_COUNT);
        assert_eq!(effective_worker_count(10_000), MAX_WORKER_COUNT);
    }

    #[tokio::test]
    async fn test_processes_every_job() {
        let mut pool = WorkerPool::new(4, 2, echo);
        let mut results = pool.take_results().unwrap();
        pool.start();

        let producer = tokio::spawn(async move {
            for i in 0..50 {
                assert!(pool.submit(Job::new(format!("/job/{i}"), 1)).await);
            }
            pool.stop().await;
        });

        let mut seen = HashSet::new();
        while let Some(result) = results.recv().await {
            seen.insert(result.into_result().unwrap().path);
        }
        producer.await.unwrap();

        assert_eq!(seen.len(), 50);
        assert!(seen.contains(&PathBuf::from("/job/49")));
    }

    #[tokio::test]
    async fn test_panicking_job_is_contained() {
        let processor = |job: Job| {
            if job.path.ends_with("bad") {
                panic!("processor blew up");
            }
            echo(job)
        };
        let mut pool = WorkerPool::new(1, 4, processor);
        let mut results = pool.take_results().unwrap();
        pool.start();

        let producer = tokio::spawn(async move {
            pool.submit(Job::new("/a", 1)).await;
            pool.submit(Job::new("/bad", 1)).await;
            pool.submit(Job::new("/b", 1)).await;
            pool.stop().await;
        });

        let mut entries = 0;
        let mut errors = 0;
        while let Some(result) = results.recv().await {
            match result {
                ScanResult::Entry(_) => entries += 1,
                ScanResult::Error(err) => {
                    assert!(matches!(err, ScanError::Worker { .. }));
                    errors += 1;
                }
            }
        }
        producer.await.unwrap();

        assert_eq!(entries, 2);
        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn test_processor_may_emit_nothing() {
        let mut pool = WorkerPool::new(2, 4, |_job: Job| Vec::new());
        let mut results = pool.take_results().unwrap();
        pool.start();
        pool.submit(Job::new("/a", 1)).await;
        pool.stop().await;

        assert!(results.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_submit_after_stop_is_dropped() {
        let mut pool = WorkerPool::new(2, 4, echo);
        let mut results = pool.take_results().unwrap();
        pool.start();
        pool.stop().await;

        assert!(!pool.submit(Job::new("/late", 1)).await);
        assert!(results.recv().await.is_none());

        // A second stop is a no-op.
        pool.stop().await;
    }

    #[tokio::test]
    async fn test_forwarded_results_join_the_stream() {
        let mut pool = WorkerPool::new(2, 4, echo);
        let mut results = pool.take_results().unwrap();
        pool.start();

        assert!(pool.submit(Job::new("/a", 1)).await);
        assert!(
            pool.forward(ScanResult::Error(ScanError::Other {
                message: "unlistable".to_string(),
            }))
            .await
        );
        pool.stop().await;
        assert!(!pool.forward(ScanResult::Error(ScanError::Other {
            message: "late".to_string(),
        }))
        .await);

        let mut entries = 0;
        let mut errors = Vec::new();
        while let Some(result) = results.recv().await {
            match result {
                ScanResult::Entry(_) => entries += 1,
                ScanResult::Error(err) => errors.push(err.to_string()),
            }
        }
        assert_eq!(entries, 1);
        assert_eq!(errors, vec!["unlistable".to_string()]);
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_producer() {
        let parent = CancellationToken::new();
        let mut pool = WorkerPool::new(1, 1, |job: Job| {
            std::thread::sleep(Duration::from_millis(20));
            echo(job)
        })
        .with_cancellation(&parent);
        // Results are never read, so the pipeline backs up quickly.
        let _results = pool.take_results().unwrap();
        pool.start();

        let producer = tokio::spawn(async move {
            let mut accepted = 0;
            for i in 0..1000 {
                if pool.submit(Job::new(format!("/{i}"), 1)).await {
                    accepted += 1;
                }
            }
            pool.stop().await;
            accepted
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        parent.cancel();

        let accepted = tokio::time::timeout(Duration::from_secs(5), producer)
            .await
            .expect("producer hung after cancellation")
            .unwrap();
        assert!(accepted < 1000);
    }

    #[tokio::test]
    async fn test_dropped_consumer_cancels_pool() {
        let mut pool = WorkerPool::new(1, 1, echo);
        let results = pool.take_results().unwrap();
        pool.start();
        drop(results);

        let producer = tokio::spawn(async move {
            for i in 0..100 {
                pool.submit(Job::new(format!("/{i}"), 1)).await;
            }
            pool.stop().await;
            pool.cancellation().is_cancelled()
        });

        let cancelled = tokio::time::timeout(Duration::from_secs(5), producer)
            .await
            .expect("producer hung with no consumer")
            .unwrap();
        assert!(cancelled);
    }
}
