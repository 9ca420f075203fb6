//! # Priority Scheduler
//!
//! Queues completion jobs, orders them by what the user is looking at, and
//! runs at most `max_concurrent_jobs` of them through a [`RecordCompleter`].
//!
//! ## Worker
//!
//! A single worker task owns dequeueing. It first waits for a free slot on
//! the concurrency semaphore, then for a queued job, woken through a
//! [`Notify`] by `enqueue_load`. Each dequeued job runs on its own task
//! holding the slot's permit until the job finishes.
//!
//! ## Failure
//!
//! A job that fails, panics or exceeds `job_timeout` hands its original
//! records to the callback. Jobs still queued at shutdown do the same. The
//! callback is invoked exactly once per job in every case.
//!
//! ## Usage
//!
//! ```ignore
//! use core_scheduler::{LoadOptions, PriorityScheduler, SchedulerConfig};
//!
//! let scheduler = PriorityScheduler::new(SchedulerConfig::default(), weights, pipeline)?;
//! scheduler.start();
//!
//! scheduler.set_priority("home", "forYou");
//! scheduler.enqueue_load(records, LoadOptions::new("home", "forYou"), |completed| {
//!     render(completed);
//! });
//! ```

use crate::config::{PriorityWeights, SchedulerConfig};
use crate::error::{Result, SchedulerError};
use crate::job::{CompletionJob, JobId, JobState, JobSummary};
use crate::priority::{score, LoadOptions, PriorityContext};
use crate::queue::JobQueue;
use bridge_traits::TrackRecord;
use core_metadata::{CompletionRequest, RecordCompleter};
use core_runtime::events::{EngineEvent, EventBus, JobEvent};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Scheduler counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Jobs waiting in the queue
    pub queued: usize,
    /// Jobs currently running
    pub in_flight: usize,
    pub submitted: u64,
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: JobQueue,
    context: PriorityContext,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

struct Inner {
    config: SchedulerConfig,
    weights: PriorityWeights,
    completer: Arc<dyn RecordCompleter>,
    state: Mutex<QueueState>,
    wake: Notify,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    in_flight: AtomicUsize,
    counters: Counters,
    event_bus: Option<EventBus>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Priority-ordered, concurrency-bounded job runner.
#[derive(Clone)]
pub struct PriorityScheduler {
    inner: Arc<Inner>,
}

impl PriorityScheduler {
    pub fn new(
        config: SchedulerConfig,
        weights: PriorityWeights,
        completer: Arc<dyn RecordCompleter>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
                config,
                weights,
                completer,
                state: Mutex::new(QueueState::default()),
                wake: Notify::new(),
                shutdown: CancellationToken::new(),
                in_flight: AtomicUsize::new(0),
                counters: Counters::default(),
                event_bus: None,
                worker: Mutex::new(None),
            }),
        })
    }

    /// Publish job lifecycle events on `event_bus`.
    ///
    /// Must be called before the scheduler is cloned or started.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.event_bus = Some(event_bus);
        } else {
            warn!("Scheduler already shared, event bus not attached");
        }
        self
    }

    /// Spawns the worker on the current tokio runtime. Idempotent.
    pub fn start(&self) {
        let mut worker = lock(&self.inner.worker);
        if worker.is_some() || self.inner.shutdown.is_cancelled() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(async move { inner.run_worker().await }));
        info!(
            max_concurrent_jobs = self.inner.config.max_concurrent_jobs,
            "Priority scheduler started"
        );
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.worker).is_some() && !self.inner.shutdown.is_cancelled()
    }

    /// Updates the priority context and re-sorts the queue.
    pub fn set_priority(&self, page: impl Into<String>, section: impl Into<String>) {
        let mut state = self.inner.state();
        state.context = PriorityContext::new(page, section);

        let QueueState { queue, context } = &mut *state;
        queue.reprioritize(&self.inner.weights, context);

        debug!(
            page = ?context.page,
            section = ?context.section,
            queued = queue.len(),
            "Priority context updated"
        );
    }

    pub fn priority_context(&self) -> PriorityContext {
        self.inner.state().context.clone()
    }

    /// Queues `records` for completion.
    ///
    /// `on_complete` is invoked exactly once, with the completed records or,
    /// if anything goes wrong, with `records` unchanged. When the scheduler
    /// is shut down or the queue is full it is invoked before this returns.
    pub fn enqueue_load<F>(
        &self,
        records: Vec<TrackRecord>,
        options: LoadOptions,
        on_complete: F,
    ) -> JobId
    where
        F: FnOnce(Vec<TrackRecord>) + Send + 'static,
    {
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let admission = {
            let mut state = self.inner.state();
            let priority = score(&self.inner.weights, &state.context, &options);
            let job = CompletionJob::new(records, options, priority, Box::new(on_complete));

            if self.inner.shutdown.is_cancelled() {
                Err((job, SchedulerError::ShutDown))
            } else if state.queue.len() >= self.inner.config.queue_capacity {
                Err((
                    job,
                    SchedulerError::QueueFull {
                        capacity: self.inner.config.queue_capacity,
                    },
                ))
            } else {
                let id = job.id();
                let records = job.records.len();
                state.queue.push(job);
                debug!(job_id = %id, priority, records, "Job queued");
                self.inner.emit(JobEvent::Queued {
                    job_id: id.to_string(),
                    priority,
                    records,
                });
                Ok(id)
            }
        };

        match admission {
            Ok(id) => {
                self.inner.wake.notify_one();
                id
            }
            Err((job, reason)) => {
                let id = job.id();
                warn!(job_id = %id, reason = %reason, "Job rejected");
                self.inner.fail(job, &reason);
                id
            }
        }
    }

    /// [`enqueue_load`](Self::enqueue_load) with the result delivered through
    /// a channel.
    pub fn enqueue_load_async(
        &self,
        records: Vec<TrackRecord>,
        options: LoadOptions,
    ) -> oneshot::Receiver<Vec<TrackRecord>> {
        let (tx, rx) = oneshot::channel();
        self.enqueue_load(records, options, move |completed| {
            tx.send(completed).ok();
        });
        rx
    }

    /// Jobs waiting to run, in the order they would be dequeued now.
    pub fn queued_jobs(&self) -> Vec<JobSummary> {
        self.inner.state().queue.summaries()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.inner.counters;
        SchedulerStats {
            queued: self.inner.state().queue.len(),
            in_flight: self.in_flight(),
            submitted: counters.submitted.load(Ordering::Relaxed),
            started: counters.started.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stops dequeueing, fails queued jobs and waits for running ones.
    pub async fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();

        let worker = lock(&self.inner.worker).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Scheduler worker panicked");
            }
        }

        // Covers jobs enqueued before start() was ever called.
        self.inner.fail_queued();

        let slots = self.inner.config.max_concurrent_jobs as u32;
        match self.inner.permits.acquire_many(slots).await {
            Ok(_permits) => {}
            Err(e) => warn!(error = %e, "Could not wait for running jobs"),
        }

        info!("Priority scheduler stopped");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        lock(&self.state)
    }

    fn emit(&self, event: JobEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(EngineEvent::Job(event)).ok();
        }
    }

    fn pop_next(&self) -> Option<CompletionJob> {
        let mut state = self.state();
        let QueueState { queue, context } = &mut *state;
        queue.pop(&self.weights, context)
    }

    async fn run_worker(self: Arc<Self>) {
        loop {
            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = loop {
                if let Some(job) = self.pop_next() {
                    break Some(job);
                }
                tokio::select! {
                    _ = self.shutdown.cancelled() => break None,
                    _ = self.wake.notified() => {}
                }
            };

            match job {
                Some(job) => Arc::clone(&self).spawn_job(job, permit),
                None => break,
            }
        }

        self.fail_queued();
        debug!("Scheduler worker exited");
    }

    fn spawn_job(self: Arc<Self>, mut job: CompletionJob, permit: OwnedSemaphorePermit) {
        job.state = JobState::Running;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        self.emit(JobEvent::Started {
            job_id: job.id().to_string(),
            priority: job.priority(),
        });

        let request = CompletionRequest::preferring(job.options.preferred_provider);
        let records = job.records.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let result = self.execute(job.id(), job.priority(), records, request).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match result {
                Ok(records) => {
                    self.counters.completed.fetch_add(1, Ordering::Relaxed);
                    debug!(job_id = %job.id(), records_out = records.len(), "Job completed");
                    self.emit(JobEvent::Completed {
                        job_id: job.id().to_string(),
                        records_in: job.records.len(),
                        records_out: records.len(),
                    });
                    job.finish(JobState::Completed, records);
                }
                Err(e) => self.fail(job, &e),
            }
        });
    }

    /// Runs the completer on its own task so panics surface as errors.
    #[instrument(skip(self, records, request), fields(records = records.len()))]
    async fn execute(
        &self,
        job_id: JobId,
        priority: i64,
        records: Vec<TrackRecord>,
        request: CompletionRequest,
    ) -> Result<Vec<TrackRecord>> {
        let completer = Arc::clone(&self.completer);
        let mut handle = tokio::spawn(async move { completer.complete(records, request).await });

        match tokio::time::timeout(self.config.job_timeout, &mut handle).await {
            Ok(Ok(Ok(records))) => Ok(records),
            Ok(Ok(Err(e))) => Err(SchedulerError::Pipeline(e.to_string())),
            Ok(Err(join_error)) => Err(SchedulerError::Panicked(join_error.to_string())),
            Err(_) => {
                handle.abort();
                Err(SchedulerError::Timeout {
                    timeout_ms: self.config.job_timeout.as_millis() as u64,
                })
            }
        }
    }

    fn fail(&self, job: CompletionJob, reason: &SchedulerError) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        match reason {
            SchedulerError::ShutDown | SchedulerError::QueueFull { .. } => {
                debug!(job_id = %job.id(), reason = %reason, "Returning original records")
            }
            _ => warn!(job_id = %job.id(), reason = %reason, "Job failed, returning original records"),
        }
        self.emit(JobEvent::Failed {
            job_id: job.id().to_string(),
            reason: reason.to_string(),
        });
        job.fail_with_original();
    }

    fn fail_queued(&self) {
        let jobs = self.state().queue.drain();
        if !jobs.is_empty() {
            info!(jobs = jobs.len(), "Failing queued jobs at shutdown");
        }
        for job in jobs {
            self.fail(job, &SchedulerError::ShutDown);
        }
    }
}
