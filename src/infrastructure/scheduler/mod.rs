//! Cron-style job scheduler
//!
//! Jobs are keyed by an id; registering an id twice replaces the earlier job.
//! Every job runs on its own tokio task once the scheduler is started, so
//! callbacks fire outside the event loop.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::errors::SchedulerError;

/// Scheduled callback
pub type JobFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Wrap an async closure into a [`JobFn`]
pub fn job<F, Fut>(f: F) -> JobFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

struct Job {
    spec: String,
    schedule: Schedule,
    callback: JobFn,
    handle: Option<JoinHandle<()>>,
}

impl Job {
    fn spawn(&mut self, id: &str) {
        let schedule = self.schedule.clone();
        let callback = self.callback.clone();
        let id = id.to_string();
        self.handle = Some(tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    debug!("Job {} has no further runs", id);
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;
                debug!("Running job {}", id);
                callback().await;
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Job>,
    running: bool,
}

/// Scheduler facade: `add_func(spec, callback, id)` / `remove_job(id)`
#[derive(Default)]
pub struct Scheduler {
    inner: Mutex<Inner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse a six-field spec (`sec min hour day-of-month month day-of-week`).
    pub fn parse_spec(spec: &str) -> Result<Schedule, SchedulerError> {
        Schedule::from_str(spec).map_err(|e| SchedulerError::InvalidSpec {
            spec: spec.to_string(),
            reason: e.to_string(),
        })
    }

    /// Register `callback` under `id`, replacing any job with the same id.
    ///
    /// Must be called from within a tokio runtime once the scheduler runs.
    pub fn add_func(&self, spec: &str, callback: JobFn, id: impl Into<String>) -> Result<(), SchedulerError> {
        let schedule = Self::parse_spec(spec)?;
        let id = id.into();
        let mut inner = self.lock();

        if let Some(mut old) = inner.jobs.remove(&id) {
            debug!("Replacing job {}", id);
            old.cancel();
        }

        let mut job = Job {
            spec: spec.to_string(),
            schedule,
            callback,
            handle: None,
        };
        if inner.running {
            job.spawn(&id);
        }
        info!("Scheduled job {} [{}]", id, spec);
        inner.jobs.insert(id, job);
        Ok(())
    }

    /// Cancel and forget a job. Returns false for an unknown id.
    pub fn remove_job(&self, id: &str) -> bool {
        match self.lock().jobs.remove(id) {
            Some(mut job) => {
                job.cancel();
                info!("Removed job {}", id);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().jobs.contains_key(id)
    }

    /// `(id, spec)` pairs, sorted by id
    pub fn jobs(&self) -> Vec<(String, String)> {
        let mut jobs: Vec<_> = self
            .lock()
            .jobs
            .iter()
            .map(|(id, job)| (id.clone(), job.spec.clone()))
            .collect();
        jobs.sort();
        jobs
    }

    /// Start firing registered jobs. Idempotent.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.running {
            return;
        }
        inner.running = true;
        for (id, job) in inner.jobs.iter_mut() {
            job.spawn(id);
        }
        info!("Scheduler started with {} jobs", inner.jobs.len());
    }

    /// Stop all timers; jobs stay registered and resume on the next `start`.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if !inner.running {
            return;
        }
        inner.running = false;
        for job in inner.jobs.values_mut() {
            job.cancel();
        }
        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        for job in inner.jobs.values_mut() {
            job.cancel();
        }
        if inner.running && !inner.jobs.is_empty() {
            warn!("Scheduler dropped while running");
        }
    }
}
