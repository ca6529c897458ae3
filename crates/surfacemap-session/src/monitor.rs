//! Polling of long-running engine jobs
//!
//! A job is polled until it reports 100%, with a fixed pause between polls.
//! The loop is bounded by a poll count and a wall-clock budget, gives up
//! after too many consecutive failed status queries, and stops between
//! polls when the session is cancelled.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use surfacemap_common::config::ScanConfig;
use surfacemap_core::{Error, Result};
use surfacemap_transport::{AlertRecord, JobId, JobKind, ScanEngine};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounds of one polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two status queries
    pub interval: Duration,
    /// Give up after this many status queries
    pub max_polls: Option<u32>,
    /// Give up once this much time has passed since the first query
    pub max_duration: Option<Duration>,
    /// Failed status queries in a row before the engine error is returned
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_polls: None,
            max_duration: Some(Duration::from_secs(3600)),
            max_consecutive_errors: 3,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_seconds),
            max_polls: config.max_polls,
            max_duration: config.max_poll_seconds.map(Duration::from_secs),
            max_consecutive_errors: config.max_consecutive_poll_errors.max(1),
        }
    }
}

/// Time source of the monitor
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that advances only when slept on; sleeping returns immediately
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Total time slept so far
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Drives engine jobs to completion
pub struct JobMonitor {
    engine: Arc<dyn ScanEngine>,
    policy: PollPolicy,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl JobMonitor {
    pub fn new(engine: Arc<dyn ScanEngine>, policy: PollPolicy) -> Self {
        Self {
            engine,
            policy,
            clock: Arc::new(TokioClock),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll `job` until it reports 100%; returns the number of polls made
    pub async fn wait(&self, kind: JobKind, job: &JobId) -> Result<u32> {
        let label = format!("{} {}", kind, job);
        let started = self.clock.now();
        let mut polls = 0u32;
        let mut consecutive_errors = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled { job: label });
            }

            let elapsed = self.clock.now().saturating_duration_since(started);
            let polls_exhausted = self.policy.max_polls.is_some_and(|max| polls >= max);
            let time_exhausted = self.policy.max_duration.is_some_and(|max| elapsed >= max);
            if polls_exhausted || time_exhausted {
                warn!("{} still running after {} polls, giving up", label, polls);
                return Err(Error::Timeout {
                    job: label,
                    polls,
                    elapsed_secs: elapsed.as_secs(),
                });
            }

            polls += 1;
            match self.engine.job_status(kind, job).await {
                Ok(progress) => {
                    consecutive_errors = 0;
                    info!("{} progress: {}%", kind, progress);
                    if progress >= 100 {
                        debug!("{} completed after {} polls", label, polls);
                        return Ok(polls);
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        "{} status query failed ({}/{}): {}",
                        label, consecutive_errors, self.policy.max_consecutive_errors, e
                    );
                    if consecutive_errors >= self.policy.max_consecutive_errors.max(1) {
                        return Err(e.into());
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(Error::Cancelled { job: label });
                }
                _ = self.clock.sleep(self.policy.interval) => {}
            }
        }
    }

    /// Spider `target` to completion and return every URL it reached
    pub async fn run_spider(&self, target: &str) -> Result<Vec<String>> {
        info!("Starting spider scan on {}", target);
        let job = self.engine.spider_scan(target).await?;
        self.wait(JobKind::Spider, &job).await?;

        let urls = self.engine.spider_results(&job).await?;
        info!("Spider scan completed with {} URLs", urls.len());
        Ok(urls)
    }

    /// Actively scan `target` to completion and return the engine's alerts
    pub async fn run_active_scan(&self, target: &str) -> Result<Vec<AlertRecord>> {
        info!("Starting active scan on {}", target);
        let job = self.engine.active_scan(target).await?;
        self.wait(JobKind::ActiveScan, &job).await?;

        let alerts = self.engine.list_alerts().await?;
        info!("Active scan completed with {} alerts", alerts.len());
        Ok(alerts)
    }
}
