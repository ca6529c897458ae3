//! In-memory scan engine for unit tests

use async_trait::async_trait;
use std::sync::Mutex;
use surfacemap_transport::{AlertRecord, EngineError, JobId, ScanEngine};

#[derive(Default)]
struct Script {
    spider_progress: Vec<u8>,
    active_progress: Vec<u8>,
    status_failures: u32,
    calls: Vec<String>,
}

/// Scripted engine: progress values are served in order, the last repeating
#[derive(Default)]
pub(crate) struct FakeEngine {
    script: Mutex<Script>,
    spider_results: Vec<String>,
    alerts: Vec<AlertRecord>,
    fail_context: bool,
    fail_spider: bool,
    fail_active_scan: bool,
}

fn next_progress(queue: &mut Vec<u8>) -> u8 {
    match queue.len() {
        0 => 100,
        1 => queue[0],
        _ => queue.remove(0),
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spider_progress(self, progress: impl IntoIterator<Item = u8>) -> Self {
        self.lock().spider_progress = progress.into_iter().collect();
        self
    }

    pub fn with_active_progress(self, progress: impl IntoIterator<Item = u8>) -> Self {
        self.lock().active_progress = progress.into_iter().collect();
        self
    }

    /// The next `n` status queries fail
    pub fn with_status_failures(self, n: u32) -> Self {
        self.lock().status_failures = n;
        self
    }

    pub fn with_spider_results<S: Into<String>>(mut self, urls: impl IntoIterator<Item = S>) -> Self {
        self.spider_results = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_alerts(mut self, alerts: Vec<AlertRecord>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn failing_context(mut self) -> Self {
        self.fail_context = true;
        self
    }

    pub fn failing_spider(mut self) -> Self {
        self.fail_spider = true;
        self
    }

    pub fn failing_active_scan(mut self) -> Self {
        self.fail_active_scan = true;
        self
    }

    /// Every call made so far, as `operation:argument`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }

    fn status_failure(&self) -> Option<EngineError> {
        let mut script = self.lock();
        if script.status_failures > 0 {
            script.status_failures -= 1;
            return Some(EngineError::UnexpectedResponse("status unavailable".into()));
        }
        None
    }
}

fn refused(operation: &str) -> EngineError {
    EngineError::Api {
        status: 500,
        message: format!("{} refused", operation),
    }
}

#[async_trait]
impl ScanEngine for FakeEngine {
    async fn new_context(&self, name: &str) -> Result<String, EngineError> {
        self.record(format!("new_context:{}", name));
        if self.fail_context {
            return Err(refused("newContext"));
        }
        Ok("1".into())
    }

    async fn include_in_context(&self, context: &str, pattern: &str) -> Result<(), EngineError> {
        self.record(format!("include_in_context:{}:{}", context, pattern));
        Ok(())
    }

    async fn spider_scan(&self, target: &str) -> Result<JobId, EngineError> {
        self.record(format!("spider_scan:{}", target));
        if self.fail_spider {
            return Err(refused("spider"));
        }
        Ok(JobId("0".into()))
    }

    async fn spider_status(&self, _job: &JobId) -> Result<u8, EngineError> {
        if let Some(e) = self.status_failure() {
            return Err(e);
        }
        Ok(next_progress(&mut self.lock().spider_progress))
    }

    async fn spider_results(&self, _job: &JobId) -> Result<Vec<String>, EngineError> {
        Ok(self.spider_results.clone())
    }

    async fn active_scan(&self, target: &str) -> Result<JobId, EngineError> {
        self.record(format!("active_scan:{}", target));
        if self.fail_active_scan {
            return Err(refused("ascan"));
        }
        Ok(JobId("1".into()))
    }

    async fn active_scan_status(&self, _job: &JobId) -> Result<u8, EngineError> {
        if let Some(e) = self.status_failure() {
            return Err(e);
        }
        Ok(next_progress(&mut self.lock().active_progress))
    }

    async fn list_alerts(&self) -> Result<Vec<AlertRecord>, EngineError> {
        Ok(self.alerts.clone())
    }
}
