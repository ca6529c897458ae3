//! Scan session state machine
//!
//! `Idle -> Validating -> Crawling -> ActiveScanning -> EnumeratingSubdomains
//! -> AnalyzingStructure -> Completed`. Only a validation failure ends the
//! session early (in `Failed`, with no artifacts). Every later phase runs
//! behind its own failure boundary: an error is logged and recorded, and the
//! session moves on to the next phase.

use crate::aggregate::aggregate;
use crate::monitor::{Clock, JobMonitor, PollPolicy, TokioClock};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use surfacemap_common::logging::DeferredLogFile;
use surfacemap_common::Config;
use surfacemap_core::{
    ArtifactStore, AttackSurface, EndpointCollector, EndpointsArtifact, Error, Extra, Form,
    Result, ScanTarget, StructureArtifact,
};
use surfacemap_structure::{ConsolidationReport, Consolidator};
use surfacemap_transport::{EngineError, ScanEngine};
use surfacemap_webapp::{
    ClientConfig, FormExtractor, HttpClient, ProbePolicy, ProberConfig, SubdomainProber,
    UrlValidator,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Validating,
    Crawling,
    ActiveScanning,
    EnumeratingSubdomains,
    AnalyzingStructure,
    Completed,
    Failed,
}

impl Phase {
    /// Phases run after a successful validation, in order
    pub const DISCOVERY: [Phase; 4] = [
        Phase::Crawling,
        Phase::ActiveScanning,
        Phase::EnumeratingSubdomains,
        Phase::AnalyzingStructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Validating => "validating",
            Phase::Crawling => "crawling",
            Phase::ActiveScanning => "active scanning",
            Phase::EnumeratingSubdomains => "enumerating subdomains",
            Phase::AnalyzingStructure => "analyzing structure",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one discovery phase ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    Failed { code: &'static str, message: String },
    /// Not attempted because the session was cancelled
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub outcome: PhaseOutcome,
}

impl PhaseRecord {
    fn from_result(phase: Phase, result: Result<()>) -> Self {
        let outcome = match result {
            Ok(()) => PhaseOutcome::Completed,
            Err(e) => {
                error!("Error during {} [{}]: {}", phase, e.code(), e);
                PhaseOutcome::Failed {
                    code: e.code(),
                    message: e.to_string(),
                }
            }
        };
        Self { phase, outcome }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, PhaseOutcome::Failed { .. })
    }
}

/// Collections owned by one running session
#[derive(Debug, Default)]
pub struct SessionState {
    pub endpoints: EndpointCollector,
    pub forms: Vec<Form>,
    pub attack_surfaces: Vec<AttackSurface>,
    pub subdomains: Vec<String>,
}

impl SessionState {
    pub fn endpoints_artifact(&self) -> EndpointsArtifact {
        EndpointsArtifact {
            endpoints: self.endpoints.to_vec(),
            attack_surfaces: self.attack_surfaces.clone(),
        }
    }

    pub fn structure_artifact(&self) -> StructureArtifact {
        StructureArtifact {
            forms: self.forms.clone(),
            extra: Extra::new(),
        }
    }
}

/// Summary of a finished session
#[derive(Debug)]
pub struct SessionReport {
    pub target: String,
    /// `Completed` or `Failed`
    pub phase: Phase,
    /// Discovery phases in the order they ran
    pub phases: Vec<PhaseRecord>,
    /// Why validation failed
    pub error: Option<Error>,
    pub endpoints: usize,
    pub forms: usize,
    pub attack_surfaces: usize,
    pub subdomains: usize,
    pub consolidation: Option<ConsolidationReport>,
}

impl SessionReport {
    fn failed(target: &str, error: Error) -> Self {
        Self {
            target: target.to_string(),
            phase: Phase::Failed,
            phases: Vec::new(),
            error: Some(error),
            endpoints: 0,
            forms: 0,
            attack_surfaces: 0,
            subdomains: 0,
            consolidation: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Discovery phases that ended in an error
    pub fn failed_phases(&self) -> impl Iterator<Item = &PhaseRecord> {
        self.phases.iter().filter(|p| p.is_failed())
    }

    pub fn outcome(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| &p.outcome)
    }
}

/// One scan of one target
pub struct ScanSession {
    target: String,
    config: Config,
    engine: Arc<dyn ScanEngine>,
    store: ArtifactStore,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    log_file: Option<DeferredLogFile>,
    phase: Phase,
}

impl ScanSession {
    pub fn new(target: impl Into<String>, config: Config, engine: Arc<dyn ScanEngine>) -> Self {
        let store = ArtifactStore::new(&config.scan.output_dir);
        Self {
            target: target.into(),
            config,
            engine,
            store,
            clock: Arc::new(TokioClock),
            cancel: CancellationToken::new(),
            log_file: None,
            phase: Phase::Idle,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Token observed by the job monitors; cancelling it skips the remaining
    /// network phases
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Log file to activate once the target has passed validation
    pub fn with_log_file(mut self, log_file: DeferredLogFile) -> Self {
        self.log_file = Some(log_file);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run every phase and report how the session ended
    pub async fn run(&mut self) -> SessionReport {
        info!("Starting security scan for {}", self.target);

        self.enter(Phase::Validating);
        let target = match self.validate().await {
            Ok(target) => target,
            Err(e) => {
                error!("Scan aborted, target failed validation: {}", e);
                self.enter(Phase::Failed);
                return SessionReport::failed(&self.target, e);
            }
        };

        if let Err(e) = self.store.ensure_dir() {
            warn!("Cannot create {}: {}", self.store.dir().display(), e);
        }
        if let Some(log_file) = &self.log_file {
            if let Err(e) = log_file.activate() {
                warn!("Cannot open {}: {}", log_file.path().display(), e);
            }
        }

        let mut state = SessionState::default();
        let mut phases = Vec::with_capacity(Phase::DISCOVERY.len());
        let mut consolidation = None;

        for phase in Phase::DISCOVERY {
            self.enter(phase);

            if self.cancel.is_cancelled() && phase != Phase::AnalyzingStructure {
                info!("Skipping {}, session cancelled", phase);
                phases.push(PhaseRecord {
                    phase,
                    outcome: PhaseOutcome::Skipped,
                });
                continue;
            }

            let result = match phase {
                Phase::Crawling => self.crawl(&target, &mut state).await,
                Phase::ActiveScanning => self.active_scan(&target, &mut state).await,
                Phase::EnumeratingSubdomains => self.enumerate_subdomains(&target, &mut state).await,
                _ => match self.analyze_structure(&state).await {
                    Ok(report) => {
                        consolidation = report;
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
            };
            phases.push(PhaseRecord::from_result(phase, result));
        }

        self.enter(Phase::Completed);
        info!(
            "Scan completed: {} endpoints, {} forms, {} attack surfaces, {} subdomains",
            state.endpoints.len(),
            state.forms.len(),
            state.attack_surfaces.len(),
            state.subdomains.len()
        );

        SessionReport {
            target: self.target.clone(),
            phase: self.phase,
            phases,
            error: None,
            endpoints: state.endpoints.len(),
            forms: state.forms.len(),
            attack_surfaces: state.attack_surfaces.len(),
            subdomains: state.subdomains.len(),
            consolidation,
        }
    }

    fn enter(&mut self, phase: Phase) {
        info!("Phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn client_config(&self, timeout_seconds: u64) -> ClientConfig {
        ClientConfig::default()
            .with_user_agent(&self.config.scan.user_agent)
            .with_timeout(Duration::from_secs(timeout_seconds))
    }

    fn monitor(&self) -> JobMonitor {
        JobMonitor::new(self.engine.clone(), PollPolicy::from_config(&self.config.scan))
            .with_clock(self.clock.clone())
            .with_cancellation(self.cancel.clone())
    }

    async fn validate(&self) -> Result<ScanTarget> {
        let validator =
            UrlValidator::new(&self.client_config(self.config.scan.validate_timeout_seconds))?;
        validator.validate(&self.target).await
    }

    /// Scope the engine to the target. Failure only costs the scoping.
    async fn setup_context(&self, target: &ScanTarget) {
        let name = &self.config.engine.context_name;
        let pattern = format!("^{}.*$", regex::escape(target.as_str()));

        let result: std::result::Result<(), EngineError> = async {
            self.engine.new_context(name).await?;
            self.engine.include_in_context(name, &pattern).await
        }
        .await;

        match result {
            Ok(()) => info!("Context {} includes {}", name, pattern),
            Err(e) => warn!("Context setup failed, spidering unscoped: {}", e),
        }
    }

    async fn crawl(&self, target: &ScanTarget, state: &mut SessionState) -> Result<()> {
        self.setup_context(target).await;

        let urls = self.monitor().run_spider(target.as_str()).await?;
        state.endpoints.extend(urls);
        info!("Found {} endpoints", state.endpoints.len());
        self.store.write_endpoints(&state.endpoints_artifact())?;

        let client = HttpClient::new(&self.client_config(self.config.scan.page_timeout_seconds))
            .map_err(|e| Error::Configuration(format!("HTTP client: {}", e)))?;
        let extractor = FormExtractor::new(client);
        let extractor = &extractor;

        // Pages are fetched concurrently; only this task touches the form list
        let mut pages = stream::iter(state.endpoints.to_vec())
            .map(move |url| async move { extractor.analyze_or_skip(&url).await })
            .buffered(self.config.scan.page_concurrency.max(1));
        while let Some(forms) = pages.next().await {
            state.forms.extend(forms);
        }

        info!("Extracted {} forms", state.forms.len());
        Ok(())
    }

    async fn active_scan(&self, target: &ScanTarget, state: &mut SessionState) -> Result<()> {
        let alerts = self.monitor().run_active_scan(target.as_str()).await?;
        state.attack_surfaces.extend(aggregate(&alerts));
        info!(
            "Found {} potential vulnerabilities",
            state.attack_surfaces.len()
        );

        self.store.write_endpoints(&state.endpoints_artifact())
    }

    async fn enumerate_subdomains(
        &self,
        target: &ScanTarget,
        state: &mut SessionState,
    ) -> Result<()> {
        let settings = &self.config.subdomains;
        let prober = SubdomainProber::new(
            ProberConfig {
                prefixes: settings.prefixes.clone(),
                policy: if settings.strict {
                    ProbePolicy::Strict
                } else {
                    ProbePolicy::Lenient
                },
                concurrency: self.config.scan.page_concurrency,
                ..Default::default()
            },
            &self.client_config(settings.timeout_seconds),
        )?;

        state.subdomains = prober.enumerate(target.host()).await?;
        self.store.write_subdomains(&state.subdomains)
    }

    async fn analyze_structure(
        &self,
        state: &SessionState,
    ) -> Result<Option<ConsolidationReport>> {
        self.store.write_structure(&state.structure_artifact())?;
        info!(
            "Structure analysis saved {} forms to {}",
            state.forms.len(),
            self.store.structure_path().display()
        );

        if !self.config.structure.consolidate_after_scan {
            return Ok(None);
        }
        if !self.store.endpoints_path().is_file() {
            info!("No endpoint catalog was written, skipping consolidation");
            return Ok(None);
        }

        let report = Consolidator::new(self.store.structure_path(), self.store.endpoints_path())
            .with_backup(self.config.structure.backup)
            .run()?;
        Ok(Some(report))
    }
}
