// src/orchestrator.rs
//! Top-level report run: validate, admit, acquire, prompt, generate, extract.
//!
//! Each step either advances or ends the run in `Errored`; nothing is re-entered.
//! The whole run sits under one deadline; once it fires no further step is scheduled.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::acquire::{from_supplied, AcquisitionError, AcquisitionStatus, ContentAcquisitionPipeline};
use crate::config::AppConfig;
use crate::error::ReportError;
use crate::extract::ReportExtractor;
use crate::progress::{ProgressEvent, ProgressSink, Stage};
use crate::prompt;
use crate::providers::{GenerationDispatcher, ProviderRegistry};
use crate::rate_limit::{OpClass, RateLimiter};
use crate::types::{GenerationRequest, Report};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("report_requests_total", "Report runs started.");
        describe_counter!("report_errors_total", "Report runs that ended in error, by kind.");
        describe_histogram!("report_duration_ms", "Wall time of a report run in milliseconds.");
    });
}

/// Successful run: the report plus how its content was obtained.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReportOutcome {
    #[serde(flatten)]
    pub report: Report,
    pub acquisition: AcquisitionStatus,
}

pub struct ReportOrchestrator {
    config: Arc<AppConfig>,
    limiter: RateLimiter,
    pipeline: ContentAcquisitionPipeline,
    registry: ProviderRegistry,
    dispatcher: GenerationDispatcher,
    extractor: ReportExtractor,
}

impl ReportOrchestrator {
    pub fn new(
        config: Arc<AppConfig>,
        limiter: RateLimiter,
        pipeline: ContentAcquisitionPipeline,
        dispatcher: GenerationDispatcher,
    ) -> Self {
        let registry = ProviderRegistry::new(config.clone());
        Self {
            config,
            limiter,
            pipeline,
            registry,
            dispatcher,
            extractor: ReportExtractor,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Run one report under the configured deadline.
    pub async fn run(
        &self,
        req: GenerationRequest,
        progress: &ProgressSink,
    ) -> Result<ReportOutcome, ReportError> {
        ensure_metrics_described();
        counter!("report_requests_total").increment(1);
        let started = Instant::now();
        let deadline = self.config.deadline();

        let result = match tokio::time::timeout(deadline, self.run_steps(req, progress)).await {
            Ok(r) => r,
            Err(_) => Err(ReportError::Timeout {
                after_secs: deadline.as_secs(),
            }),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        histogram!("report_duration_ms").record(elapsed_ms as f64);
        match &result {
            Ok(out) => {
                progress.emit(ProgressEvent::StageEntered(Stage::Done));
                tracing::info!(
                    target: "report",
                    sections = out.report.sections.len(),
                    sources = out.report.sources.len(),
                    elapsed_ms,
                    "report done"
                );
            }
            Err(e) => {
                progress.emit(ProgressEvent::StageEntered(Stage::Errored));
                counter!("report_errors_total", "kind" => e.kind().as_str()).increment(1);
                tracing::warn!(target: "report", kind = e.kind().as_str(), error = %e, elapsed_ms, "report failed");
            }
        }
        result
    }

    async fn run_steps(
        &self,
        req: GenerationRequest,
        progress: &ProgressSink,
    ) -> Result<ReportOutcome, ReportError> {
        progress.emit(ProgressEvent::StageEntered(Stage::Validating));
        self.validate(&req)?;

        progress.emit(ProgressEvent::StageEntered(Stage::RateLimitCheck));
        let limit = self.config.rate_limits.limit_for(OpClass::ReportGeneration);
        let admission = self
            .limiter
            .allow_class(OpClass::ReportGeneration, None, limit)
            .await?;
        if !admission.is_admitted() {
            return Err(ReportError::RateLimited {
                class: OpClass::ReportGeneration.as_str(),
            });
        }

        progress.emit(ProgressEvent::StageEntered(Stage::Acquiring));
        let acquired = if req.acquired_content.is_empty() {
            self.pipeline.acquire(&req.sources, progress).await
        } else {
            from_supplied(req.acquired_content)
        };
        let acquired = acquired.map_err(|e| match e {
            AcquisitionError::RateLimited => ReportError::RateLimited {
                class: OpClass::ContentFetch.as_str(),
            },
            AcquisitionError::NoUsableContent { total } => ReportError::NoUsableContent { total },
            AcquisitionError::Internal(msg) => ReportError::Internal(msg),
        })?;

        progress.emit(ProgressEvent::StageEntered(Stage::Prompting));
        let usable: Vec<_> = acquired.usable().cloned().collect();
        let prompt_text = prompt::render(&req.prompt, &usable, self.config.prompt.max_chars_per_source);
        tracing::debug!(target: "report", blocks = usable.len(), prompt_chars = prompt_text.len(), "prompt rendered");

        progress.emit(ProgressEvent::StageEntered(Stage::Generating));
        let handle = self.registry.resolve(req.platform.trim(), req.model.trim())?;
        let raw = self.dispatcher.generate(&prompt_text, &handle).await?;

        progress.emit(ProgressEvent::StageEntered(Stage::Extracting));
        let draft = self.extractor.extract(&raw)?;

        Ok(ReportOutcome {
            report: draft.into_report(req.sources),
            acquisition: acquired.status,
        })
    }

    fn validate(&self, req: &GenerationRequest) -> Result<(), ReportError> {
        if req.sources.is_empty() {
            return Err(ReportError::BadRequest("at least one source is required".into()));
        }
        if req.prompt.trim().is_empty() {
            return Err(ReportError::BadRequest("prompt is required".into()));
        }
        if req.platform.trim().is_empty() || req.model.trim().is_empty() {
            return Err(ReportError::BadRequest("platform and model are required".into()));
        }
        let cap = self.config.search.max_selectable_results;
        if req.sources.len() > cap {
            return Err(ReportError::BadRequest(format!(
                "at most {cap} sources may be selected, got {}",
                req.sources.len()
            )));
        }
        Ok(())
    }
}
