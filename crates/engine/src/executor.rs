//! Report execution engine.
//!
//! `ReportExecutor` is the central orchestrator for one report run:
//! 1. Checks the report is active and has somewhere to go.
//! 2. Runs Auth → Query → Aggregate → Render → Deliver → Cleanup in order,
//!    each under its own [`RetryPolicy`].
//! 3. Writes the rendered PDF to the output directory before delivery and
//!    removes it only once delivery succeeded.
//! 4. Logs every failure with report id, stage and cause.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use mailer::{recipients_for, OutgoingEmail, SendEmail, TemplateContext};
use orderapi::{AuthToken, OrderQuery, OrderSource, TokenSource};
use render::{RenderRequest, ReportRenderer};
use reports::{aggregate, ConfigError, ConfigStore, OrderRecord, ReportArtifact, ReportConfig};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::StageFailure;
use crate::retry::{execute_with_retry, RetryPolicies};
use crate::{EngineError, RunSummary, Stage, StageRecord};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory rendered reports are written to before delivery.
    pub output_dir: PathBuf,
    /// Used when a report lists no recipients of its own.
    pub default_recipients: Vec<String>,
    /// Keep the rendered file after a successful delivery.
    pub keep_artifacts: bool,
    pub retry: RetryPolicies,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            default_recipients: Vec::new(),
            keep_artifacts: false,
            retry: RetryPolicies::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReportExecutor
// ---------------------------------------------------------------------------

/// Runs report pipelines against injected collaborators.
///
/// The token source is shared between runs so a cached token is reused.
pub struct ReportExecutor {
    tokens: Arc<dyn TokenSource>,
    orders: Arc<dyn OrderSource>,
    mailer: Arc<dyn SendEmail>,
    renderer: ReportRenderer,
    config: ExecutorConfig,
}

/// Stage bookkeeping for one run.
struct RunLog<'a> {
    report_id: &'a str,
    stages: Vec<StageRecord>,
}

impl ReportExecutor {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        orders: Arc<dyn OrderSource>,
        mailer: Arc<dyn SendEmail>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            tokens,
            orders,
            mailer,
            renderer: ReportRenderer::new(),
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one report for `run_date`.
    ///
    /// # Errors
    /// [`EngineError::Config`] if the report is inactive or has no
    /// recipients (nothing is fetched in that case), otherwise
    /// [`EngineError::StageFailed`] naming the stage that gave up.
    #[instrument(skip(self, report), fields(report_id = %report.report_id, %run_date))]
    pub async fn run(
        &self,
        report: &ReportConfig,
        run_date: NaiveDate,
    ) -> Result<RunSummary, EngineError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        if !report.active {
            return Err(ConfigError::Inactive(report.report_id.clone()).into());
        }
        let recipients = recipients_for(report, &self.config.default_recipients)?;
        let query = OrderQuery::for_report(report, run_date);
        info!(%run_id, "starting run for period {}", query.period);

        let mut log = RunLog {
            report_id: &report.report_id,
            stages: Vec::with_capacity(Stage::ALL.len()),
        };

        // ------------------------------------------------------------------
        // Auth
        // ------------------------------------------------------------------
        let tokens = self.tokens.as_ref();
        let token = self
            .stage(&mut log, Stage::Auth, || async move {
                Ok::<_, StageFailure>(tokens.token().await?)
            })
            .await?;

        // ------------------------------------------------------------------
        // Query
        // ------------------------------------------------------------------
        let (token_ref, query_ref) = (&token, &query);
        let records = self
            .stage(&mut log, Stage::Query, || async move {
                self.search(token_ref, query_ref).await
            })
            .await?;
        info!("retrieved {} records", records.len());

        // ------------------------------------------------------------------
        // Aggregate
        // ------------------------------------------------------------------
        let records_ref = records.as_slice();
        let summary = self
            .stage(&mut log, Stage::Aggregate, || async move {
                Ok::<_, StageFailure>(aggregate(records_ref, &report.summary_fields)?)
            })
            .await?;

        // ------------------------------------------------------------------
        // Render
        // ------------------------------------------------------------------
        let request = RenderRequest {
            config: report,
            records: records_ref,
            summary: &summary,
            period: query.period,
            run_date,
        };
        let request_ref = &request;
        let (artifact, artifact_path) = self
            .stage(&mut log, Stage::Render, || async move {
                let artifact = self.renderer.render(request_ref)?;
                let path = self.write_artifact(&artifact).await?;
                Ok::<_, StageFailure>((artifact, path))
            })
            .await?;

        // ------------------------------------------------------------------
        // Deliver
        // ------------------------------------------------------------------
        let ctx = TemplateContext {
            date: run_date,
            report_name: report.name.clone(),
            record_count: records.len(),
        };
        let email = OutgoingEmail::compose(report, recipients.clone(), &ctx, artifact);
        let (mailer, email_ref) = (self.mailer.as_ref(), &email);
        let delivered = self
            .stage(&mut log, Stage::Deliver, || async move {
                Ok::<_, StageFailure>(mailer.send(email_ref).await?)
            })
            .await;
        let delivered_to = match delivered {
            Ok(location) => location,
            Err(err) => {
                warn!("delivery failed, keeping {}", artifact_path.display());
                return Err(err);
            }
        };

        // ------------------------------------------------------------------
        // Cleanup
        // ------------------------------------------------------------------
        let cleanup_started = Instant::now();
        let kept_artifact = if self.config.keep_artifacts {
            Some(artifact_path)
        } else {
            remove_artifact(&artifact_path).await;
            None
        };
        log.stages.push(StageRecord {
            stage: Stage::Cleanup,
            attempts: 1,
            elapsed: cleanup_started.elapsed(),
        });

        info!(%run_id, "report delivered to {delivered_to}");
        Ok(RunSummary {
            run_id,
            report_id: report.report_id.clone(),
            period: query.period,
            record_count: records.len(),
            recipients,
            delivered_to,
            artifact_path: kept_artifact,
            stages: log.stages,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Run every active report in `store`. A failing report is logged and
    /// reported without stopping the others.
    #[instrument(skip(self, store), fields(%run_date))]
    pub async fn run_all(
        &self,
        store: &ConfigStore,
        run_date: NaiveDate,
    ) -> Vec<(String, Result<RunSummary, EngineError>)> {
        let mut outcomes = Vec::new();
        for report in store.active() {
            let outcome = self.run(report, run_date).await;
            if let Err(err) = &outcome {
                error!(report_id = %report.report_id, "run failed: {err}");
            }
            outcomes.push((report.report_id.clone(), outcome));
        }
        let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
        info!("{} reports run, {} failed", outcomes.len(), failed);
        outcomes
    }

    // -----------------------------------------------------------------------
    // Internal: one stage under its retry policy.
    // -----------------------------------------------------------------------

    async fn stage<T, F, Fut>(
        &self,
        log: &mut RunLog<'_>,
        stage: Stage,
        attempt: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StageFailure>>,
    {
        let policy = self.config.retry.for_stage(stage);
        let started = Instant::now();
        info!("stage {stage} started");

        let (result, attempts) = execute_with_retry(stage, log.report_id, policy, attempt).await;
        match result {
            Ok(value) => {
                log.stages.push(StageRecord {
                    stage,
                    attempts,
                    elapsed: started.elapsed(),
                });
                info!("stage {stage} finished after {attempts} attempt(s)");
                Ok(value)
            }
            Err(source) => {
                error!(
                    report_id = %log.report_id,
                    %stage,
                    attempts,
                    "stage failed: {source}"
                );
                Err(EngineError::StageFailed {
                    report_id: log.report_id.to_owned(),
                    stage,
                    attempts,
                    source,
                })
            }
        }
    }

    /// Search, re-authenticating once if the API rejects the token.
    async fn search(
        &self,
        token: &AuthToken,
        query: &OrderQuery,
    ) -> Result<Vec<OrderRecord>, StageFailure> {
        match self.orders.search(token, query).await {
            Err(err) if err.is_unauthorized() => {
                warn!("order API rejected the token, re-authenticating");
                self.tokens.invalidate().await;
                let fresh = self.tokens.token().await?;
                Ok(self.orders.search(&fresh, query).await?)
            }
            other => Ok(other?),
        }
    }

    async fn write_artifact(&self, artifact: &ReportArtifact) -> Result<PathBuf, StageFailure> {
        let dir = &self.config.output_dir;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| StageFailure::Io { path, source }
        };
        tokio::fs::create_dir_all(dir).await.map_err(io_err(dir))?;
        let path = dir.join(&artifact.filename);
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .map_err(io_err(&path))?;
        info!("wrote {} ({} bytes)", path.display(), artifact.bytes.len());
        Ok(path)
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("removed {}", path.display()),
        Err(err) => warn!("could not remove {}: {err}", path.display()),
    }
}
