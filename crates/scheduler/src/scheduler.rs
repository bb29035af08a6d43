//! The stateless scheduler (§4.3): `BuildLatestInputs`, `TryNextPendingBuild`,
//! `TriggerImmediately`, and the shared handoff they all end in.

use std::sync::Arc;

use forge_core::error::{CoreError, Result};
use forge_core::id::JobId;
use forge_core::ports::{BuildFactory, BuildsDb, Engine, PipelineDb, Scanner};
use forge_core::types::{Build, BuildInputs, Job, JobInput};
use tokio_util::sync::CancellationToken;

/// Bail out with [`CoreError::Cancelled`] if `cancel` has fired. Checked
/// between DB round-trips, never mid-statement (§5 "Cancellation aborts
/// after the current DB statement").
fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    Ok(())
}

/// Stateless job scheduler. Every method takes the job it operates on and
/// performs one decision; there is no scheduler-held state beyond the
/// injected collaborators (§5 "re-entrant and stateless beyond their DB
/// handles").
#[derive(Clone)]
pub struct Scheduler {
    pipeline_db: Arc<dyn PipelineDb>,
    builds_db: Arc<dyn BuildsDb>,
    scanner: Arc<dyn Scanner>,
    build_factory: Arc<dyn BuildFactory>,
    engine: Arc<dyn Engine>,
}

impl Scheduler {
    #[must_use]
    pub fn new(pipeline_db: Arc<dyn PipelineDb>, builds_db: Arc<dyn BuildsDb>, scanner: Arc<dyn Scanner>, build_factory: Arc<dyn BuildFactory>, engine: Arc<dyn Engine>) -> Self {
        Self { pipeline_db, builds_db, scanner, build_factory, engine }
    }

    /// `BuildLatestInputs(job, resources)`.
    pub async fn build_latest_inputs(&self, job: &Job, cancel: &CancellationToken) -> Result<()> {
        let trigger_inputs = JobInput::trigger_inputs(&job.inputs);
        if trigger_inputs.is_empty() {
            return Ok(());
        }

        let inputs = self.latest_inputs(&trigger_inputs).await?;
        if inputs.len() < trigger_inputs.len() {
            // Not every trigger input has a known version yet; nothing to
            // compare against for duplicate detection.
            return Ok(());
        }

        check_cancelled(cancel)?;
        if self.builds_db.job_build_for_inputs(job.id, &inputs).await?.is_some() {
            return Ok(());
        }

        check_cancelled(cancel)?;
        let build = self.builds_db.create_job_build_with_inputs(job.id, inputs.clone()).await?;
        self.handoff(job, build, inputs).await
    }

    /// `TryNextPendingBuild(job, resources)`.
    pub async fn try_next_pending_build(&self, job: &Job, cancel: &CancellationToken) -> Result<()> {
        let build = match self.builds_db.next_pending_build(job.id).await {
            Ok(Some(build)) => build,
            Ok(None) => return Ok(()),
            Err(err) => {
                tracing::warn!(job_id = %job.id, error = %err, "failed to fetch next pending build");
                return Ok(());
            }
        };

        check_cancelled(cancel)?;
        if !self.builds_db.schedule_build(build.id, job.id).await? {
            return Ok(());
        }

        let trigger_inputs = JobInput::trigger_inputs(&job.inputs);

        let inputs = if build.inputs.is_empty() {
            for input in &trigger_inputs {
                check_cancelled(cancel)?;
                if let Err(err) = self.scanner.scan(&input.resource).await {
                    tracing::warn!(build_id = %build.id, resource = %input.resource, error = %err, "scan failed");
                    self.builds_db.error_build(build.id, &err.to_string()).await?;
                    return Ok(());
                }
            }
            self.latest_inputs(&trigger_inputs).await?
        } else if !covers_trigger_inputs(&build.inputs, &trigger_inputs) {
            self.builds_db
                .error_build(build.id, &CoreError::PredeterminedInputsDifferFromConfiguration.to_string())
                .await?;
            return Ok(());
        } else {
            build.inputs.clone()
        };

        self.handoff(job, build, inputs).await
    }

    /// `TriggerImmediately(job, resources)`. The handoff runs detached; the
    /// caller gets the build back without waiting on the engine.
    pub async fn trigger_immediately(&self, job: &Job, cancel: &CancellationToken) -> Result<Build> {
        check_cancelled(cancel)?;
        let build = self.builds_db.create_job_build(job.id).await?;

        let scheduler = self.clone();
        let job = job.clone();
        let handoff_build = build.clone();
        tokio::spawn(async move {
            if let Err(err) = scheduler.handoff(&job, handoff_build, BuildInputs::new()).await {
                tracing::error!(error = %err, "trigger_immediately handoff failed");
            }
        });

        Ok(build)
    }

    /// Shared handoff: materialise a plan, hand it to the engine, and fire
    /// the build's `Resume` without waiting on it. Build-Factory and Engine
    /// failures are owned by the affected build (§7): they error the build
    /// and do not propagate further, since the tick itself did nothing
    /// wrong.
    async fn handoff(&self, job: &Job, build: Build, inputs: BuildInputs) -> Result<()> {
        let mut plan = match self.build_factory.create(job, &inputs).await {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(build_id = %build.id, error = %err, "build factory failed");
                return self.builds_db.error_build(build.id, &err.to_string()).await;
            }
        };
        plan.build_id = build.id;

        let engine_build = match self.engine.create_build(&build, &plan).await {
            Ok(engine_build) => engine_build,
            Err(err) => {
                tracing::warn!(build_id = %build.id, error = %err, "engine failed to create build");
                return self.builds_db.error_build(build.id, &err.to_string()).await;
            }
        };

        self.builds_db.start_build(build.id).await?;

        tokio::spawn(async move {
            engine_build.resume().await;
        });

        Ok(())
    }

    /// Read the latest known version for each trigger input, skipping any
    /// that have never been scanned.
    async fn latest_inputs(&self, trigger_inputs: &[JobInput]) -> Result<BuildInputs> {
        let mut inputs = BuildInputs::new();
        for input in trigger_inputs {
            if let Some(versioned) = self.pipeline_db.latest_version(&input.resource).await? {
                inputs.insert(input.name.clone(), versioned);
            }
        }
        Ok(inputs)
    }

    /// Convenience used by callers that only have a job id at hand.
    pub async fn job(&self, job_id: JobId) -> Result<Job> {
        self.pipeline_db.job(job_id).await
    }
}

/// `true` if `inputs` has an entry for every currently-configured trigger
/// input (§4.3 step 3: "does not cover every configured `TriggerInputs`").
fn covers_trigger_inputs(inputs: &BuildInputs, trigger_inputs: &[JobInput]) -> bool {
    trigger_inputs.iter().all(|input| inputs.contains_key(&input.name))
}
