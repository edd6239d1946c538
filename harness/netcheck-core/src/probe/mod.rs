//! Drives one scheduled connectivity probe from submission to verdict.

pub mod phase;


use std::time::Duration;

use async_trait::async_trait;
use kube::ResourceExt;
use netcheck_models::{ProbeJob, ProbeJobStatus, RoundResult};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::JobStore;
use crate::error::{ClusterError, PollError, ProbeError, SubmitFailure};
use crate::poller::{ConvergencePoller, Observation, PollPolicy, ReadinessCheck};

pub use phase::{JobPhase, Progress, ProgressTracker, Verdict};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Clone, Debug, PartialEq)]
pub struct ProbeOutcome {
    pub name: String,
    pub verdict: Verdict,
    pub history: Vec<RoundResult>,
    pub elapsed: Duration,
}

#[derive(Debug)]
struct JobSnapshot {
    phase: JobPhase,
    status: ProbeJobStatus,
}

/// Completion of a probe job. Every fetch error is retried.
struct JobCompletion<'a, J: ?Sized> {
    store: &'a J,
    name: &'a str,
    tracker: Mutex<ProgressTracker>,
}

#[async_trait]
impl<J> ReadinessCheck for JobCompletion<'_, J>
where
    J: JobStore + ?Sized,
{
    type State = JobSnapshot;

    fn describe(&self) -> String {
        format!("completion of probe job {}", self.name)
    }

    async fn evaluate(&self) -> Result<Observation<JobSnapshot>, ClusterError> {
        let job = match self.store.get(self.name).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job = self.name, "job missing while polling; retrying");
                return Err(ClusterError::api(
                    404,
                    "NotFound",
                    &format!("probe job {} not found", self.name),
                ));
            }
            Err(e) => {
                warn!(job = self.name, error = %e, "fetching job status failed; retrying");
                return Err(e);
            }
        };
        let status = job.status.unwrap_or_default();
        let progress = self.tracker.lock().await.record(&status);
        let phase = phase::observe(Some(&status));
        if progress == Progress::Advanced {
            info!(job = self.name, ?phase, "job progressed");
        }
        let done = progress != Progress::Regressed && status.finish;
        let snapshot = JobSnapshot { phase, status };
        Ok(if done {
            Observation::ready(snapshot)
        } else {
            Observation::pending(snapshot)
        })
    }

    fn is_fatal(&self, _err: &ClusterError) -> bool {
        false
    }
}

/// Submits a probe job once, then watches its status until the agents mark
/// it finished, and classifies the reported rounds.
pub struct ScheduledProbeController<J> {
    store: J,
    poller: ConvergencePoller,
    poll_interval: Duration,
}

impl<J: JobStore> ScheduledProbeController<J> {
    pub fn new(store: J) -> Self {
        Self {
            store,
            poller: ConvergencePoller::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_WAIT);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.poller = ConvergencePoller::with_cancellation(cancel);
        self
    }

    #[tracing::instrument(skip_all, fields(job = %job.name_any()))]
    pub async fn run_probe(
        &self,
        job: &ProbeJob,
        overall_timeout: Duration,
    ) -> Result<ProbeOutcome, ProbeError> {
        let name = job.name_any();
        let start = Instant::now();

        self.submit(&name, job).await?;
        self.confirm(&name).await?;
        let status = self.await_completion(&name, overall_timeout, start).await?;

        let verdict = phase::validate(&status.history);
        if let Err(failure) = verdict.clone().into_result() {
            warn!(%failure, "probe job failed");
            return Err(ProbeError::ValidationFailed { name, failure });
        }
        let elapsed = start.elapsed();
        info!(?verdict, ?elapsed, "probe job passed");
        Ok(ProbeOutcome {
            name,
            verdict,
            history: status.history,
            elapsed,
        })
    }

    async fn submit(&self, name: &str, job: &ProbeJob) -> Result<(), ProbeError> {
        let failed = |reason: SubmitFailure| ProbeError::SubmissionFailed {
            name: name.to_string(),
            reason,
        };
        job.spec.validate().map_err(|e| failed(e.into()))?;
        self.store
            .create(job)
            .await
            .map_err(|e| failed(e.into()))?;
        let schedule = &job.spec.schedule;
        info!(
            rounds = schedule.round_number,
            start_after = ?schedule.start_after(),
            interval = ?schedule.interval_between_rounds(),
            round_timeout = ?schedule.per_round_timeout(),
            targets = ?job.spec.targets(),
            "probe job submitted"
        );
        Ok(())
    }

    async fn confirm(&self, name: &str) -> Result<(), ProbeError> {
        match self.store.get(name).await {
            Ok(Some(job)) => {
                let phase = phase::observe(job.status.as_ref());
                info!(?phase, "probe job confirmed");
                Ok(())
            }
            Ok(None) => Err(ProbeError::NotFound {
                name: name.to_string(),
                cause: None,
            }),
            Err(e) => Err(ProbeError::NotFound {
                name: name.to_string(),
                cause: Some(e),
            }),
        }
    }

    async fn await_completion(
        &self,
        name: &str,
        overall_timeout: Duration,
        start: Instant,
    ) -> Result<ProbeJobStatus, ProbeError> {
        let check = JobCompletion {
            store: &self.store,
            name,
            tracker: Mutex::new(ProgressTracker::new()),
        };
        let policy =
            PollPolicy::new(overall_timeout.max(MIN_WAIT), self.poll_interval);
        match self.poller.wait_until(&check, &policy).await {
            Ok(snapshot) => {
                debug!(phase = ?snapshot.phase, "probe job completed");
                Ok(snapshot.status)
            }
            Err(PollError::Cancelled { .. }) => Err(ProbeError::Cancelled {
                name: name.to_string(),
                elapsed: start.elapsed(),
            }),
            // unreachable while JobCompletion::is_fatal is false
            Err(PollError::Aborted { source, .. }) => Err(ProbeError::NotFound {
                name: name.to_string(),
                cause: Some(source),
            }),
            Err(PollError::Timeout { .. } | PollError::InvalidPolicy(_)) => {
                let rounds_observed =
                    check.tracker.lock().await.rounds_observed();
                Err(ProbeError::Timeout {
                    name: name.to_string(),
                    elapsed: start.elapsed(),
                    rounds_observed,
                })
            }
        }
    }
}
