use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{ClusterError, PollError};

/// One evaluation of a readiness predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation<S> {
    pub ready: bool,
    pub state: S,
}

impl<S> Observation<S> {
    pub fn ready(state: S) -> Self {
        Self { ready: true, state }
    }

    pub fn pending(state: S) -> Self {
        Self {
            ready: false,
            state,
        }
    }
}

/// A read-only predicate over live cluster state.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    type State: Send + Debug;

    fn describe(&self) -> String;

    async fn evaluate(&self) -> Result<Observation<Self::State>, ClusterError>;

    /// Fatal errors abort the wait; everything else means "not yet".
    fn is_fatal(&self, err: &ClusterError) -> bool {
        err.is_fatal()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub deadline: Duration,
    pub poll_interval: Duration,
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    pub fn new(deadline: Duration, poll_interval: Duration) -> Self {
        Self {
            deadline,
            poll_interval,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.deadline.is_zero() {
            return Err("deadline must be greater than zero".into());
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be greater than zero".into());
        }
        if self.max_attempts == Some(0) {
            return Err("max attempts must be at least 1".into());
        }
        Ok(())
    }
}

/// Turns an eventually-true condition into a bounded pass/fail decision.
#[derive(Clone, Debug, Default)]
pub struct ConvergencePoller {
    cancel: CancellationToken,
}

impl ConvergencePoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Evaluate `check` until it reports ready, the policy is exhausted or
    /// the poller is cancelled. The first evaluation happens immediately.
    #[tracing::instrument(level = "debug", skip_all, fields(what = %check.describe()))]
    pub async fn wait_until<C>(
        &self,
        check: &C,
        policy: &PollPolicy,
    ) -> Result<C::State, PollError<C::State>>
    where
        C: ReadinessCheck + ?Sized,
    {
        policy.validate().map_err(PollError::InvalidPolicy)?;
        let what = check.describe();
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut last: Option<C::State> = None;
        let mut last_error: Option<String> = None;

        loop {
            attempts += 1;
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(PollError::Cancelled {
                        what,
                        elapsed: start.elapsed(),
                    });
                }
                res = check.evaluate() => res,
            };

            match outcome {
                Ok(obs) if obs.ready => {
                    debug!(attempts, elapsed = ?start.elapsed(), "condition met");
                    return Ok(obs.state);
                }
                Ok(obs) => {
                    trace!(attempt = attempts, state = ?obs.state, "not ready");
                    last = Some(obs.state);
                }
                Err(e) if check.is_fatal(&e) => {
                    return Err(PollError::Aborted { what, source: e });
                }
                Err(e) => {
                    debug!(attempt = attempts, error = %e, "evaluation failed; retrying");
                    last_error = Some(e.to_string());
                }
            }

            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                break;
            }
            let elapsed = start.elapsed();
            if elapsed >= policy.deadline {
                break;
            }
            let nap = policy.poll_interval.min(policy.deadline - elapsed);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(PollError::Cancelled {
                        what,
                        elapsed: start.elapsed(),
                    });
                }
                _ = tokio::time::sleep(nap) => {}
            }
        }

        Err(PollError::Timeout {
            what,
            elapsed: start.elapsed(),
            attempts,
            last,
            last_error,
        })
    }
}

/// Adapter turning an async closure into a [`ReadinessCheck`].
pub struct FnCheck<F, S> {
    what: String,
    f: F,
    _state: PhantomData<fn() -> S>,
}

pub fn check_fn<F, Fut, S>(what: impl Into<String>, f: F) -> FnCheck<F, S>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Observation<S>, ClusterError>> + Send + 'static,
    S: Send + Debug + 'static,
{
    FnCheck {
        what: what.into(),
        f,
        _state: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, S> ReadinessCheck for FnCheck<F, S>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Observation<S>, ClusterError>> + Send + 'static,
    S: Send + Debug + 'static,
{
    type State = S;

    fn describe(&self) -> String {
        self.what.clone()
    }

    async fn evaluate(&self) -> Result<Observation<S>, ClusterError> {
        (self.f)().await
    }
}
