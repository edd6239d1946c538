use std::time::Duration;

use netcheck_models::{RoundStatus, SpecViolation};

use crate::readiness::{EndpointCounts, PodCounts};

/// Error surfaced by a cluster collaborator (reader, provisioner, job store).
#[derive(thiserror::Error, Debug, Clone)]
pub enum ClusterError {
    #[error("api error {code} ({reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl ClusterError {
    pub fn api(code: u16, reason: &str, message: &str) -> Self {
        ClusterError::Api {
            code,
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }

    /// Malformed or unauthorized requests never succeed on retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClusterError::Api { code, .. }
                if matches!(*code, 400 | 401 | 403 | 405 | 422)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::Api { code: 404, .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Api { code: 409, .. })
    }
}

impl From<kube::Error> for ClusterError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) => ClusterError::Api {
                code: ae.code,
                reason: ae.reason,
                message: ae.message,
            },
            kube::Error::SerdeError(e) => {
                ClusterError::Serialization(e.to_string())
            }
            other => ClusterError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Serialization(e.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PollError<S> {
    #[error(
        "timed out waiting for {what} after {elapsed:?} ({attempts} attempts); last observed: {last:?}, last error: {last_error:?}"
    )]
    Timeout {
        what: String,
        elapsed: Duration,
        attempts: u32,
        last: Option<S>,
        last_error: Option<String>,
    },

    #[error("wait for {what} cancelled after {elapsed:?}")]
    Cancelled { what: String, elapsed: Duration },

    #[error("wait for {what} aborted: {source}")]
    Aborted {
        what: String,
        #[source]
        source: ClusterError,
    },

    #[error("invalid poll policy: {0}")]
    InvalidPolicy(String),
}

impl<S> PollError<S> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled { .. })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SubmitFailure {
    #[error("invalid job spec: {0}")]
    Invalid(#[from] SpecViolation),

    #[error("rejected by cluster: {0}")]
    Rejected(#[from] ClusterError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    #[error(
        "round {round} reported status {status} (mean latency {mean_latency_ms:?} ms, success rate {success_rate:?})"
    )]
    RoundFailed {
        round: u32,
        status: RoundStatus,
        mean_latency_ms: Option<f64>,
        success_rate: Option<f64>,
    },

    #[error("job finished without reporting any round")]
    NoRounds,
}

/// Outcome classes of a probe run. Submission problems, connectivity
/// failures and harness hangs each get their own variant.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("probe job {name} submission failed: {reason}")]
    SubmissionFailed {
        name: String,
        #[source]
        reason: SubmitFailure,
    },

    #[error("probe job {name} not found after submission")]
    NotFound {
        name: String,
        #[source]
        cause: Option<ClusterError>,
    },

    #[error(
        "probe job {name} did not finish within {elapsed:?}; {rounds_observed} round(s) reported"
    )]
    Timeout {
        name: String,
        elapsed: Duration,
        rounds_observed: usize,
    },

    #[error("probe job {name} failed: {failure}")]
    ValidationFailed {
        name: String,
        failure: ValidationFailure,
    },

    #[error("probe job {name} wait cancelled after {elapsed:?}")]
    Cancelled { name: String, elapsed: Duration },
}

impl ProbeError {
    /// Round number of the first failing round, if that is what went wrong.
    pub fn failed_round(&self) -> Option<u32> {
        match self {
            ProbeError::ValidationFailed {
                failure: ValidationFailure::RoundFailed { round, .. },
                ..
            } => Some(*round),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FixtureError {
    #[error("{step} failed: {source}")]
    Cluster {
        step: &'static str,
        #[source]
        source: ClusterError,
    },

    #[error("pods in {namespace} did not become ready: {source}")]
    PodsNotReady {
        namespace: String,
        #[source]
        source: PollError<PodCounts>,
    },

    #[error("service {namespace}/{service} has no endpoints: {source}")]
    EndpointsNotReady {
        namespace: String,
        service: String,
        #[source]
        source: PollError<EndpointCounts>,
    },

    #[error("expected {expected} pods matching {selector}, found {found}")]
    PodCountMismatch {
        selector: String,
        expected: usize,
        found: usize,
    },

    #[error("no {0} addresses collected")]
    NoAddresses(&'static str),

    #[error("replica count {0} does not fit a deployment")]
    ReplicasOutOfRange(usize),
}

impl FixtureError {
    pub(crate) fn cluster(
        step: &'static str,
    ) -> impl FnOnce(ClusterError) -> Self {
        move |source| FixtureError::Cluster { step, source }
    }
}
