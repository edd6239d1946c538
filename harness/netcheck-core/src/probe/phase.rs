use netcheck_models::{ProbeJobStatus, RoundResult, RoundStatus};
use tracing::warn;

use crate::error::ValidationFailure;

/// Lifecycle of a submitted job as seen from its status subresource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobPhase {
    /// Created, agents have not reported anything yet
    Submitted,
    Running { rounds: usize },
    Completed { rounds: usize },
}

pub fn observe(status: Option<&ProbeJobStatus>) -> JobPhase {
    match status {
        None => JobPhase::Submitted,
        Some(s) if s.finish => JobPhase::Completed {
            rounds: s.history.len(),
        },
        Some(s) if s.history.is_empty() && s.done_round.unwrap_or(0) == 0 => {
            JobPhase::Submitted
        }
        Some(s) => JobPhase::Running {
            rounds: s.history.len(),
        },
    }
}

/// Classification of a completed job.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    AllRoundsPassed { rounds: usize },
    SomeRoundFailed(ValidationFailure),
    NoRounds,
}

impl Verdict {
    pub fn into_result(self) -> Result<usize, ValidationFailure> {
        match self {
            Verdict::AllRoundsPassed { rounds } => Ok(rounds),
            Verdict::SomeRoundFailed(failure) => Err(failure),
            Verdict::NoRounds => Err(ValidationFailure::NoRounds),
        }
    }
}

/// Walk `history` in append order and stop at the first round that did not
/// succeed. Anything but `succeed` counts as a failure.
pub fn validate(history: &[RoundResult]) -> Verdict {
    if history.is_empty() {
        return Verdict::NoRounds;
    }
    match history.iter().find(|r| r.status != RoundStatus::Succeeded) {
        Some(r) => Verdict::SomeRoundFailed(ValidationFailure::RoundFailed {
            round: r.round_number,
            status: r.status.clone(),
            mean_latency_ms: r.mean_latency_ms,
            success_rate: r.success_rate,
        }),
        None => Verdict::AllRoundsPassed {
            rounds: history.len(),
        },
    }
}

/// Outcome of feeding one status into [`ProgressTracker::record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    Advanced,
    Unchanged,
    /// History shrank or `finish` went back to false
    Regressed,
}

/// High-water accounting over successive status reads.
#[derive(Clone, Debug, Default)]
pub struct ProgressTracker {
    rounds_high_water: usize,
    finished_seen: bool,
    regressions: u32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status: &ProbeJobStatus) -> Progress {
        let rounds = status.history.len();
        let shrank = rounds < self.rounds_high_water;
        let unfinished = self.finished_seen && !status.finish;
        if shrank || unfinished {
            self.regressions += 1;
            warn!(
                rounds,
                high_water = self.rounds_high_water,
                finish = status.finish,
                "job status regressed; keeping previous progress"
            );
            return Progress::Regressed;
        }
        let advanced = rounds > self.rounds_high_water
            || (status.finish && !self.finished_seen);
        self.rounds_high_water = rounds;
        self.finished_seen |= status.finish;
        if advanced {
            Progress::Advanced
        } else {
            Progress::Unchanged
        }
    }

    pub fn rounds_observed(&self) -> usize {
        self.rounds_high_water
    }

    pub fn finished_seen(&self) -> bool {
        self.finished_seen
    }

    pub fn regressions(&self) -> u32 {
        self.regressions
    }
}
