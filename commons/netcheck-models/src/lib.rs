pub mod address;
pub mod probe_job;

pub use address::{FamilyFilter, IpFamily};
pub use probe_job::{
    ProbeJob, ProbeJobSpec, ProbeJobStatus, RoundResult, RoundStatus,
    SpecViolation, TargetKind,
};
