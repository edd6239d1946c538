pub mod cluster;
pub mod config;
pub mod error;
pub mod fixture;
pub mod manifests;
pub mod poller;
pub mod probe;
pub mod readiness;

pub use cluster::{
    ClusterStateReader, InMemoryCluster, JobStore, KubeCluster,
    WorkloadProvisioner,
};
pub use config::HarnessConfig;
pub use error::{
    ClusterError, FixtureError, PollError, ProbeError, ValidationFailure,
};
pub use fixture::{FixtureSpec, NetworkFixture};
pub use poller::{ConvergencePoller, PollPolicy, ReadinessCheck};
pub use probe::{ProbeOutcome, ScheduledProbeController, Verdict};

use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`. Safe to call more than once.
pub fn init_tracing(default_directive: &str) {
    let fallback = default_directive
        .parse()
        .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into());
    let filter = EnvFilter::builder()
        .with_default_directive(fallback)
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init();
}
