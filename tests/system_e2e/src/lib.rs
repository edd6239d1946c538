// System e2e suites for secondary-interface connectivity on a kind cluster

pub mod config;
pub mod scenarios;
pub mod setup;

use anyhow::{Context, Result};
use envconfig::Envconfig;
use netcheck_core::KubeCluster;

pub use config::TestConfig;
pub use scenarios::{Scenario, ScenarioReport};

/// Load config, check the environment and connect; shared by the binary and
/// the ignored scenario tests.
pub async fn prepare() -> Result<(TestConfig, KubeCluster)> {
    let cfg = TestConfig::init_from_env().context("reading e2e config")?;
    cfg.harness
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid harness config")?;
    setup::verify_environment(&cfg.cluster_name, &cfg.harness.multus_namespace)?;
    let cluster = KubeCluster::try_default()
        .await
        .context("connecting to the cluster")?;
    Ok((cfg, cluster))
}
