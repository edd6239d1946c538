//! Connectivity scenarios: each one provisions an attached workload, runs
//! the standard probe job against it and checks every round passed.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use netcheck_core::manifests::Attachment;
use netcheck_core::{
    ConvergencePoller, FixtureSpec, KubeCluster, NetworkFixture,
    ProbeOutcome, ScheduledProbeController, WorkloadProvisioner,
};
use netcheck_test_utils::{NamespaceGuard, random_namespace, uniq};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::TestConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// One overlay macvlan interface next to the cluster network
    MacvlanOverlayOne,
    /// Two standalone macvlan interfaces, no cluster network attachment
    MacvlanStandaloneTwo,
}

impl Scenario {
    pub const ALL: [Scenario; 2] =
        [Scenario::MacvlanOverlayOne, Scenario::MacvlanStandaloneTwo];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::MacvlanOverlayOne => "macvlan-overlay-one",
            Scenario::MacvlanStandaloneTwo => "macvlan-standalone-two",
        }
    }

    /// Workload name, also the `app` label value.
    pub fn workload(&self) -> &'static str {
        match self {
            Scenario::MacvlanOverlayOne => "one-macvlan-overlay",
            Scenario::MacvlanStandaloneTwo => "two-macvlan-standalone",
        }
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        match self {
            Scenario::MacvlanOverlayOne => vec![Attachment::new(
                "macvlan-overlay-vlan100",
                "net1",
                "vlan100-v4",
                "vlan100-v6",
            )],
            Scenario::MacvlanStandaloneTwo => vec![
                Attachment::new(
                    "macvlan-standalone-vlan100",
                    "net1",
                    "vlan100-v4",
                    "vlan100-v6",
                ),
                Attachment::new(
                    "macvlan-standalone-vlan200",
                    "net2",
                    "vlan200-v4",
                    "vlan200-v6",
                ),
            ],
        }
    }

    pub fn fixture_spec(&self, cfg: &TestConfig, namespace: &str) -> FixtureSpec {
        FixtureSpec {
            name: self.workload().to_string(),
            namespace: namespace.to_string(),
            image: cfg.image.clone(),
            replicas: cfg.replicas,
            port: cfg.port,
            multus_namespace: cfg.harness.multus_namespace.clone(),
            attachments: self.attachments(),
            families: cfg.harness.families(),
            pod_ready: cfg.harness.pod_ready_policy(),
            endpoints_ready: cfg.harness.endpoint_policy(),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name() == wanted)
            .with_context(|| format!("unknown scenario {s:?}"))
    }
}

/// Parse a comma separated selection; `all` (or nothing) selects every
/// scenario.
pub fn select(spec: &str) -> Result<Vec<Scenario>> {
    let trimmed = spec.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return Ok(Scenario::ALL.to_vec());
    }
    let mut out = Vec::new();
    for part in trimmed.split(',').filter(|p| !p.trim().is_empty()) {
        let sc: Scenario = part.parse()?;
        if !out.contains(&sc) {
            out.push(sc);
        }
    }
    if out.is_empty() {
        bail!("no scenario selected by {spec:?}");
    }
    Ok(out)
}

#[derive(Debug)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub namespace: String,
    pub outcome: ProbeOutcome,
}

/// Provision, probe and (unless disabled) tear down one scenario.
pub async fn run(
    cluster: &KubeCluster,
    cfg: &TestConfig,
    scenario: Scenario,
    cancel: CancellationToken,
) -> Result<ScenarioReport> {
    let namespace = random_namespace();
    // backstop for panics; the normal path deletes explicitly below
    let guard = NamespaceGuard::new(&namespace, cluster.client().clone())
        .keep(cfg.no_cleanup);
    info!(%scenario, ns = %namespace, "starting scenario");

    let result = provision_and_probe(cluster, cfg, scenario, &namespace, cancel).await;

    if !cfg.no_cleanup {
        if let Err(e) = cluster.delete_namespace(&namespace).await {
            warn!(ns = %namespace, error = %e, "namespace cleanup failed");
        }
    }
    drop(guard.keep(true));

    let outcome = result?;
    Ok(ScenarioReport {
        scenario,
        namespace,
        outcome,
    })
}

async fn provision_and_probe(
    cluster: &KubeCluster,
    cfg: &TestConfig,
    scenario: Scenario,
    namespace: &str,
    cancel: CancellationToken,
) -> Result<ProbeOutcome> {
    let poller = ConvergencePoller::with_cancellation(cancel.clone());
    let fixture = NetworkFixture::provision(
        cluster,
        cluster,
        &poller,
        &scenario.fixture_spec(cfg, namespace),
    )
    .await
    .with_context(|| format!("provisioning {scenario}"))?;
    info!(
        pod_ips = ?fixture.pod_ips,
        cluster_ips = ?fixture.cluster_ips,
        node_ips = ?fixture.node_ips,
        node_ports = ?fixture.node_ports,
        "fixture ready"
    );

    let job = fixture.probe_job(&uniq(scenario.workload()));
    let controller = ScheduledProbeController::new(cluster.clone())
        .with_poll_interval(cfg.harness.poll_interval())
        .with_cancellation(cancel);
    controller
        .run_probe(&job, cfg.harness.probe_timeout())
        .await
        .with_context(|| format!("probe for {scenario}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_parses_names_and_all() {
        assert_eq!(select("all").unwrap(), Scenario::ALL.to_vec());
        assert_eq!(select("").unwrap(), Scenario::ALL.to_vec());
        assert_eq!(
            select("macvlan_standalone_two").unwrap(),
            vec![Scenario::MacvlanStandaloneTwo]
        );
        assert_eq!(
            select("macvlan-overlay-one, macvlan-overlay-one").unwrap(),
            vec![Scenario::MacvlanOverlayOne]
        );
        assert!(select("ipvlan-one").is_err());
        assert!(select(",,").is_err());
    }

    #[test]
    fn standalone_two_requests_two_interfaces() {
        let atts = Scenario::MacvlanStandaloneTwo.attachments();
        assert_eq!(atts.len(), 2);
        assert_eq!(atts[1].interface, "net2");
        assert_eq!(Scenario::MacvlanOverlayOne.attachments().len(), 1);
    }
}
