// Requires a kind cluster with Multus, Spiderpool and the probe agents.
// Run with: cargo test -p system_e2e --test macvlan_overlay_one -- --ignored

use netcheck_core::Verdict;
use system_e2e::{Scenario, prepare, scenarios};
use tokio_util::sync::CancellationToken;

#[test_log::test(tokio::test)]
#[ignore]
async fn overlay_one_interface_connectivity_succeeds() -> anyhow::Result<()> {
    let (cfg, cluster) = prepare().await?;
    let report = scenarios::run(
        &cluster,
        &cfg,
        Scenario::MacvlanOverlayOne,
        CancellationToken::new(),
    )
    .await?;
    assert!(matches!(
        report.outcome.verdict,
        Verdict::AllRoundsPassed { .. }
    ));
    Ok(())
}
