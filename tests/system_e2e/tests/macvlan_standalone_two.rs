// Requires a kind cluster with Multus, Spiderpool and the probe agents.
// Run with: cargo test -p system_e2e --test macvlan_standalone_two -- --ignored

use netcheck_core::Verdict;
use system_e2e::{Scenario, prepare, scenarios};
use tokio_util::sync::CancellationToken;

#[test_log::test(tokio::test)]
#[ignore]
async fn standalone_two_interface_connectivity_succeeds() -> anyhow::Result<()> {
    let (cfg, cluster) = prepare().await?;
    let report = scenarios::run(
        &cluster,
        &cfg,
        Scenario::MacvlanStandaloneTwo,
        CancellationToken::new(),
    )
    .await?;
    assert_eq!(
        report.outcome.verdict,
        Verdict::AllRoundsPassed {
            rounds: report.outcome.history.len()
        }
    );
    // two rounds scheduled by the connectivity job
    assert_eq!(report.outcome.history.len(), 2);
    Ok(())
}
