use anyhow::{Result, bail};
use system_e2e::{prepare, scenarios};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels in-flight waits on Ctrl-C so scenarios still tear down.
struct CancelOnSignal {
    token: CancellationToken,
}

impl CancelOnSignal {
    fn install() -> Self {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted; cancelling");
                child.cancel();
            }
        });
        Self { token }
    }
}

impl Drop for CancelOnSignal {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    netcheck_core::init_tracing("info,system_e2e=debug,netcheck_core=debug");

    info!("Starting system e2e run");
    let (cfg, cluster) = prepare().await?;
    let selected = scenarios::select(&cfg.scenarios)?;
    let signal = CancelOnSignal::install();

    let mut failed = Vec::new();
    for scenario in selected {
        match scenarios::run(&cluster, &cfg, scenario, signal.token.child_token())
            .await
        {
            Ok(report) => info!(
                %scenario,
                ns = %report.namespace,
                rounds = report.outcome.history.len(),
                elapsed = ?report.outcome.elapsed,
                "scenario passed"
            ),
            Err(e) => {
                error!(%scenario, "scenario failed: {e:#}");
                failed.push(scenario);
            }
        }
        if signal.token.is_cancelled() {
            break;
        }
    }

    if !failed.is_empty() {
        bail!("{} scenario(s) failed: {:?}", failed.len(), failed);
    }
    info!("All scenarios passed");
    Ok(())
}
