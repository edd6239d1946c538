// Cluster prerequisites for the e2e scenarios. The suites expect an existing
// kind cluster with Multus, Spiderpool, the macvlan attachments and the probe
// agents already installed.

use anyhow::{Context, Result, bail};

pub const REQUIRED_TOOLS: &[&str] = &["kind", "kubectl"];

/// Attachment definitions the scenarios reference.
pub const REQUIRED_ATTACHMENTS: &[&str] = &[
    "macvlan-overlay-vlan100",
    "macvlan-standalone-vlan100",
    "macvlan-standalone-vlan200",
];

pub fn check_prerequisites() -> Result<()> {
    for tool in REQUIRED_TOOLS {
        if !is_tool_available(tool) {
            bail!("{} is not available in PATH", tool);
        }
    }
    tracing::info!("All prerequisites are available");
    Ok(())
}

fn is_tool_available(tool: &str) -> bool {
    duct::cmd!("which", tool)
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn cluster_exists(cluster_name: &str) -> Result<bool> {
    let output = duct::cmd!("kind", "get", "clusters")
        .stdout_capture()
        .stderr_capture()
        .run()
        .context("Failed to list kind clusters")?;
    let clusters = String::from_utf8_lossy(&output.stdout);
    Ok(clusters.lines().any(|line| line.trim() == cluster_name))
}

/// kubectl must point at the kind cluster, otherwise the scenarios would
/// provision into whatever the current context is.
pub fn ensure_context(cluster_name: &str) -> Result<()> {
    let current = duct::cmd!("kubectl", "config", "current-context")
        .stderr_null()
        .read()
        .context("Failed to read kubectl context")?;
    let expected = format!("kind-{cluster_name}");
    if current.trim() != expected {
        bail!(
            "kubectl context is {:?}, expected {:?}",
            current.trim(),
            expected
        );
    }
    Ok(())
}

/// Verify the Multus attachment definitions exist in `multus_ns`.
pub fn check_attachments(multus_ns: &str) -> Result<()> {
    for name in REQUIRED_ATTACHMENTS {
        let output = duct::cmd!(
            "kubectl",
            "get",
            "network-attachment-definitions.k8s.cni.cncf.io",
            *name,
            "-n",
            multus_ns,
            "-o",
            "name"
        )
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .context("Failed to query attachment definitions")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("attachment {}/{} missing: {}", multus_ns, name, stderr.trim());
        }
    }
    Ok(())
}

/// Run every check a scenario depends on.
pub fn verify_environment(cluster_name: &str, multus_ns: &str) -> Result<()> {
    check_prerequisites()?;
    if !cluster_exists(cluster_name)? {
        bail!("kind cluster {} does not exist", cluster_name);
    }
    ensure_context(cluster_name)?;
    check_attachments(multus_ns)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_tool_available() {
        assert!(is_tool_available("sh"));
        assert!(!is_tool_available("netcheck-definitely-not-a-tool"));
    }
}
