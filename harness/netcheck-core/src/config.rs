use std::time::Duration;

use envconfig::Envconfig;
use netcheck_models::FamilyFilter;

use crate::poller::PollPolicy;

/// Harness timing and address-family knobs.
#[derive(Envconfig, Clone, Debug)]
pub struct HarnessConfig {
    /// Probe job status re-fetch interval
    #[envconfig(from = "NETCHECK_POLL_INTERVAL_SECS", default = "5")]
    pub poll_interval_secs: u64,

    /// Upper bound on a whole probe run once submitted
    #[envconfig(from = "NETCHECK_PROBE_TIMEOUT_SECS", default = "300")]
    pub probe_timeout_secs: u64,

    #[envconfig(from = "NETCHECK_POD_READY_TIMEOUT_SECS", default = "240")]
    pub pod_ready_timeout_secs: u64,

    /// Interval of the workload readiness waits (pods, endpoints)
    #[envconfig(from = "NETCHECK_READINESS_INTERVAL_SECS", default = "2")]
    pub readiness_interval_secs: u64,

    #[envconfig(from = "NETCHECK_ENDPOINT_ATTEMPTS", default = "5")]
    pub endpoint_attempts: u32,

    #[envconfig(from = "NETCHECK_IPV4", default = "true")]
    pub ipv4: bool,

    #[envconfig(from = "NETCHECK_IPV6", default = "false")]
    pub ipv6: bool,

    /// Namespace holding the NetworkAttachmentDefinitions
    #[envconfig(from = "NETCHECK_MULTUS_NAMESPACE", default = "kube-system")]
    pub multus_namespace: String,
}

impl HarnessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn families(&self) -> FamilyFilter {
        FamilyFilter {
            ipv4: self.ipv4,
            ipv6: self.ipv6,
        }
    }

    pub fn pod_ready_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.pod_ready_timeout_secs),
            Duration::from_secs(self.readiness_interval_secs),
        )
    }

    /// Bounded by attempts; the deadline only caps a pathological interval.
    pub fn endpoint_policy(&self) -> PollPolicy {
        let interval = Duration::from_secs(self.readiness_interval_secs);
        PollPolicy::new(
            interval * self.endpoint_attempts.max(1),
            interval,
        )
        .with_max_attempts(self.endpoint_attempts)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.families().is_empty() {
            return Err("at least one of NETCHECK_IPV4 / NETCHECK_IPV6 must be true".into());
        }
        self.pod_ready_policy().validate()?;
        self.endpoint_policy().validate()?;
        PollPolicy::new(self.probe_timeout(), self.poll_interval()).validate()
    }
}
