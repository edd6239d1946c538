use std::time::Duration;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::address::FamilyFilter;

/// Scheduled HTTP connectivity probe, executed by the cluster-side probe
/// agents. The harness creates it once and afterwards only reads `status`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "spiderdoctor.spidernet.io",
    version = "v1beta1",
    kind = "Nethttp",
    root = "ProbeJob",
    plural = "nethttps",
    status = "ProbeJobStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ProbeJobSpec {
    pub schedule: Schedule,
    pub target: Targets,
    pub request: RequestShape,
    pub success_condition: SuccessCondition,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub start_after_minute: u64,
    /// Number of rounds; must be at least 1
    pub round_number: u32,
    pub interval_minute: u64,
    /// Per-round deadline
    pub timeout_minute: u64,
}

impl Schedule {
    pub fn start_after(&self) -> Duration {
        minutes(self.start_after_minute)
    }

    pub fn interval_between_rounds(&self) -> Duration {
        minutes(self.interval_minute)
    }

    pub fn per_round_timeout(&self) -> Duration {
        minutes(self.timeout_minute)
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Targets {
    pub target_agent: Option<TargetAgent>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct TargetAgent {
    pub test_ingress: bool,
    pub test_endpoint: bool,
    pub test_cluster_ip: bool,
    pub test_multus_interface: bool,
    pub test_node_port: bool,
    #[serde(rename = "testIPv4")]
    pub test_ipv4: Option<bool>,
    #[serde(rename = "testIPv6")]
    pub test_ipv6: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Ingress,
    ServiceEndpoint,
    ClusterIp,
    SecondaryInterface,
    NodePort,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Ingress => write!(f, "ingress"),
            TargetKind::ServiceEndpoint => write!(f, "endpoint"),
            TargetKind::ClusterIp => write!(f, "clusterIP"),
            TargetKind::SecondaryInterface => write!(f, "secondaryInterface"),
            TargetKind::NodePort => write!(f, "nodePort"),
        }
    }
}

impl TargetAgent {
    pub fn all(families: FamilyFilter) -> Self {
        Self {
            test_ingress: true,
            test_endpoint: true,
            test_cluster_ip: true,
            test_multus_interface: true,
            test_node_port: true,
            test_ipv4: Some(families.ipv4),
            test_ipv6: Some(families.ipv6),
        }
    }

    pub fn enabled(&self) -> Vec<TargetKind> {
        [
            (self.test_ingress, TargetKind::Ingress),
            (self.test_endpoint, TargetKind::ServiceEndpoint),
            (self.test_cluster_ip, TargetKind::ClusterIp),
            (self.test_multus_interface, TargetKind::SecondaryInterface),
            (self.test_node_port, TargetKind::NodePort),
        ]
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .collect()
    }

    /// Unset flags count as disabled.
    pub fn families(&self) -> FamilyFilter {
        FamilyFilter {
            ipv4: self.test_ipv4.unwrap_or(false),
            ipv6: self.test_ipv6.unwrap_or(false),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestShape {
    pub duration_in_second: u32,
    pub qps: f64,
    pub per_request_timeout_in_second: u32,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuccessCondition {
    /// Fraction in [0, 1]
    pub success_rate: Option<f64>,
    pub mean_access_delay_in_ms: Option<f64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeJobStatus {
    #[serde(default)]
    pub finish: bool,
    pub expected_round: Option<u32>,
    pub done_round: Option<u32>,
    #[serde(default)]
    pub history: Vec<RoundResult>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub round_number: u32,
    pub status: RoundStatus,
    pub mean_latency_ms: Option<f64>,
    pub success_rate: Option<f64>,
    pub start_time_stamp: Option<String>,
    pub end_time_stamp: Option<String>,
}

impl RoundResult {
    pub fn new(round_number: u32, status: RoundStatus) -> Self {
        Self {
            round_number,
            status,
            mean_latency_ms: None,
            success_rate: None,
            start_time_stamp: None,
            end_time_stamp: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub enum RoundStatus {
    #[serde(rename = "succeed")]
    Succeeded,
    #[serde(rename = "fail")]
    Failed,
    /// Anything else the agents report (e.g. "ongoing", "notstarted")
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundStatus::Succeeded => write!(f, "succeed"),
            RoundStatus::Failed => write!(f, "fail"),
            RoundStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SpecViolation {
    #[error("schedule.roundNumber must be >= 1")]
    NoRounds,
    #[error("successCondition.successRate {0} is outside [0, 1]")]
    SuccessRateOutOfRange(f64),
    #[error("successCondition.meanAccessDelayInMs {0} must be positive")]
    InvalidLatency(f64),
    #[error("request.qps {0} must be positive")]
    InvalidQps(f64),
    #[error("no target kind is enabled")]
    NoTargets,
    #[error("neither IPv4 nor IPv6 is enabled")]
    NoAddressFamily,
}

impl ProbeJobSpec {
    /// The job the connectivity suites run: two rounds two minutes apart, all
    /// target kinds, one request per second for two seconds.
    pub fn connectivity(families: FamilyFilter) -> Self {
        Self {
            schedule: Schedule {
                start_after_minute: 0,
                round_number: 2,
                interval_minute: 2,
                timeout_minute: 2,
            },
            target: Targets {
                target_agent: Some(TargetAgent::all(families)),
            },
            request: RequestShape {
                duration_in_second: 2,
                qps: 1.0,
                per_request_timeout_in_second: 10,
            },
            success_condition: SuccessCondition {
                success_rate: Some(1.0),
                mean_access_delay_in_ms: Some(5000.0),
            },
        }
    }

    pub fn targets(&self) -> Vec<TargetKind> {
        self.target
            .target_agent
            .as_ref()
            .map(TargetAgent::enabled)
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), SpecViolation> {
        if self.schedule.round_number < 1 {
            return Err(SpecViolation::NoRounds);
        }
        if let Some(rate) = self.success_condition.success_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(SpecViolation::SuccessRateOutOfRange(rate));
            }
        }
        if let Some(ms) = self.success_condition.mean_access_delay_in_ms {
            if !(ms > 0.0) {
                return Err(SpecViolation::InvalidLatency(ms));
            }
        }
        if !(self.request.qps > 0.0) {
            return Err(SpecViolation::InvalidQps(self.request.qps));
        }
        let Some(agent) = self.target.target_agent.as_ref() else {
            return Err(SpecViolation::NoTargets);
        };
        if agent.enabled().is_empty() {
            return Err(SpecViolation::NoTargets);
        }
        if agent.families().is_empty() {
            return Err(SpecViolation::NoAddressFamily);
        }
        Ok(())
    }
}

impl ProbeJob {
    pub fn connectivity(name: &str, families: FamilyFilter) -> Self {
        ProbeJob::new(name, ProbeJobSpec::connectivity(families))
    }
}
