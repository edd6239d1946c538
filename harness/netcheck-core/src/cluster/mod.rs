//! Collaborator seams: everything the harness reads from or writes to the
//! cluster goes through these traits. [`KubeCluster`] talks to a real API
//! server, [`InMemoryCluster`] backs unit tests and dry runs.

pub mod live;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use netcheck_models::ProbeJob;

use crate::error::ClusterError;

pub use self::live::KubeCluster;
pub use self::memory::InMemoryCluster;

pub type ClusterResult<T> = Result<T, ClusterError>;

pub type Labels = BTreeMap<String, String>;

/// Render a label map as a `k=v,k=v` selector.
pub fn selector_string(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Snapshot of one pod as the harness cares about it.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PodState {
    pub name: String,
    pub phase: String,
    /// Ready condition is True
    pub ready: bool,
    pub node: Option<String>,
    /// Addresses on the primary (cluster network) interface
    pub ips: Vec<String>,
    /// Addresses on attached secondary interfaces
    pub secondary_ips: Vec<String>,
}

impl PodState {
    pub fn is_fully_ready(&self) -> bool {
        self.phase == "Running" && self.ready
    }

    pub fn all_ips(&self) -> impl Iterator<Item = &String> {
        self.ips.iter().chain(self.secondary_ips.iter())
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ServiceInfo {
    pub name: String,
    pub cluster_ips: Vec<String>,
    pub node_ports: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct EndpointSet {
    pub ready: Vec<String>,
    pub not_ready: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeploymentHandle {
    pub namespace: String,
    pub name: String,
    pub selector: Labels,
    pub replicas: usize,
}

impl DeploymentHandle {
    /// Extract the selector and replica count from a manifest.
    pub fn from_manifest(
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<Self> {
        let name = deployment.metadata.name.clone().ok_or_else(|| {
            ClusterError::Other("deployment manifest has no name".into())
        })?;
        let spec = deployment.spec.as_ref().ok_or_else(|| {
            ClusterError::Other(format!("deployment {name} has no spec"))
        })?;
        let selector = spec.selector.match_labels.clone().unwrap_or_default();
        if selector.is_empty() {
            return Err(ClusterError::Other(format!(
                "deployment {name} has an empty selector"
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            name,
            selector,
            replicas: spec.replicas.unwrap_or(1).max(0) as usize,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceHandle {
    pub namespace: String,
    pub name: String,
}

#[async_trait]
pub trait ClusterStateReader: Send + Sync {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> ClusterResult<Vec<PodState>>;

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<ServiceInfo>>;

    async fn get_endpoints(
        &self,
        namespace: &str,
        service: &str,
    ) -> ClusterResult<Option<EndpointSet>>;

    async fn node_internal_ips(&self) -> ClusterResult<Vec<String>>;
}

#[async_trait]
pub trait WorkloadProvisioner: Send + Sync {
    async fn create_namespace(&self, name: &str) -> ClusterResult<()>;

    /// Deleting an absent namespace succeeds.
    async fn delete_namespace(&self, name: &str) -> ClusterResult<()>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<DeploymentHandle>;

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> ClusterResult<ServiceHandle>;
}

/// Probe job records. `create` must be called once per name; `get` is an
/// idempotent read returning `None` when the job does not exist.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &ProbeJob) -> ClusterResult<()>;

    async fn get(&self, name: &str) -> ClusterResult<Option<ProbeJob>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifests::{WorkloadTemplate, deployment};

    #[test]
    fn selector_string_is_sorted_and_comma_joined() {
        let labels = Labels::from([
            ("tier".to_string(), "probe".to_string()),
            ("app".to_string(), "one-macvlan-overlay".to_string()),
        ]);
        assert_eq!(
            selector_string(&labels),
            "app=one-macvlan-overlay,tier=probe"
        );
    }

    #[test]
    fn deployment_handle_reads_selector_and_replicas() {
        let labels =
            Labels::from([("app".to_string(), "web".to_string())]);
        let annotations = Labels::new();
        let dep = deployment(&WorkloadTemplate {
            name: "web",
            namespace: "ns1",
            labels: &labels,
            annotations: &annotations,
            replicas: 3,
            image: "nginx:alpine",
            port: 80,
        });
        let handle = DeploymentHandle::from_manifest("ns1", &dep).unwrap();
        assert_eq!(handle.name, "web");
        assert_eq!(handle.replicas, 3);
        assert_eq!(handle.selector, labels);

        let mut unnamed = dep.clone();
        unnamed.metadata.name = None;
        assert!(DeploymentHandle::from_manifest("ns1", &unnamed).is_err());
    }

    #[test]
    fn pod_is_fully_ready_only_when_running_and_ready() {
        let mut pod = PodState {
            name: "p".into(),
            phase: "Running".into(),
            ready: true,
            ..Default::default()
        };
        assert!(pod.is_fully_ready());
        pod.ready = false;
        assert!(!pod.is_fully_ready());
        pod.ready = true;
        pod.phase = "Pending".into();
        assert!(!pod.is_fully_ready());
    }
}
