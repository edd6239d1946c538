use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Endpoints, Namespace, Node, Pod, Service};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use netcheck_models::ProbeJob;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    ClusterResult, ClusterStateReader, DeploymentHandle, EndpointSet,
    JobStore, Labels, PodState, ServiceHandle, ServiceInfo,
    WorkloadProvisioner, selector_string,
};
use crate::manifests::{NETWORK_STATUS_ANNOTATION, namespace};

/// Collaborators backed by a live API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster config.
    pub async fn try_default() -> ClusterResult<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[derive(Deserialize)]
struct AttachmentStatus {
    #[serde(default)]
    ips: Vec<String>,
    #[serde(default)]
    default: bool,
}

/// Addresses of the non-default attachments listed in the pod's
/// network-status annotation. Malformed annotations yield nothing.
pub fn secondary_ips(pod: &Pod) -> Vec<String> {
    let Some(raw) = pod.annotations().get(NETWORK_STATUS_ANNOTATION) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<AttachmentStatus>>(raw) {
        Ok(list) => list
            .into_iter()
            .filter(|a| !a.default)
            .flat_map(|a| a.ips)
            .collect(),
        Err(e) => {
            warn!(pod = %pod.name_any(), error = %e, "unparseable network-status annotation");
            Vec::new()
        }
    }
}

fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

pub fn pod_state(pod: &Pod) -> PodState {
    let status = pod.status.as_ref();
    let mut ips: Vec<String> = status
        .and_then(|s| s.pod_ips.as_ref())
        .map(|list| list.iter().map(|p| p.ip.clone()).collect())
        .unwrap_or_default();
    if ips.is_empty() {
        ips.extend(status.and_then(|s| s.pod_ip.clone()));
    }
    PodState {
        name: pod.name_any(),
        phase: status
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".into()),
        ready: is_pod_ready(pod),
        node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        ips,
        secondary_ips: secondary_ips(pod),
    }
}

pub fn service_info(svc: &Service) -> ServiceInfo {
    let spec = svc.spec.as_ref();
    let mut cluster_ips: Vec<String> = spec
        .and_then(|s| s.cluster_ips.clone())
        .unwrap_or_default();
    if cluster_ips.is_empty() {
        cluster_ips.extend(spec.and_then(|s| s.cluster_ip.clone()));
    }
    // headless services report the literal "None"
    cluster_ips.retain(|ip| ip != "None" && !ip.is_empty());
    let node_ports = spec
        .and_then(|s| s.ports.as_ref())
        .map(|ports| ports.iter().filter_map(|p| p.node_port).collect())
        .unwrap_or_default();
    ServiceInfo {
        name: svc.name_any(),
        cluster_ips,
        node_ports,
    }
}

pub fn endpoint_set(ep: &Endpoints) -> EndpointSet {
    let mut set = EndpointSet::default();
    for subset in ep.subsets.iter().flatten() {
        set.ready
            .extend(subset.addresses.iter().flatten().map(|a| a.ip.clone()));
        set.not_ready.extend(
            subset
                .not_ready_addresses
                .iter()
                .flatten()
                .map(|a| a.ip.clone()),
        );
    }
    set
}

#[async_trait]
impl ClusterStateReader for KubeCluster {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> ClusterResult<Vec<PodState>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels(&selector_string(selector));
        let list = api.list(&lp).await?;
        Ok(list.items.iter().map(pod_state).collect())
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<ServiceInfo>> {
        let api: Api<Service> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.as_ref().map(service_info))
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        service: &str,
    ) -> ClusterResult<Option<EndpointSet>> {
        let api: Api<Endpoints> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(service).await?.as_ref().map(endpoint_set))
    }

    async fn node_internal_ips(&self) -> ClusterResult<Vec<String>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await?;
        Ok(nodes
            .items
            .iter()
            .filter_map(|n| n.status.as_ref()?.addresses.as_ref())
            .flatten()
            .filter(|a| a.type_ == "InternalIP")
            .map(|a| a.address.clone())
            .collect())
    }
}

#[async_trait]
impl WorkloadProvisioner for KubeCluster {
    async fn create_namespace(&self, name: &str) -> ClusterResult<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.create(&PostParams::default(), &namespace(name)).await?;
        debug!(namespace = name, "namespace created");
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> ClusterResult<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                debug!(namespace = name, "namespace deletion requested");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<DeploymentHandle> {
        let handle = DeploymentHandle::from_manifest(namespace, deployment)?;
        let api: Api<Deployment> =
            Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), deployment).await?;
        debug!(namespace, name = %handle.name, replicas = handle.replicas, "deployment created");
        Ok(handle)
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> ClusterResult<ServiceHandle> {
        let api: Api<Service> =
            Api::namespaced(self.client.clone(), namespace);
        let created = api.create(&PostParams::default(), service).await?;
        debug!(namespace, name = %created.name_any(), "service created");
        Ok(ServiceHandle {
            namespace: namespace.to_string(),
            name: created.name_any(),
        })
    }
}

#[async_trait]
impl JobStore for KubeCluster {
    async fn create(&self, job: &ProbeJob) -> ClusterResult<()> {
        let api: Api<ProbeJob> = Api::all(self.client.clone());
        api.create(&PostParams::default(), job).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> ClusterResult<Option<ProbeJob>> {
        let api: Api<ProbeJob> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        EndpointAddress, EndpointSubset, PodCondition, PodIP, PodStatus,
        ServicePort, ServiceSpec,
    };
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn pod_with(annotation: Option<&str>, ready: &str) -> Pod {
        let annotations = annotation.map(|a| {
            BTreeMap::from([(NETWORK_STATUS_ANNOTATION.to_string(), a.to_string())])
        });
        Pod {
            metadata: ObjectMeta {
                name: Some("web-0".into()),
                annotations,
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".into()),
                conditions: Some(vec![PodCondition {
                    type_: "Ready".into(),
                    status: ready.into(),
                    ..Default::default()
                }]),
                pod_ip: Some("10.244.1.5".into()),
                pod_ips: Some(vec![PodIP {
                    ip: "10.244.1.5".into(),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn secondary_ips_skip_default_network() {
        let annotation = r#"[
            {"name": "kindnet", "interface": "eth0", "ips": ["10.244.1.5"], "default": true},
            {"name": "kube-system/macvlan-vlan0-overlay", "interface": "net1", "ips": ["10.6.168.71", "fd00:10:6::47"]}
        ]"#;
        let pod = pod_with(Some(annotation), "True");
        let state = pod_state(&pod);
        assert!(state.is_fully_ready());
        assert_eq!(state.ips, vec!["10.244.1.5".to_string()]);
        assert_eq!(
            state.secondary_ips,
            vec!["10.6.168.71".to_string(), "fd00:10:6::47".to_string()]
        );
        assert_eq!(state.all_ips().count(), 3);
    }

    #[test]
    fn malformed_or_missing_annotation_yields_no_secondary_ips() {
        assert!(secondary_ips(&pod_with(None, "True")).is_empty());
        assert!(secondary_ips(&pod_with(Some("{not json"), "True")).is_empty());
        assert!(!pod_state(&pod_with(None, "False")).ready);
    }

    #[test]
    fn service_info_drops_headless_marker() {
        let svc = Service {
            metadata: ObjectMeta {
                name: Some("web".into()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.96.0.20".into()),
                cluster_ips: Some(vec![
                    "10.96.0.20".into(),
                    "fd00:10:96::14".into(),
                ]),
                ports: Some(vec![ServicePort {
                    port: 80,
                    node_port: Some(31080),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let info = service_info(&svc);
        assert_eq!(info.cluster_ips.len(), 2);
        assert_eq!(info.node_ports, vec![31080]);

        let mut headless = svc.clone();
        if let Some(spec) = headless.spec.as_mut() {
            spec.cluster_ip = Some("None".into());
            spec.cluster_ips = Some(vec!["None".into()]);
        }
        assert!(service_info(&headless).cluster_ips.is_empty());
    }

    #[test]
    fn endpoint_set_splits_ready_and_not_ready() {
        let ep = Endpoints {
            subsets: Some(vec![EndpointSubset {
                addresses: Some(vec![EndpointAddress {
                    ip: "10.244.1.5".into(),
                    ..Default::default()
                }]),
                not_ready_addresses: Some(vec![EndpointAddress {
                    ip: "10.244.2.7".into(),
                    ..Default::default()
                }]),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let set = endpoint_set(&ep);
        assert_eq!(set.ready, vec!["10.244.1.5".to_string()]);
        assert_eq!(set.not_ready, vec!["10.244.2.7".to_string()]);
        assert_eq!(endpoint_set(&Endpoints::default()), EndpointSet::default());
    }
}
