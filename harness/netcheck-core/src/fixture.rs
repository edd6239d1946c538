//! Workload under test: a namespace with an attached deployment behind a
//! NodePort service, plus every address the probe agents should reach.

use netcheck_models::{FamilyFilter, ProbeJob};
use tracing::{info, warn};

use crate::cluster::{
    ClusterStateReader, DeploymentHandle, Labels, PodState, ServiceHandle,
    WorkloadProvisioner, selector_string,
};
use crate::error::{ClusterError, FixtureError};
use crate::manifests::{
    Attachment, WorkloadTemplate, attachment_annotations, deployment,
    node_port_service,
};
use crate::poller::{ConvergencePoller, PollPolicy};
use crate::readiness::{EndpointsReady, PodSetReady};

#[derive(Clone, Debug)]
pub struct FixtureSpec {
    /// Deployment, service and `app` label value
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub replicas: usize,
    pub port: i32,
    pub multus_namespace: String,
    pub attachments: Vec<Attachment>,
    pub families: FamilyFilter,
    pub pod_ready: PollPolicy,
    pub endpoints_ready: PollPolicy,
}

impl FixtureSpec {
    pub fn labels(&self) -> Labels {
        Labels::from([("app".to_string(), self.name.clone())])
    }
}

#[derive(Clone, Debug)]
pub struct NetworkFixture {
    pub namespace: String,
    pub name: String,
    pub families: FamilyFilter,
    pub deployment: DeploymentHandle,
    pub service: ServiceHandle,
    pub pods: Vec<PodState>,
    /// Primary and secondary addresses of every pod
    pub pod_ips: Vec<String>,
    /// Service cluster IPs of the enabled families
    pub cluster_ips: Vec<String>,
    pub node_ports: Vec<i32>,
    pub node_ips: Vec<String>,
}

impl NetworkFixture {
    /// Bring the workload up and wait until it is reachable. On failure the
    /// namespace is left behind for inspection; callers own cleanup.
    #[tracing::instrument(skip_all, fields(ns = %spec.namespace, name = %spec.name))]
    pub async fn provision<P, R>(
        provisioner: &P,
        reader: &R,
        poller: &ConvergencePoller,
        spec: &FixtureSpec,
    ) -> Result<Self, FixtureError>
    where
        P: WorkloadProvisioner + ?Sized,
        R: ClusterStateReader + ?Sized,
    {
        let ns = spec.namespace.as_str();
        let replicas = i32::try_from(spec.replicas)
            .map_err(|_| FixtureError::ReplicasOutOfRange(spec.replicas))?;
        provisioner
            .create_namespace(ns)
            .await
            .map_err(FixtureError::cluster("create namespace"))?;

        let labels = spec.labels();
        let annotations =
            attachment_annotations(&spec.multus_namespace, &spec.attachments);
        let manifest = deployment(&WorkloadTemplate {
            name: &spec.name,
            namespace: ns,
            labels: &labels,
            annotations: &annotations,
            replicas,
            image: &spec.image,
            port: spec.port,
        });
        let handle = provisioner
            .create_deployment(ns, &manifest)
            .await
            .map_err(FixtureError::cluster("create deployment"))?;
        info!(replicas = handle.replicas, "deployment created");

        let pods_ready = PodSetReady::new(
            reader,
            ns,
            handle.selector.clone(),
            handle.replicas,
        );
        let counts = poller
            .wait_until(&pods_ready, &spec.pod_ready)
            .await
            .map_err(|source| FixtureError::PodsNotReady {
                namespace: ns.to_string(),
                source,
            })?;
        info!(ready = counts.ready, "pods ready");

        let pods = reader
            .list_pods(ns, &handle.selector)
            .await
            .map_err(FixtureError::cluster("list pods"))?;
        if pods.len() != handle.replicas {
            return Err(FixtureError::PodCountMismatch {
                selector: selector_string(&handle.selector),
                expected: handle.replicas,
                found: pods.len(),
            });
        }

        let svc_manifest = node_port_service(
            &spec.name,
            ns,
            spec.port,
            &handle.selector,
            spec.families.ipv4 && spec.families.ipv6,
        );
        let service = provisioner
            .create_service(ns, &svc_manifest)
            .await
            .map_err(FixtureError::cluster("create service"))?;
        let info = reader
            .get_service(ns, &service.name)
            .await
            .map_err(FixtureError::cluster("get service"))?
            .ok_or_else(|| FixtureError::Cluster {
                step: "get service",
                source: ClusterError::api(
                    404,
                    "NotFound",
                    &format!("service {ns}/{} vanished", service.name),
                ),
            })?;
        let cluster_ips = spec.families.retain(&info.cluster_ips);
        info!(?cluster_ips, node_ports = ?info.node_ports, "service created");

        let endpoints_ready = EndpointsReady::new(reader, ns, &service.name);
        poller
            .wait_until(&endpoints_ready, &spec.endpoints_ready)
            .await
            .map_err(|source| FixtureError::EndpointsNotReady {
                namespace: ns.to_string(),
                service: service.name.clone(),
                source,
            })?;

        let pod_ips: Vec<String> =
            pods.iter().flat_map(|p| p.all_ips()).cloned().collect();
        if pod_ips.is_empty() {
            return Err(FixtureError::NoAddresses("pod"));
        }
        let node_ips = reader
            .node_internal_ips()
            .await
            .map_err(FixtureError::cluster("list nodes"))?;
        if node_ips.is_empty() {
            return Err(FixtureError::NoAddresses("node"));
        }
        info!(?pod_ips, ?node_ips, "fixture ready");

        Ok(Self {
            namespace: ns.to_string(),
            name: spec.name.clone(),
            families: spec.families,
            deployment: handle,
            service,
            pods,
            pod_ips,
            cluster_ips,
            node_ports: info.node_ports,
            node_ips,
        })
    }

    /// The standard connectivity job aimed at this fixture's families.
    pub fn probe_job(&self, job_name: &str) -> ProbeJob {
        ProbeJob::connectivity(job_name, self.families)
    }

    pub async fn teardown<P>(&self, provisioner: &P) -> Result<(), ClusterError>
    where
        P: WorkloadProvisioner + ?Sized,
    {
        provisioner
            .delete_namespace(&self.namespace)
            .await
            .inspect_err(|e| {
                warn!(ns = %self.namespace, error = %e, "namespace cleanup failed")
            })
    }
}
