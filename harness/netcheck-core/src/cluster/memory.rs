use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use netcheck_models::{ProbeJob, ProbeJobStatus};
use tokio::sync::RwLock;

use super::{
    ClusterResult, ClusterStateReader, DeploymentHandle, EndpointSet,
    JobStore, Labels, PodState, ServiceHandle, ServiceInfo,
    WorkloadProvisioner,
};
use crate::error::ClusterError;

/// How workloads created through [`WorkloadProvisioner`] come up.
#[derive(Clone, Debug)]
pub struct SimulatedRollout {
    /// Pod listings that still show new pods as Pending
    pub pod_warmup_reads: usize,
    /// Endpoint reads that still show nothing for a new service
    pub endpoint_warmup_reads: usize,
    /// Extra pods per deployment that never become ready
    pub surplus_pods: usize,
    /// Give pods a secondary interface address
    pub attach_secondary: bool,
    pub dual_stack: bool,
}

impl Default for SimulatedRollout {
    fn default() -> Self {
        Self {
            pod_warmup_reads: 0,
            endpoint_warmup_reads: 0,
            surplus_pods: 0,
            attach_secondary: true,
            dual_stack: false,
        }
    }
}

/// Call counters, handy for asserting what a test did not do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    pub job_creates: usize,
    pub job_gets: usize,
    pub pod_lists: usize,
    pub endpoint_gets: usize,
}

struct Workload {
    namespace: String,
    labels: Labels,
    pods: Vec<PodState>,
    /// Listings left before pending pods flip to Running/Ready
    warmup: Option<usize>,
}

struct SimService {
    info: ServiceInfo,
    selector: Labels,
    warmup: usize,
}

#[derive(Default)]
struct Faults {
    job_create: Option<ClusterError>,
    job_gets: VecDeque<Option<ClusterError>>,
    pod_lists: VecDeque<ClusterError>,
    lose_jobs: bool,
}

#[derive(Default)]
struct State {
    namespaces: BTreeSet<String>,
    workloads: Vec<Workload>,
    services: HashMap<(String, String), SimService>,
    endpoints: HashMap<(String, String), EndpointSet>,
    nodes: Vec<String>,
    jobs: HashMap<String, ProbeJob>,
    scripts: HashMap<String, VecDeque<ProbeJobStatus>>,
    faults: Faults,
    stats: CallStats,
    next_addr: u32,
}

impl State {
    fn alloc(&mut self) -> u32 {
        self.next_addr += 1;
        self.next_addr
    }
}

/// In-process cluster: implements every collaborator trait so the harness
/// can run without an API server.
#[derive(Clone)]
pub struct InMemoryCluster {
    state: Arc<RwLock<State>>,
    rollout: Arc<SimulatedRollout>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

fn labels_match(selector: &Labels, labels: &Labels) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

fn not_found(kind: &str, name: &str) -> ClusterError {
    ClusterError::api(404, "NotFound", &format!("{kind} \"{name}\" not found"))
}

fn already_exists(kind: &str, name: &str) -> ClusterError {
    ClusterError::api(
        409,
        "AlreadyExists",
        &format!("{kind} \"{name}\" already exists"),
    )
}

impl InMemoryCluster {
    pub fn new() -> Self {
        let state = State {
            nodes: vec!["172.18.0.2".into(), "172.18.0.3".into()],
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            rollout: Arc::new(SimulatedRollout::default()),
        }
    }

    pub fn with_rollout(mut self, rollout: SimulatedRollout) -> Self {
        self.rollout = Arc::new(rollout);
        self
    }

    /// Replace the pods behind `labels` in `namespace` with a fixed set.
    pub async fn set_pods(
        &self,
        namespace: &str,
        labels: Labels,
        pods: Vec<PodState>,
    ) {
        let mut s = self.state.write().await;
        s.namespaces.insert(namespace.to_string());
        s.workloads
            .retain(|w| !(w.namespace == namespace && w.labels == labels));
        s.workloads.push(Workload {
            namespace: namespace.to_string(),
            labels,
            pods,
            warmup: None,
        });
    }

    pub async fn set_endpoints(
        &self,
        namespace: &str,
        service: &str,
        endpoints: EndpointSet,
    ) {
        let mut s = self.state.write().await;
        s.endpoints.insert(key(namespace, service), endpoints);
    }

    pub async fn set_nodes(&self, ips: Vec<String>) {
        self.state.write().await.nodes = ips;
    }

    /// Queue statuses for `name`; every `get` applies the next one. Once the
    /// queue is drained the last status sticks.
    pub async fn script_job(&self, name: &str, statuses: Vec<ProbeJobStatus>) {
        let mut s = self.state.write().await;
        s.scripts.insert(name.to_string(), statuses.into());
    }

    pub async fn fail_job_create(&self, err: ClusterError) {
        self.state.write().await.faults.job_create = Some(err);
    }

    /// Let `passing` gets through untouched, then fail one get per error.
    pub async fn fail_job_gets_after(&self, passing: usize, errs: Vec<ClusterError>) {
        let mut s = self.state.write().await;
        let queue = &mut s.faults.job_gets;
        queue.extend(std::iter::repeat_with(|| None).take(passing));
        queue.extend(errs.into_iter().map(Some));
    }

    pub async fn fail_next_pod_lists(&self, errs: Vec<ClusterError>) {
        self.state.write().await.faults.pod_lists.extend(errs);
    }

    /// Accept creates but never return the job afterwards.
    pub async fn lose_jobs(&self) {
        self.state.write().await.faults.lose_jobs = true;
    }

    pub async fn stats(&self) -> CallStats {
        self.state.read().await.stats.clone()
    }

    pub async fn namespaces(&self) -> Vec<String> {
        self.state.read().await.namespaces.iter().cloned().collect()
    }

    fn pending_pod(&self, s: &mut State, name: String) -> PodState {
        let n = s.alloc();
        let (hi, lo) = (n / 256, n % 256);
        let mut ips = vec![format!("10.244.{hi}.{lo}")];
        let mut secondary_ips = Vec::new();
        if self.rollout.attach_secondary {
            secondary_ips.push(format!("10.6.{hi}.{lo}"));
        }
        if self.rollout.dual_stack {
            ips.push(format!("fd00:10:244::{n:x}"));
            if self.rollout.attach_secondary {
                secondary_ips.push(format!("fd00:10:6::{n:x}"));
            }
        }
        PodState {
            name,
            phase: "Pending".into(),
            ready: false,
            node: Some("kind-worker".into()),
            ips,
            secondary_ips,
        }
    }
}

#[async_trait]
impl ClusterStateReader for InMemoryCluster {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> ClusterResult<Vec<PodState>> {
        let mut s = self.state.write().await;
        s.stats.pod_lists += 1;
        if let Some(err) = s.faults.pod_lists.pop_front() {
            return Err(err);
        }
        let surplus = self.rollout.surplus_pods;
        let mut out = Vec::new();
        for w in s.workloads.iter_mut() {
            if w.namespace != namespace || !labels_match(selector, &w.labels) {
                continue;
            }
            match w.warmup {
                Some(0) => {
                    let promotable = w.pods.len().saturating_sub(surplus);
                    for pod in w.pods.iter_mut().take(promotable) {
                        pod.phase = "Running".into();
                        pod.ready = true;
                    }
                    w.warmup = None;
                }
                Some(n) => w.warmup = Some(n - 1),
                None => {}
            }
            out.extend(w.pods.iter().cloned());
        }
        Ok(out)
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<ServiceInfo>> {
        let s = self.state.read().await;
        Ok(s.services.get(&key(namespace, name)).map(|svc| svc.info.clone()))
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        service: &str,
    ) -> ClusterResult<Option<EndpointSet>> {
        let mut s = self.state.write().await;
        s.stats.endpoint_gets += 1;
        let k = key(namespace, service);
        if let Some(explicit) = s.endpoints.get(&k) {
            return Ok(Some(explicit.clone()));
        }
        let Some(svc) = s.services.get_mut(&k) else {
            return Ok(None);
        };
        if svc.warmup > 0 {
            svc.warmup -= 1;
            return Ok(None);
        }
        let selector = svc.selector.clone();
        let mut set = EndpointSet::default();
        for w in s.workloads.iter().filter(|w| {
            w.namespace == namespace && labels_match(&selector, &w.labels)
        }) {
            for pod in &w.pods {
                let addr = pod.ips.first().cloned().unwrap_or_default();
                if pod.is_fully_ready() {
                    set.ready.push(addr);
                } else {
                    set.not_ready.push(addr);
                }
            }
        }
        Ok(Some(set))
    }

    async fn node_internal_ips(&self) -> ClusterResult<Vec<String>> {
        Ok(self.state.read().await.nodes.clone())
    }
}

#[async_trait]
impl WorkloadProvisioner for InMemoryCluster {
    async fn create_namespace(&self, name: &str) -> ClusterResult<()> {
        let mut s = self.state.write().await;
        if !s.namespaces.insert(name.to_string()) {
            return Err(already_exists("namespaces", name));
        }
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> ClusterResult<()> {
        let mut s = self.state.write().await;
        s.namespaces.remove(name);
        s.workloads.retain(|w| w.namespace != name);
        s.services.retain(|(ns, _), _| ns != name);
        s.endpoints.retain(|(ns, _), _| ns != name);
        Ok(())
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> ClusterResult<DeploymentHandle> {
        let handle = DeploymentHandle::from_manifest(namespace, deployment)?;
        let mut s = self.state.write().await;
        if !s.namespaces.contains(namespace) {
            return Err(not_found("namespaces", namespace));
        }
        if s.workloads.iter().any(|w| {
            w.namespace == namespace && w.labels == handle.selector
        }) {
            return Err(already_exists("deployments.apps", &handle.name));
        }
        let total = handle.replicas + self.rollout.surplus_pods;
        let pods = (0..total)
            .map(|i| self.pending_pod(&mut s, format!("{}-{i}", handle.name)))
            .collect();
        s.workloads.push(Workload {
            namespace: namespace.to_string(),
            labels: handle.selector.clone(),
            pods,
            warmup: Some(self.rollout.pod_warmup_reads),
        });
        Ok(handle)
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> ClusterResult<ServiceHandle> {
        let name = service.name_any();
        let spec = service.spec.clone().unwrap_or_default();
        let mut s = self.state.write().await;
        if !s.namespaces.contains(namespace) {
            return Err(not_found("namespaces", namespace));
        }
        let k = key(namespace, &name);
        if s.services.contains_key(&k) {
            return Err(already_exists("services", &name));
        }
        let n = s.alloc();
        let mut cluster_ips = vec![format!("10.96.{}.{}", n / 256, n % 256)];
        if self.rollout.dual_stack {
            cluster_ips.push(format!("fd00:10:96::{n:x}"));
        }
        let node_ports = spec
            .ports
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, p)| p.node_port.unwrap_or(30000 + n as i32 + i as i32))
            .collect();
        s.services.insert(
            k,
            SimService {
                info: ServiceInfo {
                    name: name.clone(),
                    cluster_ips,
                    node_ports,
                },
                selector: spec.selector.unwrap_or_default(),
                warmup: self.rollout.endpoint_warmup_reads,
            },
        );
        Ok(ServiceHandle {
            namespace: namespace.to_string(),
            name,
        })
    }
}

#[async_trait]
impl JobStore for InMemoryCluster {
    async fn create(&self, job: &ProbeJob) -> ClusterResult<()> {
        let name = job.name_any();
        let mut s = self.state.write().await;
        s.stats.job_creates += 1;
        if let Some(err) = s.faults.job_create.take() {
            return Err(err);
        }
        if s.jobs.contains_key(&name) {
            return Err(already_exists("nethttps.spiderdoctor.spidernet.io", &name));
        }
        let mut stored = job.clone();
        stored.status = None;
        s.jobs.insert(name, stored);
        Ok(())
    }

    async fn get(&self, name: &str) -> ClusterResult<Option<ProbeJob>> {
        let mut s = self.state.write().await;
        s.stats.job_gets += 1;
        if let Some(Some(err)) = s.faults.job_gets.pop_front() {
            return Err(err);
        }
        if s.faults.lose_jobs || !s.jobs.contains_key(name) {
            return Ok(None);
        }
        let next = s.scripts.get_mut(name).and_then(|q| q.pop_front());
        let Some(job) = s.jobs.get_mut(name) else {
            return Ok(None);
        };
        if let Some(status) = next {
            job.status = Some(status);
        }
        Ok(Some(job.clone()))
    }
}
