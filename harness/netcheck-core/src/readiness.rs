use async_trait::async_trait;

use crate::cluster::{ClusterStateReader, Labels, selector_string};
use crate::error::ClusterError;
use crate::poller::{Observation, ReadinessCheck};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PodCounts {
    /// Pods matching the selector, ready or not
    pub matched: usize,
    /// Matching pods that are Running with Ready=True
    pub ready: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EndpointCounts {
    pub ready_addresses: usize,
    pub not_ready_addresses: usize,
}

/// Exact match: a surplus of ready pods (stale replicas from an earlier
/// rollout) is as wrong as a deficit.
pub fn pod_set_ready(ready: usize, expected: usize) -> bool {
    ready == expected
}

/// Ready iff exactly `expected` pods matching `selector` in `namespace` are
/// Running with Ready=True.
pub struct PodSetReady<'a, R: ?Sized> {
    reader: &'a R,
    namespace: String,
    selector: Labels,
    expected: usize,
}

impl<'a, R: ?Sized> PodSetReady<'a, R> {
    pub fn new(
        reader: &'a R,
        namespace: impl Into<String>,
        selector: Labels,
        expected: usize,
    ) -> Self {
        Self {
            reader,
            namespace: namespace.into(),
            selector,
            expected,
        }
    }
}

#[async_trait]
impl<R> ReadinessCheck for PodSetReady<'_, R>
where
    R: ClusterStateReader + ?Sized,
{
    type State = PodCounts;

    fn describe(&self) -> String {
        format!(
            "{} ready pod(s) {} in {}",
            self.expected,
            selector_string(&self.selector),
            self.namespace
        )
    }

    async fn evaluate(&self) -> Result<Observation<PodCounts>, ClusterError> {
        let pods = self
            .reader
            .list_pods(&self.namespace, &self.selector)
            .await?;
        let counts = PodCounts {
            matched: pods.len(),
            ready: pods.iter().filter(|p| p.is_fully_ready()).count(),
        };
        if pod_set_ready(counts.ready, self.expected) {
            Ok(Observation::ready(counts))
        } else {
            Ok(Observation::pending(counts))
        }
    }
}

/// Ready once the service's endpoints list at least one ready address.
/// A missing Endpoints object just means the controller has not caught up.
pub struct EndpointsReady<'a, R: ?Sized> {
    reader: &'a R,
    namespace: String,
    service: String,
}

impl<'a, R: ?Sized> EndpointsReady<'a, R> {
    pub fn new(
        reader: &'a R,
        namespace: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            namespace: namespace.into(),
            service: service.into(),
        }
    }
}

#[async_trait]
impl<R> ReadinessCheck for EndpointsReady<'_, R>
where
    R: ClusterStateReader + ?Sized,
{
    type State = EndpointCounts;

    fn describe(&self) -> String {
        format!("endpoints of {}/{}", self.namespace, self.service)
    }

    async fn evaluate(
        &self,
    ) -> Result<Observation<EndpointCounts>, ClusterError> {
        let endpoints = match self
            .reader
            .get_endpoints(&self.namespace, &self.service)
            .await
        {
            Ok(found) => found,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let counts = endpoints
            .map(|set| EndpointCounts {
                ready_addresses: set.ready.len(),
                not_ready_addresses: set.not_ready.len(),
            })
            .unwrap_or_default();
        if counts.ready_addresses > 0 {
            Ok(Observation::ready(counts))
        } else {
            Ok(Observation::pending(counts))
        }
    }
}
