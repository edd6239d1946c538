use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Namespace, PodSpec, PodTemplateSpec, Service,
    ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::json;

pub const NETWORKS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";
pub const NETWORK_STATUS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/network-status";
pub const IPPOOL_ANNOTATION: &str = "ipam.spidernet.io/ippool";
pub const IPPOOLS_ANNOTATION: &str = "ipam.spidernet.io/ippools";

/// One secondary interface: which NetworkAttachmentDefinition backs it and
/// which pools its addresses come from.
#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub network: String,
    pub interface: String,
    pub ipv4_pools: Vec<String>,
    pub ipv6_pools: Vec<String>,
}

impl Attachment {
    /// `<network>` served from `<network>-v4` / `<network>-v6` style pools.
    pub fn new(
        network: impl Into<String>,
        interface: impl Into<String>,
        ipv4_pool: impl Into<String>,
        ipv6_pool: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            interface: interface.into(),
            ipv4_pools: vec![ipv4_pool.into()],
            ipv6_pools: vec![ipv6_pool.into()],
        }
    }

    fn pool_json(&self) -> serde_json::Value {
        json!({
            "interface": self.interface,
            "ipv4": self.ipv4_pools,
            "ipv6": self.ipv6_pools,
        })
    }
}

/// Pod annotations requesting `attachments` from Multus in `multus_ns`.
/// A single attachment uses the singular pool annotation, several use the
/// list form.
pub fn attachment_annotations(
    multus_ns: &str,
    attachments: &[Attachment],
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if attachments.is_empty() {
        return out;
    }
    let networks = attachments
        .iter()
        .map(|a| format!("{multus_ns}/{}", a.network))
        .collect::<Vec<_>>()
        .join(",");
    out.insert(NETWORKS_ANNOTATION.to_string(), networks);
    match attachments {
        [single] => {
            out.insert(
                IPPOOL_ANNOTATION.to_string(),
                single.pool_json().to_string(),
            );
        }
        many => {
            let pools: Vec<_> = many.iter().map(Attachment::pool_json).collect();
            out.insert(
                IPPOOLS_ANNOTATION.to_string(),
                serde_json::Value::Array(pools).to_string(),
            );
        }
    }
    out
}

#[derive(Clone, Debug)]
pub struct WorkloadTemplate<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub labels: &'a BTreeMap<String, String>,
    /// Pod template annotations
    pub annotations: &'a BTreeMap<String, String>,
    pub replicas: i32,
    pub image: &'a str,
    pub port: i32,
}

pub fn deployment(t: &WorkloadTemplate<'_>) -> Deployment {
    let labels = Some(t.labels.clone());
    let annotations = if t.annotations.is_empty() {
        None
    } else {
        Some(t.annotations.clone())
    };
    Deployment {
        metadata: ObjectMeta {
            name: Some(t.name.to_string()),
            namespace: Some(t.namespace.to_string()),
            labels: labels.clone(),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(t.replicas),
            selector: LabelSelector {
                match_labels: labels.clone(),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels,
                    annotations,
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: t.name.to_string(),
                        image: Some(t.image.to_string()),
                        image_pull_policy: Some("IfNotPresent".into()),
                        ports: Some(vec![ContainerPort {
                            container_port: t.port,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// NodePort service in front of the pods matched by `selector`.
pub fn node_port_service(
    name: &str,
    namespace: &str,
    port: i32,
    selector: &BTreeMap<String, String>,
    dual_stack: bool,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(selector.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("NodePort".into()),
            selector: Some(selector.clone()),
            ip_family_policy: dual_stack.then(|| "PreferDualStack".into()),
            ports: Some(vec![ServicePort {
                name: Some("http".into()),
                port,
                target_port: Some(IntOrString::Int(port)),
                protocol: Some("TCP".into()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}
