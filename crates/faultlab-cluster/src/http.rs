//! ---
//! chaos_section: "02-cluster-interfaces"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Cluster control API contract and HTTP client."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::fs;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use faultlab_common::config::ClusterConfig;

use crate::api::{ClusterControl, NetworkRuleSpec, PodSummary, StressPodSpec};
use crate::error::ClusterError;

const MERGE_PATCH: &str = "application/merge-patch+json";

/// Production [`ClusterControl`] implementation speaking to the Kubernetes
/// REST API with a bearer token and bounded request timeouts.
#[derive(Debug, Clone)]
pub struct HttpClusterClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClusterClient {
    /// Build a client from cluster configuration, reading the bearer token
    /// from disk when a path is configured (service-account mount).
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let token = match &config.token_path {
            Some(path) => Some(
                fs::read_to_string(path)
                    .map(|contents| contents.trim().to_owned())
                    .with_context(|| format!("unable to read token file {}", path.display()))?,
            ),
            None => None,
        };
        let base = Url::parse(&config.api_base_url)
            .with_context(|| format!("invalid cluster API URL '{}'", config.api_base_url))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to construct cluster HTTP client")?;
        Ok(Self {
            http,
            base_url: base.as_str().trim_end_matches('/').to_owned(),
            token,
        })
    }

    async fn execute(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        content_type: Option<&'static str>,
        body: Option<serde_json::Value>,
    ) -> Result<String, ClusterError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(value) = content_type {
            request = request.header(CONTENT_TYPE, value);
        }
        if let Some(payload) = body {
            request = request.json(&payload);
        }
        let response = request
            .send()
            .await
            .map_err(|err| ClusterError::from_transport(operation, err))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ClusterError::from_transport(operation, err))?;
        debug!(target: "faultlab::cluster", %method, %url, status = status.as_u16(), "cluster API call");
        if !status.is_success() {
            return Err(ClusterError::from_status(operation, status, &text));
        }
        Ok(text)
    }

    fn decode<T: serde::de::DeserializeOwned>(
        operation: &str,
        body: &str,
    ) -> Result<T, ClusterError> {
        serde_json::from_str(body).map_err(|err| ClusterError::Decode {
            operation: operation.to_owned(),
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl ClusterControl for HttpClusterClient {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSummary>, ClusterError> {
        let operation = "list pods";
        let path = format!("/api/v1/namespaces/{namespace}/pods");
        let body = self
            .execute(operation, Method::GET, &path, None, None)
            .await?;
        let list: PodList = Self::decode(operation, &body)?;
        Ok(list
            .items
            .into_iter()
            .map(|item| PodSummary {
                name: item.metadata.name,
                phase: item
                    .status
                    .and_then(|status| status.phase)
                    .unwrap_or_else(|| "Unknown".to_owned()),
            })
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let path = format!("/api/v1/namespaces/{namespace}/pods/{name}?gracePeriodSeconds=0");
        self.execute("delete pod", Method::DELETE, &path, None, None)
            .await?;
        Ok(())
    }

    async fn deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<i32, ClusterError> {
        let operation = "read deployment scale";
        let path = format!("/apis/apps/v1/namespaces/{namespace}/deployments/{name}/scale");
        let body = self
            .execute(operation, Method::GET, &path, None, None)
            .await?;
        let scale: Scale = Self::decode(operation, &body)?;
        Ok(scale.spec.and_then(|spec| spec.replicas).unwrap_or(0))
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        let path = format!("/apis/apps/v1/namespaces/{namespace}/deployments/{name}/scale");
        self.execute(
            "patch deployment scale",
            Method::PATCH,
            &path,
            Some(MERGE_PATCH),
            Some(json!({ "spec": { "replicas": replicas } })),
        )
        .await?;
        Ok(())
    }

    async fn create_network_rule(
        &self,
        namespace: &str,
        spec: &NetworkRuleSpec,
    ) -> Result<String, ClusterError> {
        let path = format!("/apis/networking.k8s.io/v1/namespaces/{namespace}/networkpolicies");
        self.execute(
            "create network rule",
            Method::POST,
            &path,
            None,
            Some(network_policy_body(namespace, spec)),
        )
        .await?;
        Ok(spec.name.clone())
    }

    async fn delete_network_rule(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        let path =
            format!("/apis/networking.k8s.io/v1/namespaces/{namespace}/networkpolicies/{name}");
        self.execute("delete network rule", Method::DELETE, &path, None, None)
            .await?;
        Ok(())
    }

    async fn create_stress_pod(
        &self,
        namespace: &str,
        spec: &StressPodSpec,
    ) -> Result<String, ClusterError> {
        let path = format!("/api/v1/namespaces/{namespace}/pods");
        self.execute(
            "create stress pod",
            Method::POST,
            &path,
            None,
            Some(stress_pod_body(namespace, spec)),
        )
        .await?;
        Ok(spec.name.clone())
    }
}

/// Build a NetworkPolicy that permits all egress except TCP traffic to the
/// blocked port. DNS stays reachable so unrelated lookups keep working.
fn network_policy_body(namespace: &str, spec: &NetworkRuleSpec) -> serde_json::Value {
    let below = spec.blocked_port.saturating_sub(1);
    let above = spec.blocked_port.saturating_add(1);
    let mut ports = vec![json!({ "protocol": "UDP", "port": 53 })];
    if below >= 1 {
        ports.push(json!({ "protocol": "TCP", "port": 1, "endPort": below }));
    }
    if spec.blocked_port < u16::MAX {
        ports.push(json!({ "protocol": "TCP", "port": above, "endPort": 65535 }));
    }
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "NetworkPolicy",
        "metadata": { "name": spec.name, "namespace": namespace },
        "spec": {
            "podSelector": { "matchLabels": { "app": spec.app_selector } },
            "policyTypes": ["Egress"],
            "egress": [ { "ports": ports } ]
        }
    })
}

/// Build a pod manifest that requests a fixed CPU/memory allocation and
/// spins until its active deadline reaps it.
fn stress_pod_body(namespace: &str, spec: &StressPodSpec) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": { "app": "faultlab-stress" }
        },
        "spec": {
            "restartPolicy": "Never",
            "activeDeadlineSeconds": spec.active_deadline.as_secs(),
            "containers": [ {
                "name": "stress",
                "image": spec.image,
                "command": ["sh", "-c", "while true; do :; done"],
                "resources": {
                    "requests": { "cpu": spec.cpu, "memory": spec.memory },
                    "limits": { "cpu": spec.cpu, "memory": spec.memory }
                }
            } ]
        }
    })
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PodStatus {
    phase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: ObjectMeta,
    #[serde(default)]
    status: Option<PodStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
struct ScaleSpec {
    replicas: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Scale {
    spec: Option<ScaleSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pod_list_decodes_names_and_phases() {
        let body = r#"{
            "items": [
                {"metadata": {"name": "backend-1"}, "status": {"phase": "Running"}},
                {"metadata": {"name": "backend-2"}}
            ]
        }"#;
        let list: PodList = serde_json::from_str(body).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].metadata.name, "backend-1");
        assert_eq!(list.items[0].status.as_ref().unwrap().phase.as_deref(), Some("Running"));
        assert!(list.items[1].status.is_none());
    }

    #[test]
    fn scale_decodes_replicas() {
        let scale: Scale = serde_json::from_str(r#"{"spec": {"replicas": 3}}"#).unwrap();
        assert_eq!(scale.spec.unwrap().replicas, Some(3));
    }

    #[test]
    fn network_policy_excludes_only_the_blocked_port() {
        let spec = NetworkRuleSpec {
            name: "faultlab-block-db".into(),
            app_selector: "backend".into(),
            blocked_port: 5432,
        };
        let body = network_policy_body("shop", &spec);
        let ports = body["spec"]["egress"][0]["ports"].as_array().unwrap();
        // DNS plus the two TCP ranges around the blocked port.
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[1]["endPort"], 5431);
        assert_eq!(ports[2]["port"], 5433);
        assert_eq!(body["spec"]["podSelector"]["matchLabels"]["app"], "backend");
    }

    #[test]
    fn stress_pod_carries_deadline_and_resources() {
        let spec = StressPodSpec {
            name: "faultlab-stress-0".into(),
            image: "busybox:1.36".into(),
            cpu: "500m".into(),
            memory: "256Mi".into(),
            active_deadline: Duration::from_secs(120),
        };
        let body = stress_pod_body("shop", &spec);
        assert_eq!(body["spec"]["activeDeadlineSeconds"], 120);
        assert_eq!(
            body["spec"]["containers"][0]["resources"]["limits"]["cpu"],
            "500m"
        );
        assert_eq!(body["metadata"]["labels"]["app"], "faultlab-stress");
    }
}
