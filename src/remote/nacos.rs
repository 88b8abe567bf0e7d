//! Nacos open-API client.
//!
//! # Responsibilities
//! - Authenticate (`/v1/auth/login`) when credentials are configured
//! - Fetch settings documents (`/v1/cs/configs`)
//! - Poll listened documents and push changed content
//! - Register / deregister the instance and keep it alive with heartbeats
//!
//! # Design Decisions
//! - Server addresses are tried in order; the first that answers wins
//! - Listening polls and compares content instead of holding long-poll connections
//! - A failing poll or heartbeat backs off and keeps going until the receiver is dropped

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::{CenterConnector, ConfigCenter, ConfigChange, Instance, RemoteError};
use crate::resilience::Backoff;
use crate::subsystem::NacosConfig;

const NAMING_GROUP: &str = "DEFAULT_GROUP";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

struct Inner {
    http: reqwest::Client,
    servers: Vec<Url>,
    settings: NacosConfig,
    token: Option<String>,
}

/// HTTP client for a Nacos cluster.
#[derive(Clone)]
pub struct NacosClient {
    inner: Arc<Inner>,
    heartbeats: Arc<DashMap<String, JoinHandle<()>>>,
}

impl std::fmt::Debug for NacosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NacosClient")
            .field("servers", &self.inner.servers)
            .field("heartbeats", &self.heartbeats.len())
            .finish_non_exhaustive()
    }
}

impl NacosClient {
    pub async fn connect(settings: &NacosConfig) -> Result<Self, RemoteError> {
        let servers = settings.server_urls()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        let mut inner = Inner {
            http,
            servers,
            settings: settings.clone(),
            token: None,
        };
        if !settings.username.is_empty() {
            inner.token = Some(inner.login().await?);
        }

        tracing::info!(
            servers = inner.servers.len(),
            namespace = %settings.namespace,
            mode = ?settings.mode,
            "Config center client connected"
        );

        Ok(Self {
            inner: Arc::new(inner),
            heartbeats: Arc::new(DashMap::new()),
        })
    }
}

impl Inner {
    /// Send a request to the first server that answers.
    async fn send<F>(&self, method: Method, path: &str, build: F) -> Result<Response, RemoteError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut last = RemoteError::NoServer;
        for base in &self.servers {
            let url = base
                .join(path)
                .map_err(|_| RemoteError::InvalidAddress(base.to_string()))?;
            let mut request = build(self.http.request(method.clone(), url));
            if let Some(token) = &self.token {
                request = request.query(&[("accessToken", token)]);
            }
            match request.send().await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    tracing::warn!(server = %base, error = %err, "Config center server unreachable");
                    last = RemoteError::Http(err);
                }
            }
        }
        Err(last)
    }

    async fn login(&self) -> Result<String, RemoteError> {
        let settings = &self.settings;
        let response = self
            .send(Method::POST, "v1/auth/login", |req| {
                req.form(&[
                    ("username", settings.username.as_str()),
                    ("password", settings.password.as_str()),
                ])
            })
            .await?;
        let response = expect_success(response).await?;
        let login: LoginResponse = response.json().await?;
        Ok(login.access_token)
    }

    async fn fetch(&self, group: &str, data_id: &str) -> Result<String, RemoteError> {
        if !self.settings.enable_config() {
            return Err(RemoteError::Disabled("config"));
        }
        let tenant = self.settings.tenant();
        let response = self
            .send(Method::GET, "v1/cs/configs", |req| {
                req.query(&[("dataId", data_id), ("group", group), ("tenant", tenant)])
            })
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound {
                group: group.to_string(),
                data_id: data_id.to_string(),
            });
        }
        Ok(expect_success(response).await?.text().await?)
    }

    async fn poll(
        self: Arc<Self>,
        group: String,
        data_id: String,
        mut last: String,
        updates: mpsc::UnboundedSender<ConfigChange>,
    ) {
        let interval = Duration::from_secs(self.settings.poll_interval_secs.max(1));
        let backoff = Backoff::default();
        let mut failures = 0u32;

        loop {
            let wait = if failures == 0 { interval } else { backoff.delay(failures) };
            tokio::time::sleep(wait).await;
            if updates.is_closed() {
                break;
            }

            match self.fetch(&group, &data_id).await {
                Ok(content) => {
                    failures = 0;
                    if content == last {
                        continue;
                    }
                    last = content.clone();
                    let change = ConfigChange {
                        group: group.clone(),
                        data_id: data_id.clone(),
                        content,
                    };
                    if updates.send(change).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(group = %group, data_id = %data_id, attempt = failures, error = %err, "Settings poll failed");
                }
            }
        }
        tracing::debug!(group = %group, data_id = %data_id, "Settings listener stopped");
    }

    fn instance_params(&self, instance: &Instance) -> Vec<(&'static str, String)> {
        vec![
            ("serviceName", instance.name.clone()),
            ("groupName", NAMING_GROUP.to_string()),
            ("namespaceId", self.settings.tenant().to_string()),
            ("ip", instance.host.clone()),
            ("port", instance.port.to_string()),
        ]
    }

    async fn beat(&self, instance: &Instance) -> Result<(), RemoteError> {
        let beat = serde_json::json!({
            "serviceName": instance.name,
            "ip": instance.host,
            "port": instance.port,
            "weight": 1.0,
            "ephemeral": true,
        })
        .to_string();
        let mut params = self.instance_params(instance);
        params.push(("beat", beat));
        let response = self
            .send(Method::PUT, "v1/ns/instance/beat", |req| req.query(&params))
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn heartbeat(self: Arc<Self>, instance: Instance) {
        let interval = Duration::from_secs(self.settings.heartbeat_secs.max(1));
        let backoff = Backoff::default();
        let mut failures = 0u32;
        loop {
            let wait = if failures == 0 { interval } else { backoff.delay(failures) };
            tokio::time::sleep(wait).await;
            match self.beat(&instance).await {
                Ok(()) => failures = 0,
                Err(err) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(instance = %instance, attempt = failures, error = %err, "Heartbeat failed");
                }
            }
        }
    }
}

async fn expect_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ConfigCenter for NacosClient {
    async fn fetch(&self, group: &str, data_id: &str) -> Result<String, RemoteError> {
        self.inner.fetch(group, data_id).await
    }

    async fn listen(
        &self,
        group: &str,
        data_id: &str,
        updates: mpsc::UnboundedSender<ConfigChange>,
    ) -> Result<(), RemoteError> {
        let initial = self.inner.fetch(group, data_id).await?;
        let inner = self.inner.clone();
        tokio::spawn(inner.poll(group.to_string(), data_id.to_string(), initial, updates));
        tracing::info!(group = %group, data_id = %data_id, "Listening for settings changes");
        Ok(())
    }

    async fn register(&self, instance: &Instance) -> Result<(), RemoteError> {
        if !self.inner.settings.enable_naming() {
            return Err(RemoteError::Disabled("naming"));
        }
        let mut params = self.inner.instance_params(instance);
        params.push(("ephemeral", "true".to_string()));
        params.push(("healthy", "true".to_string()));
        params.push(("enabled", "true".to_string()));
        params.push(("weight", "1.0".to_string()));
        let response = self
            .inner
            .send(Method::POST, "v1/ns/instance", |req| req.form(&params))
            .await?;
        expect_success(response).await?;

        let handle = tokio::spawn(self.inner.clone().heartbeat(instance.clone()));
        if let Some(previous) = self.heartbeats.insert(instance.to_string(), handle) {
            previous.abort();
        }
        tracing::info!(instance = %instance, "Instance registered");
        Ok(())
    }

    async fn deregister(&self, instance: &Instance) -> Result<(), RemoteError> {
        if !self.inner.settings.enable_naming() {
            return Err(RemoteError::Disabled("naming"));
        }
        if let Some((_, handle)) = self.heartbeats.remove(&instance.to_string()) {
            handle.abort();
        }
        let mut params = self.inner.instance_params(instance);
        params.push(("ephemeral", "true".to_string()));
        let response = self
            .inner
            .send(Method::DELETE, "v1/ns/instance", |req| req.query(&params))
            .await?;
        expect_success(response).await?;
        tracing::info!(instance = %instance, "Instance deregistered");
        Ok(())
    }
}

impl Drop for NacosClient {
    fn drop(&mut self) {
        // Last handle gone: nobody can deregister anymore, stop beating.
        if Arc::strong_count(&self.heartbeats) == 1 {
            for entry in self.heartbeats.iter() {
                entry.value().abort();
            }
        }
    }
}

/// Default connector producing a [`NacosClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NacosConnector;

#[async_trait]
impl CenterConnector for NacosConnector {
    async fn connect(&self, settings: &NacosConfig) -> Result<Arc<dyn ConfigCenter>, RemoteError> {
        Ok(Arc::new(NacosClient::connect(settings).await?))
    }
}
