//! HashiCorp Vault HTTP API client
//!
//! Implements [`RemoteApi`] over Vault's logical endpoints:
//! - write: `POST {addr}/v1/{path}`
//! - read: `GET {addr}/v1/{path}`, returning the response's `data` object
//! - delete: `DELETE {addr}/v1/{path}`
//!
//! Authentication is a static token sent as `X-Vault-Token`.

use ar_core::{Payload, RemoteApi, RemoteError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Vault client for one server (and optional namespace)
pub struct VaultClient {
    client: Client,
    addr: String,
    token: Option<String>,
    namespace: Option<String>,
}

impl VaultClient {
    /// Create a new Vault client
    ///
    /// # Arguments
    /// * `addr` - Vault server address (e.g., "http://vault:8200")
    /// * `token` - Optional token (falls back to the VAULT_TOKEN env var)
    /// * `namespace` - Optional Vault Enterprise namespace
    /// * `timeout` - Upper bound for each request
    pub fn new(
        addr: &str,
        token: Option<String>,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let token = token.or_else(|| std::env::var("VAULT_TOKEN").ok());
        let namespace = namespace.filter(|ns| !ns.is_empty());

        info!(
            addr = %addr,
            namespace = namespace.as_deref().unwrap_or(""),
            timeout_ms = timeout.as_millis() as u64,
            "Initialized HashiCorp Vault client"
        );

        Ok(Self {
            client,
            addr: addr.trim_end_matches('/').to_string(),
            token,
            namespace,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = %url, "Sending request to Vault");

        let mut request = self.client.request(method, &url);
        if let Some(token) = &self.token {
            request = request.header("X-Vault-Token", token);
        }
        if let Some(namespace) = &self.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("Failed to connect to Vault: {}", e)))
    }
}

async fn status_error(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RemoteError::Status { status, body }
}

/// Extract `data` from a read response body. An empty body or a null `data`
/// means there is nothing at the path.
fn read_data(body: &str) -> Result<Option<Payload>, RemoteError> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| RemoteError::Decode(format!("Failed to parse Vault response: {}", e)))?;

    match envelope.get("data") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(data)) => Ok(Some(data.clone())),
        Some(other) => Err(RemoteError::Decode(format!(
            "Expected an object in Vault response data, got {}",
            other
        ))),
    }
}

#[async_trait]
impl RemoteApi for VaultClient {
    async fn write(&self, path: &str, data: Payload) -> Result<(), RemoteError> {
        let response = self.send(self.request(Method::POST, path).json(&data)).await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Payload>, RemoteError> {
        let response = self.send(self.request(Method::GET, path)).await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => return Ok(None),
            status if !status.is_success() => return Err(status_error(response).await),
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(format!("Failed to read Vault response: {}", e)))?;
        read_data(&body)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let response = self.send(self.request(Method::DELETE, path)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "vault"
    }
}
