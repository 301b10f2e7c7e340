//! HTTP adapter for a remote gateway deployment.
//!
//! Speaks a small `/v1` REST surface covering the three gateway ports:
//! auth (`/v1/auth/...`), documents (`/v1/collections/...`), and blobs
//! (`/v1/blobs/...`). Every call is a single attempt; failed attempts
//! surface immediately as terminal errors for that attempt.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};

use super::{
    AuthGateway, BlobStore, Document, DocumentStore, FederatedAssertion, Principal, Query,
    SessionChange,
};

/// Response from POST /v1/collections/{collection}
#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

/// Response from PUT /v1/blobs/{path}
#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

#[derive(Serialize)]
struct CredentialRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ProfileRequest<'a> {
    display_name: &'a str,
}

/// HTTP client for the remote gateway API
pub struct RestGateway {
    http_client: reqwest::Client,
    base_url: String,
    events: broadcast::Sender<SessionChange>,
}

impl RestGateway {
    /// Create a new gateway client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("gateway.base_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        // Build default headers
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Add authorization header
        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            http_client,
            base_url,
            events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, mapping transport failures and non-success statuses.
    ///
    /// 4xx validation rejections keep the gateway's message verbatim;
    /// everything else is wrapped by `wrap` according to the direction of
    /// the failed operation (read/write/upload).
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        wrap: fn(String) -> Error,
    ) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| wrap(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(Error::Validation(body)),
            StatusCode::NOT_FOUND => Err(Error::NotFound(body)),
            _ => Err(wrap(format!("gateway error ({}): {}", status, body))),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        wrap: fn(String) -> Error,
    ) -> Result<T> {
        let response = self.send(request, wrap).await?;
        response
            .json()
            .await
            .map_err(|e| wrap(format!("failed to parse response: {}", e)))
    }
}

#[async_trait]
impl AuthGateway for RestGateway {
    async fn create_account_credential(&self, email: &str, password: &str) -> Result<Principal> {
        let request = self
            .http_client
            .post(self.url("/v1/auth/credentials"))
            .json(&CredentialRequest { email, password });
        let principal: Principal = self.send_json(request, Error::Write).await?;

        let _ = self.events.send(SessionChange::SignedIn {
            principal_id: principal.id.clone(),
        });
        Ok(principal)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Principal> {
        let request = self
            .http_client
            .post(self.url("/v1/auth/sessions"))
            .json(&CredentialRequest { email, password });
        let principal: Principal = self.send_json(request, Error::Read).await?;

        let _ = self.events.send(SessionChange::SignedIn {
            principal_id: principal.id.clone(),
        });
        Ok(principal)
    }

    async fn federated_sign_in(&self, assertion: &FederatedAssertion) -> Result<Principal> {
        let request = self
            .http_client
            .post(self.url("/v1/auth/federated"))
            .json(assertion);
        let principal: Principal = self.send_json(request, Error::Read).await?;

        let _ = self.events.send(SessionChange::SignedIn {
            principal_id: principal.id.clone(),
        });
        Ok(principal)
    }

    async fn set_display_name(&self, name: &str) -> Result<()> {
        let request = self
            .http_client
            .patch(self.url("/v1/auth/profile"))
            .json(&ProfileRequest { display_name: name });
        self.send(request, Error::Write).await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        let request = self.http_client.delete(self.url("/v1/auth/session"));
        self.send(request, Error::Write).await?;

        let _ = self.events.send(SessionChange::SignedOut);
        Ok(())
    }

    fn subscribe_session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DocumentStore for RestGateway {
    async fn insert(&self, collection: &str, fields: Value) -> Result<String> {
        let request = self
            .http_client
            .post(self.url(&format!("/v1/collections/{}", collection)))
            .json(&fields);
        let response: InsertResponse = self.send_json(request, Error::Write).await?;
        Ok(response.id)
    }

    async fn put(&self, collection: &str, id: &str, fields: Value) -> Result<()> {
        let request = self
            .http_client
            .put(self.url(&format!(
                "/v1/collections/{}/{}",
                collection,
                urlencoding::encode(id)
            )))
            .json(&fields);
        self.send(request, Error::Write).await?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let request = self.http_client.get(self.url(&format!(
            "/v1/collections/{}/{}",
            collection,
            urlencoding::encode(id)
        )));

        match self.send_json(request, Error::Read).await {
            Ok(document) => Ok(Some(document)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let request = self
            .http_client
            .patch(self.url(&format!(
                "/v1/collections/{}/{}",
                collection,
                urlencoding::encode(id)
            )))
            .json(&patch);
        self.send(request, Error::Write).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let request = self.http_client.delete(self.url(&format!(
            "/v1/collections/{}/{}",
            collection,
            urlencoding::encode(id)
        )));
        self.send(request, Error::Write).await?;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let request = self
            .http_client
            .post(self.url(&format!("/v1/collections/{}/query", collection)))
            .json(query);
        self.send_json(request, Error::Read).await
    }
}

#[async_trait]
impl BlobStore for RestGateway {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let request = self
            .http_client
            .put(self.url(&format!("/v1/blobs/{}", path)))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec());
        let response: UploadResponse = self.send_json(request, Error::Upload).await?;
        Ok(response.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_base_url() {
        let config = GatewayConfig::default();
        assert!(RestGateway::new(&config).is_err());
    }

    #[test]
    fn test_client_with_valid_config() {
        let config = GatewayConfig {
            base_url: Some("https://gateway.example.com/".to_string()),
            api_key: Some("gb_live_test".to_string()),
            ..Default::default()
        };
        let gateway = RestGateway::new(&config).unwrap();
        assert_eq!(gateway.base_url, "https://gateway.example.com");
    }
}
