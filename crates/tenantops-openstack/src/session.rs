//! Keystone v3 session
//!
//! Password authentication scoped to a project. The token travels in the
//! `X-Auth-Token` header of every later request; endpoints come from the
//! service catalog returned with the token.

use crate::error::{OpenStackError, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tenantops_config::require_var;

const TOKEN_HEADER: &str = "X-Auth-Token";
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Credentials and endpoint selection, read from the usual `OS_*` variables
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    pub user_domain_name: String,
    pub project_domain_name: String,
    pub region: Option<String>,
    /// Catalog interface: `public`, `internal` or `admin`
    pub interface: String,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let optional = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            auth_url: require_var("OS_AUTH_URL")?,
            username: require_var("OS_USERNAME")?,
            password: require_var("OS_PASSWORD")?,
            project_name: require_var("OS_PROJECT_NAME")?,
            user_domain_name: optional("OS_USER_DOMAIN_NAME")
                .unwrap_or_else(|| "Default".to_string()),
            project_domain_name: optional("OS_PROJECT_DOMAIN_NAME")
                .unwrap_or_else(|| "Default".to_string()),
            region: optional("OS_REGION_NAME"),
            interface: optional("OS_INTERFACE").unwrap_or_else(|| "public".to_string()),
        })
    }

    /// The identity v3 base URL, whether or not `OS_AUTH_URL` names the version
    pub fn identity_url(&self) -> String {
        let base = self.auth_url.trim_end_matches('/');
        if base.ends_with("/v3") {
            base.to_string()
        } else {
            format!("{}/v3", base)
        }
    }

    fn request_body(&self) -> serde_json::Value {
        serde_json::json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.username,
                            "domain": { "name": self.user_domain_name },
                            "password": self.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": self.project_name,
                        "domain": { "name": self.project_domain_name },
                    }
                }
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub url: String,
}

/// Pick the endpoint of `service_type` for `interface` (and `region` when set)
pub fn select_endpoint(
    catalog: &[CatalogEntry],
    service_type: &str,
    interface: &str,
    region: Option<&str>,
) -> Option<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .flat_map(|entry| entry.endpoints.iter())
        .filter(|endpoint| endpoint.interface == interface)
        .find(|endpoint| {
            region.is_none_or(|wanted| {
                endpoint.region_id.as_deref() == Some(wanted)
                    || endpoint.region.as_deref() == Some(wanted)
            })
        })
        .map(|endpoint| endpoint.url.trim_end_matches('/').to_string())
}

/// An authenticated connection to the cloud
pub struct Session {
    client: reqwest::Client,
    token: String,
    catalog: Vec<CatalogEntry>,
    identity_url: String,
    interface: String,
    region: Option<String>,
}

impl Session {
    pub async fn authenticate(config: &AuthConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let identity_url = config.identity_url();
        let url = format!("{}/auth/tokens", identity_url);
        tracing::debug!("POST {}", url);

        let response = client.post(&url).json(&config.request_body()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OpenStackError::AuthenticationFailed(format!(
                "{} ({}): {}",
                config.username,
                status.as_u16(),
                message
            )));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                OpenStackError::AuthenticationFailed(format!(
                    "response carried no {} header",
                    SUBJECT_TOKEN_HEADER
                ))
            })?;
        let body: TokenResponse = response.json().await?;

        tracing::debug!(
            "Authenticated as {} with {} catalog entries",
            config.username,
            body.token.catalog.len()
        );

        Ok(Self {
            client,
            token,
            catalog: body.token.catalog,
            identity_url,
            interface: config.interface.clone(),
            region: config.region.clone(),
        })
    }

    pub fn identity_url(&self) -> &str {
        &self.identity_url
    }

    /// Endpoint of `service_type`; first match wins when several types are given
    pub fn endpoint(&self, service_types: &[&str]) -> Result<String> {
        service_types
            .iter()
            .find_map(|service_type| {
                select_endpoint(
                    &self.catalog,
                    service_type,
                    &self.interface,
                    self.region.as_deref(),
                )
            })
            .ok_or_else(|| {
                OpenStackError::EndpointNotFound(service_types.first().copied().unwrap_or("").to_string())
            })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        tracing::debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .header(TOKEN_HEADER, &self.token)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(OpenStackError::ApiError {
            status: status.as_u16(),
            message: api_message(&message),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .execute(self.request(Method::GET, url).query(query))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.execute(self.request(method, url).json(body)).await?;
        Ok(response.json().await?)
    }

    /// Request whose response body is ignored
    pub async fn send_empty<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<()> {
        let mut request = self.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request).await?;
        Ok(())
    }

    pub async fn delete(&self, url: &str) -> Result<()> {
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

/// Extract the human part of an OpenStack error body
///
/// Services wrap messages differently (`{"NeutronError": {"message": ..}}`,
/// `{"itemNotFound": {"message": ..}}`, `{"error": {"message": ..}}`); the
/// raw body is returned when no message is found.
pub fn api_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.as_object())
        .and_then(|object| {
            object.values().find_map(|inner| {
                inner
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CATALOG: &str = r#"{
        "token": {
            "catalog": [
                {
                    "type": "compute",
                    "name": "nova",
                    "endpoints": [
                        {"interface": "internal", "region_id": "RegionOne", "url": "http://nova.internal:8774/v2.1"},
                        {"interface": "public", "region_id": "RegionOne", "url": "https://nova.example.org/v2.1/"},
                        {"interface": "public", "region_id": "RegionTwo", "url": "https://nova2.example.org/v2.1"}
                    ]
                },
                {
                    "type": "network",
                    "name": "neutron",
                    "endpoints": [
                        {"interface": "public", "region": "RegionOne", "url": "https://neutron.example.org"}
                    ]
                }
            ]
        }
    }"#;

    fn catalog() -> Vec<CatalogEntry> {
        let response: TokenResponse = serde_json::from_str(CATALOG).unwrap();
        response.token.catalog
    }

    #[test]
    fn test_select_endpoint() {
        let catalog = catalog();
        assert_eq!(
            select_endpoint(&catalog, "compute", "public", None).as_deref(),
            Some("https://nova.example.org/v2.1")
        );
        assert_eq!(
            select_endpoint(&catalog, "compute", "public", Some("RegionTwo")).as_deref(),
            Some("https://nova2.example.org/v2.1")
        );
        assert_eq!(
            select_endpoint(&catalog, "compute", "internal", None).as_deref(),
            Some("http://nova.internal:8774/v2.1")
        );
        assert_eq!(
            select_endpoint(&catalog, "network", "public", Some("RegionOne")).as_deref(),
            Some("https://neutron.example.org")
        );
        assert_eq!(select_endpoint(&catalog, "volumev3", "public", None), None);
    }

    #[test]
    fn test_identity_url() {
        let mut config = AuthConfig {
            auth_url: "https://keystone.example.org:5000/".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            project_name: "admin".to_string(),
            user_domain_name: "Default".to_string(),
            project_domain_name: "Default".to_string(),
            region: None,
            interface: "public".to_string(),
        };
        assert_eq!(config.identity_url(), "https://keystone.example.org:5000/v3");

        config.auth_url = "https://keystone.example.org:5000/v3".to_string();
        assert_eq!(config.identity_url(), "https://keystone.example.org:5000/v3");

        let body = config.request_body();
        assert_eq!(body["auth"]["identity"]["password"]["user"]["name"], "admin");
        assert_eq!(body["auth"]["scope"]["project"]["domain"]["name"], "Default");
    }

    #[test]
    fn test_api_message() {
        assert_eq!(
            api_message(r#"{"NeutronError": {"type": "NetworkInUse", "message": "Network in use"}}"#),
            "Network in use"
        );
        assert_eq!(
            api_message(r#"{"itemNotFound": {"code": 404, "message": "Instance could not be found"}}"#),
            "Instance could not be found"
        );
        assert_eq!(api_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    #[serial]
    fn test_auth_config_from_env() {
        temp_env::with_vars(
            [
                ("OS_AUTH_URL", Some("https://keystone.example.org/v3")),
                ("OS_USERNAME", Some("admin")),
                ("OS_PASSWORD", Some("secret")),
                ("OS_PROJECT_NAME", Some("admin")),
                ("OS_USER_DOMAIN_NAME", None),
                ("OS_PROJECT_DOMAIN_NAME", None),
                ("OS_REGION_NAME", Some("RegionOne")),
                ("OS_INTERFACE", None),
            ],
            || {
                let config = AuthConfig::from_env().unwrap();
                assert_eq!(config.user_domain_name, "Default");
                assert_eq!(config.region.as_deref(), Some("RegionOne"));
                assert_eq!(config.interface, "public");
            },
        );
    }

    #[test]
    #[serial]
    fn test_auth_config_missing_password() {
        temp_env::with_vars(
            [
                ("OS_AUTH_URL", Some("https://keystone.example.org/v3")),
                ("OS_USERNAME", Some("admin")),
                ("OS_PASSWORD", None),
                ("OS_PROJECT_NAME", Some("admin")),
            ],
            || {
                let err = AuthConfig::from_env().unwrap_err();
                assert_eq!(
                    err.to_string(),
                    "Configuration error: OS_PASSWORD environment variable must be set"
                );
            },
        );
    }
}
