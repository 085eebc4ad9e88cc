//! # Azure Resource Manager Client
//!
//! Minimal REST client for the tags of compute resources.
//!
//! - `GET {resource}?api-version=...` reads the resource and returns its `tags`
//! - `PATCH {resource}?api-version=...` with `{"tags": {...}}` replaces the tag set
//!
//! Token acquisition is behind [`AccessTokenSource`] so the client can be pointed at a
//! mock server with a static token.

use crate::constants::{ARM_TOKEN_SCOPE, COMPUTE_API_VERSION};
use crate::observability::metrics;
use crate::provider::azure::ResourceIdentity;
use crate::sync::TagMap;
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{TokenCredential, TokenRequestOptions};
use azure_identity::{ManagedIdentityCredential, WorkloadIdentityCredential};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// Supplies bearer tokens for ARM requests
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token, for local development and contract tests
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Tokens from an Azure identity credential
pub struct AzureCredential {
    credential: Arc<dyn TokenCredential>,
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredential").finish_non_exhaustive()
    }
}

impl AzureCredential {
    /// Pick a credential from the pod environment.
    ///
    /// Workload Identity is used when a client ID is configured and the federated token
    /// file is mounted; Managed Identity otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be constructed.
    pub fn from_environment(client_id: Option<&str>) -> Result<Self> {
        let federated_token = std::env::var("AZURE_FEDERATED_TOKEN_FILE").is_ok();
        let credential: Arc<dyn TokenCredential> = match client_id {
            Some(client_id) if federated_token => {
                info!(
                    "Using Azure Workload Identity authentication with client ID: {}",
                    client_id
                );
                let options = azure_identity::WorkloadIdentityCredentialOptions {
                    client_id: Some(client_id.to_string()),
                    ..Default::default()
                };
                WorkloadIdentityCredential::new(Some(options))
                    .context("Failed to create WorkloadIdentityCredential")?
            }
            _ => {
                info!("Using Managed Identity authentication");
                ManagedIdentityCredential::new(None)
                    .context("Failed to create ManagedIdentityCredential")?
            }
        };
        Ok(Self { credential })
    }
}

#[async_trait]
impl AccessTokenSource for AzureCredential {
    async fn token(&self) -> Result<String> {
        let token_response = self
            .credential
            .get_token(&[ARM_TOKEN_SCOPE], Some(TokenRequestOptions::default()))
            .await
            .context("Failed to get Azure Resource Manager access token")?;
        Ok(token_response.token.secret().to_string())
    }
}

/// The part of a VM / VM scale set resource body the controller reads
#[derive(Debug, Deserialize)]
struct ComputeResource {
    #[serde(default)]
    tags: Option<BTreeMap<String, Option<String>>>,
}

#[derive(Debug, Serialize)]
struct TagsUpdate<'a> {
    tags: &'a TagMap,
}

/// ARM REST client. Built once at startup and shared.
pub struct ArmClient {
    client: Client,
    endpoint: String,
    api_version: String,
    credential: Arc<dyn AccessTokenSource>,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl ArmClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: &str, credential: Arc<dyn AccessTokenSource>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: COMPUTE_API_VERSION.to_string(),
            credential,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn resource_url(&self, resource: &ResourceIdentity) -> String {
        format!(
            "{}{}?api-version={}",
            self.endpoint,
            resource.arm_id(),
            self.api_version
        )
    }

    /// Read the tags of a resource. A missing resource has no tags.
    ///
    /// # Errors
    ///
    /// Returns an error on token, transport, HTTP or decoding failure.
    pub async fn get_tags(&self, resource: &ResourceIdentity) -> Result<TagMap> {
        let span = info_span!("azure.arm.get_tags", resource.id = %resource);
        let start = Instant::now();

        async move {
            let result = self.fetch_tags(resource).await;
            match &result {
                Ok(tags) => {
                    metrics::record_arm_operation("get_tags", start.elapsed().as_secs_f64());
                    debug!(tags = tags.len(), "Read ARM tags");
                }
                Err(_) => metrics::increment_arm_operation_errors("get_tags"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn fetch_tags(&self, resource: &ResourceIdentity) -> Result<TagMap> {
        let token = self.credential.token().await?;
        let response = self
            .client
            .get(self.resource_url(resource))
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to request ARM resource")?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("ARM resource not found, treating as untagged");
            return Ok(TagMap::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Failed to read ARM resource {resource}: {status} - {error_text}"
            ));
        }

        let body: ComputeResource = response
            .json()
            .await
            .context("Failed to deserialize ARM resource")?;
        Ok(body
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name, value.unwrap_or_default()))
            .collect())
    }

    /// Replace the tag set of a resource
    ///
    /// # Errors
    ///
    /// Returns an error on token, transport or HTTP failure.
    pub async fn update_tags(&self, resource: &ResourceIdentity, tags: &TagMap) -> Result<()> {
        let span = info_span!("azure.arm.update_tags", resource.id = %resource, tags = tags.len());
        let start = Instant::now();

        async move {
            let result = self.patch_tags(resource, tags).await;
            match &result {
                Ok(()) => {
                    metrics::record_arm_operation("update_tags", start.elapsed().as_secs_f64());
                    info!("Updated ARM tags");
                }
                Err(_) => metrics::increment_arm_operation_errors("update_tags"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn patch_tags(&self, resource: &ResourceIdentity, tags: &TagMap) -> Result<()> {
        let token = self.credential.token().await?;
        let response = self
            .client
            .patch(self.resource_url(resource))
            .header("Authorization", format!("Bearer {token}"))
            .json(&TagsUpdate { tags })
            .send()
            .await
            .context("Failed to send ARM tag update")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Failed to update tags of {resource}: {status} - {error_text}"
            ));
        }
        Ok(())
    }
}
