use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_bedrock::{config, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{sdk_failure, TransportError};
use crate::wire;

const LIST_POLICIES: &str = "ListAutomatedReasoningPolicies";
const EXPORT_POLICY: &str = "ExportAutomatedReasoningPolicyVersion";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub policy_arn: String,
    pub policy_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Read access to automated-reasoning policies on the control plane.
#[async_trait]
pub trait PolicyService: Send + Sync {
    async fn list_policies(&self) -> Result<Vec<PolicySummary>, TransportError>;

    async fn export_policy_version(&self, policy_arn: &str) -> Result<Value, TransportError>;
}

#[derive(Clone, Debug)]
pub struct BedrockControlClient {
    client: Client,
}

impl BedrockControlClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the SDK client from shared config, honoring an endpoint override.
    pub fn from_sdk_config(shared: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = config::Builder::from(shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl PolicyService for BedrockControlClient {
    async fn list_policies(&self) -> Result<Vec<PolicySummary>, TransportError> {
        let mut policies = Vec::new();
        let mut pages = self.client.list_automated_reasoning_policies().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|error| sdk_failure(LIST_POLICIES, error))?;
            let summaries = wire::policy_page(&page);
            debug!(
                event_name = "control.list_policies.page",
                count = summaries.len(),
                "received policy page"
            );
            policies.extend(summaries);
        }

        info!(event_name = "control.list_policies", count = policies.len(), "listed policies");
        Ok(policies)
    }

    async fn export_policy_version(&self, policy_arn: &str) -> Result<Value, TransportError> {
        info!(event_name = "control.export_policy", policy_arn, "exporting policy version");
        let output = self
            .client
            .export_automated_reasoning_policy_version()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|error| sdk_failure(EXPORT_POLICY, error))?;
        Ok(wire::policy_export(&output))
    }
}
