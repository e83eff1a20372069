//! Policy version export and CloudFormation template generation.

use std::fs;
use std::path::{Path, PathBuf};

use archeck_core::ApplicationError;
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::client::TransportError;
use crate::control::{PolicyService, PolicySummary};

pub const DRAFT_VERSION: &str = "DRAFT";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const POLICY_RESOURCE: &str = "automated-reasoning-policy";
const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
const RESOURCE_NAME: &str = "AutomatedReasoningPolicy";
const RESOURCE_TYPE: &str = "AWS::Bedrock::AutomatedReasoningPolicy";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(
        "invalid policy ARN `{0}` (expected arn:aws:bedrock:<region>:<account>:automated-reasoning-policy/<id>/<version>)"
    )]
    InvalidArn(String),
    #[error("a version is required when selecting a policy by id")]
    MissingVersion,
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not write `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("could not serialize JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not serialize YAML output: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<ExportError> for ApplicationError {
    fn from(error: ExportError) -> Self {
        match error {
            ExportError::InvalidArn(_) | ExportError::MissingVersion => {
                Self::InvalidInput(error.to_string())
            }
            ExportError::ResourceNotFound(what) => Self::ResourceNotFound(what),
            ExportError::Transport(transport) if transport.is_not_found() => {
                Self::ResourceNotFound(transport.to_string())
            }
            ExportError::Transport(transport) => Self::from(transport),
            ExportError::Io { .. } => Self::Io(error.to_string()),
            ExportError::Json(_) | ExportError::Yaml(_) => Self::Serialization(error.to_string()),
        }
    }
}

/// Parsed automated-reasoning policy ARN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyArn {
    pub partition: String,
    pub region: String,
    pub account: String,
    pub policy_id: String,
    pub version: Option<String>,
}

impl PolicyArn {
    /// Accepts `.../automated-reasoning-policy/{id}`, optionally followed by `/{version}` or `:{version}`.
    pub fn parse(arn: &str) -> Result<Self, ExportError> {
        let invalid = || ExportError::InvalidArn(arn.to_string());
        let parts: Vec<&str> = arn.trim().splitn(6, ':').collect();
        let [prefix, partition, service, region, account, resource] = parts.as_slice() else {
            return Err(invalid());
        };
        if *prefix != "arn" || *service != "bedrock" || region.is_empty() || account.is_empty() {
            return Err(invalid());
        }

        let remainder = resource
            .strip_prefix(POLICY_RESOURCE)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(invalid)?;
        let (policy_id, version) = match remainder.find(['/', ':']) {
            Some(index) => (&remainder[..index], Some(&remainder[index + 1..])),
            None => (remainder, None),
        };
        if policy_id.is_empty() || version.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            partition: (*partition).to_string(),
            region: (*region).to_string(),
            account: (*account).to_string(),
            policy_id: policy_id.to_string(),
            version: version.map(str::to_string),
        })
    }

    pub fn base_arn(&self) -> String {
        format!(
            "arn:{}:bedrock:{}:{}:{POLICY_RESOURCE}/{}",
            self.partition, self.region, self.account, self.policy_id
        )
    }

    /// The draft is addressed by the base ARN; numbered versions append `:{version}`.
    pub fn version_arn(&self, version: &str) -> String {
        if version == DRAFT_VERSION {
            self.base_arn()
        } else {
            format!("{}:{version}", self.base_arn())
        }
    }

    pub fn version_label(&self) -> &str {
        self.version.as_deref().unwrap_or(DRAFT_VERSION)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicySelection {
    Arn(String),
    IdVersion { policy_id: String, version: String },
    Listed(PolicySummary),
}

impl PolicySelection {
    pub fn from_flags(
        policy_arn: Option<String>,
        policy_id: Option<String>,
        version: Option<String>,
    ) -> Result<Option<Self>, ExportError> {
        match (policy_arn, policy_id, version) {
            (Some(arn), _, _) => Ok(Some(Self::Arn(arn))),
            (None, Some(policy_id), Some(version)) => {
                Ok(Some(Self::IdVersion { policy_id, version }))
            }
            (None, Some(_), None) => Err(ExportError::MissingVersion),
            (None, None, _) => Ok(None),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub policy_arn: String,
    pub policy_id: String,
    pub version: String,
    pub name: Option<String>,
}

pub async fn resolve_selection(
    service: &dyn PolicyService,
    selection: PolicySelection,
) -> Result<ResolvedPolicy, ExportError> {
    match selection {
        PolicySelection::Arn(arn) => {
            let parsed = PolicyArn::parse(&arn)?;
            let version = parsed.version_label().to_string();
            Ok(ResolvedPolicy {
                policy_arn: parsed.version_arn(&version),
                policy_id: parsed.policy_id,
                version,
                name: None,
            })
        }
        PolicySelection::IdVersion { policy_id, version } => {
            let policies = service.list_policies().await?;
            let summary = policies
                .into_iter()
                .find(|summary| summary.policy_id == policy_id)
                .ok_or_else(|| ExportError::ResourceNotFound(format!("policy `{policy_id}`")))?;
            let parsed = PolicyArn::parse(&summary.policy_arn)?;
            Ok(ResolvedPolicy {
                policy_arn: parsed.version_arn(&version),
                policy_id,
                version,
                name: summary.name,
            })
        }
        PolicySelection::Listed(summary) => {
            let parsed = PolicyArn::parse(&summary.policy_arn)?;
            let version = summary.version.unwrap_or_else(|| DRAFT_VERSION.to_string());
            Ok(ResolvedPolicy {
                policy_arn: parsed.version_arn(&version),
                policy_id: summary.policy_id,
                version,
                name: summary.name,
            })
        }
    }
}

pub async fn fetch_export(
    service: &dyn PolicyService,
    policy: &ResolvedPolicy,
) -> Result<Value, ExportError> {
    service.export_policy_version(&policy.policy_arn).await.map_err(|error| {
        if error.is_not_found() {
            ExportError::ResourceNotFound(format!(
                "policy `{}` version `{}`",
                policy.policy_id, policy.version
            ))
        } else {
            ExportError::Transport(error)
        }
    })
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    pub policy_name: Option<String>,
    pub include_tags: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CfnTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: &'static str,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Resources")]
    pub resources: CfnResources,
    #[serde(rename = "Outputs")]
    pub outputs: CfnOutputs,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CfnResources {
    #[serde(rename = "AutomatedReasoningPolicy")]
    pub policy: CfnPolicyResource,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnPolicyResource {
    pub r#type: &'static str,
    pub properties: CfnPolicyProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnPolicyProperties {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_definition: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<CfnTag>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnTag {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnOutputs {
    pub policy_id: CfnOutput,
    pub policy_arn: CfnOutput,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnOutput {
    pub description: &'static str,
    pub value: GetAtt,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GetAtt {
    #[serde(rename = "Fn::GetAtt")]
    pub target: [&'static str; 2],
}

impl GetAtt {
    fn policy(attribute: &'static str) -> Self {
        Self { target: [RESOURCE_NAME, attribute] }
    }
}

/// Name precedence: explicit option, then the listed policy name, then a name derived from the id.
pub fn template_name(options: &TemplateOptions, policy: &ResolvedPolicy) -> String {
    options
        .policy_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| policy.name.clone().filter(|name| !name.trim().is_empty()))
        .unwrap_or_else(|| format!("{RESOURCE_NAME}{}", policy.policy_id))
}

pub fn build_template(export: &Value, name: &str, include_tags: bool) -> CfnTemplate {
    let policy_definition = export
        .get("policyDefinition")
        .filter(|definition| match definition {
            Value::Object(map) => !map.is_empty(),
            Value::Null => false,
            _ => true,
        })
        .cloned();
    let description = export.get("description").and_then(Value::as_str).map(str::to_string);
    let tags = if include_tags { export_tags(export) } else { Vec::new() };

    CfnTemplate {
        format_version: TEMPLATE_FORMAT_VERSION,
        description: format!("CloudFormation template for Automated Reasoning Policy: {name}"),
        resources: CfnResources {
            policy: CfnPolicyResource {
                r#type: RESOURCE_TYPE,
                properties: CfnPolicyProperties {
                    name: name.to_string(),
                    policy_definition,
                    description,
                    tags,
                },
            },
        },
        outputs: CfnOutputs {
            policy_id: CfnOutput {
                description: "The ID of the created Automated Reasoning Policy",
                value: GetAtt::policy("PolicyId"),
            },
            policy_arn: CfnOutput {
                description: "The ARN of the created Automated Reasoning Policy",
                value: GetAtt::policy("PolicyArn"),
            },
        },
    }
}

fn export_tags(export: &Value) -> Vec<CfnTag> {
    export
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| {
                    let key = tag.get("key").and_then(Value::as_str)?;
                    let value = tag.get("value").and_then(Value::as_str).unwrap_or_default();
                    Some(CfnTag { key: key.to_string(), value: value.to_string() })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn export_timestamp<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Paths of the three files written by one export run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportArtifacts {
    pub policy_json: PathBuf,
    pub template_json: PathBuf,
    pub template_yaml: PathBuf,
}

impl ExportArtifacts {
    pub fn new(output_dir: &Path, policy_id: &str, version: &str, timestamp: &str) -> Self {
        let stem = format!("policy_{policy_id}_v{version}_{timestamp}");
        Self {
            policy_json: output_dir.join(format!("{stem}.json")),
            template_json: output_dir.join(format!("{stem}_cfn.json")),
            template_yaml: output_dir.join(format!("{stem}_cfn.yaml")),
        }
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.policy_json, &self.template_json, &self.template_yaml]
    }
}

pub fn write_artifacts(
    artifacts: &ExportArtifacts,
    export: &Value,
    template: &CfnTemplate,
) -> Result<(), ExportError> {
    if let Some(dir) = artifacts.policy_json.parent() {
        fs::create_dir_all(dir)
            .map_err(|source| ExportError::Io { path: dir.to_path_buf(), source })?;
    }

    write_file(&artifacts.policy_json, &serde_json::to_string_pretty(export)?)?;
    write_file(&artifacts.template_json, &serde_json::to_string_pretty(template)?)?;
    write_file(&artifacts.template_yaml, &serde_yaml::to_string(template)?)?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    let mut contents = contents.to_string();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    fs::write(path, contents).map_err(|source| ExportError::Io { path: path.to_path_buf(), source })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportRequest {
    pub output_dir: PathBuf,
    pub template: TemplateOptions,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportOutcome {
    pub policy_arn: String,
    pub policy_id: String,
    pub version: String,
    pub template_name: String,
    pub artifacts: ExportArtifacts,
}

/// Resolves the selection, downloads the policy version and writes its three artifacts.
pub async fn export_policy(
    service: &dyn PolicyService,
    selection: PolicySelection,
    request: &ExportRequest,
) -> Result<ExportOutcome, ExportError> {
    let policy = resolve_selection(service, selection).await?;
    let export = fetch_export(service, &policy).await?;

    let name = template_name(&request.template, &policy);
    let template = build_template(&export, &name, request.template.include_tags);
    let artifacts =
        ExportArtifacts::new(&request.output_dir, &policy.policy_id, &policy.version, &request.timestamp);
    write_artifacts(&artifacts, &export, &template)?;

    info!(
        event_name = "export.completed",
        policy_id = %policy.policy_id,
        version = %policy.version,
        output_dir = %request.output_dir.display(),
        "policy exported"
    );

    Ok(ExportOutcome {
        policy_arn: policy.policy_arn,
        policy_id: policy.policy_id,
        version: policy.version,
        template_name: name,
        artifacts,
    })
}

/// Numbered table of policies for interactive selection.
pub fn format_policy_table(policies: &[PolicySummary]) -> String {
    let mut table = format!(
        "{:<4} {:<20} {:<30} {:<10} {:<20} {:<20}\n",
        "#", "Policy ID", "Name", "Version", "Created", "Updated"
    );
    table.push_str(&"-".repeat(108));
    table.push('\n');
    for (index, policy) in policies.iter().enumerate() {
        table.push_str(&format!(
            "{:<4} {:<20} {:<30} {:<10} {:<20} {:<20}\n",
            index + 1,
            truncate(&policy.policy_id, 20),
            truncate(policy.name.as_deref().unwrap_or("N/A"), 30),
            policy.version.as_deref().unwrap_or("N/A"),
            truncate(policy.created_at.as_deref().unwrap_or("N/A"), 20),
            truncate(policy.updated_at.as_deref().unwrap_or("N/A"), 20),
        ));
    }
    table
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionInput {
    Cancel,
    Choice(usize),
    Invalid(String),
}

/// Interprets one line typed at the selection prompt; choices are 1-based.
pub fn parse_selection(input: &str, count: usize) -> SelectionInput {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return SelectionInput::Cancel;
    }
    match input.parse::<usize>() {
        Ok(choice) if (1..=count).contains(&choice) => SelectionInput::Choice(choice - 1),
        Ok(_) => SelectionInput::Invalid(format!("please enter a number between 1 and {count}")),
        Err(_) => SelectionInput::Invalid("please enter a valid number or 'q'".to_string()),
    }
}
