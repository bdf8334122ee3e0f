//! Blueprint domain types
//!
//! A blueprint is the declarative description of one workflow run: which
//! module to scaffold, where to publish it, and where to provision it.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Expected value of the `kind` field
pub const BLUEPRINT_KIND: &str = "Blueprint";

/// Root of a workflow description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: Spec,
}

/// Project-level metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// The parts of a blueprint the stages act on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spec {
    pub scm: ScmConfig,
    pub cloud: CloudConfig,
    pub scaffold: ScaffoldConfig,
    /// Written verbatim to `terraform.tfvars.json`
    #[serde(default)]
    pub variables: BTreeMap<String, JsonValue>,
}

/// Source control settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScmConfig {
    pub provider: String,
    pub url: String,
    /// Falls back to `GITLAB_PRIVATE_TOKEN` when empty
    #[serde(default)]
    pub token: String,
    pub project: ProjectConfig,
}

/// Repository to create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
}

impl ProjectConfig {
    /// Full `namespace/name` path of the project
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Repository visibility level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Internal,
    Public,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Visibility::Private => "private",
            Visibility::Internal => "internal",
            Visibility::Public => "public",
        };
        f.write_str(s)
    }
}

/// Cloud target for provisioning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    pub provider: String,
    pub region: String,
}

/// Where the infrastructure module comes from and goes to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
}
