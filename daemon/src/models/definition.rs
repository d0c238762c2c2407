//! App definitions as shipped by a catalog repository

use serde::{Deserialize, Serialize};

/// Contents of an app's `config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Default host port of the app's web UI
    pub port: u16,

    /// Whether the app may be exposed on a public domain
    #[serde(default)]
    pub exposable: bool,

    /// The app only works when exposed
    #[serde(default)]
    pub force_expose: bool,

    /// Monotonic definition revision, persisted as the installed version
    #[serde(default = "default_revision")]
    pub revision: u32,

    /// Upstream version string, informational
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub form_fields: Vec<FormField>,

    /// Empty means every architecture
    #[serde(default)]
    pub supported_architectures: Vec<String>,

    #[serde(default)]
    pub min_platform_version: Option<String>,

    /// Template rendered against the form into `docker-compose.yml`
    #[serde(default)]
    pub compose_template: Option<String>,
}

fn default_revision() -> u32 {
    1
}

/// Type of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Password,
    Email,
    Number,
    Fqdn,
    Ip,
    Fqdnip,
    Url,
    Random,
    Boolean,
}

/// Encoding of generated random values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEncoding {
    #[default]
    Hex,
    Base64,
}

/// A configurable field declared by an app definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub label: String,

    pub env_variable: String,

    #[serde(default)]
    pub required: bool,

    /// Minimum length; for `random` fields the generated length
    #[serde(default)]
    pub min: Option<usize>,

    #[serde(default)]
    pub max: Option<usize>,

    #[serde(default)]
    pub default: Option<serde_json::Value>,

    #[serde(default)]
    pub encoding: SecretEncoding,
}
