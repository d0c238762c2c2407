//! Environment file generation
//!
//! Builds the complete runtime environment of an app from the platform base
//! environment, the app definition and the submitted form. Generated secrets
//! are derived from a per-install seed and reused when already present, so
//! regenerating with an unchanged form always yields the same file.

use std::path::Path;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::env::map::EnvMap;
use crate::errors::{HarborError, ValidationError};
use crate::models::app::AppForm;
use crate::models::definition::{AppInfo, FieldType, SecretEncoding};
use crate::storage::layout::StorageLayout;
use crate::utils::hex;

const DEFAULT_SECRET_LENGTH: usize = 32;

/// Network identity of the host, used for non-exposed app URLs
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub internal_ip: String,
    pub local_domain: String,
}

/// Everything the environment of one app is computed from
pub struct EnvInputs<'a> {
    pub app_id: &'a str,
    pub info: &'a AppInfo,
    pub form: &'a AppForm,
    pub base: &'a EnvMap,
    pub existing: Option<&'a EnvMap>,
    pub seed: &'a str,
    pub network: &'a NetworkSettings,
    pub root_folder: &'a Path,
    pub data_dir: &'a Path,
}

/// Build the environment map of an app
pub fn build_env(inputs: EnvInputs<'_>) -> Result<EnvMap, HarborError> {
    let EnvInputs {
        app_id,
        info,
        form,
        base,
        existing,
        seed,
        network,
        root_folder,
        data_dir,
    } = inputs;

    let mut env = base.clone();
    env.set("APP_PORT", info.port.to_string());
    env.set("APP_ID", app_id);
    env.set("ROOT_FOLDER_HOST", root_folder.display().to_string());
    env.set("APP_DATA_DIR", data_dir.display().to_string());

    for field in &info.form_fields {
        let key = field.env_variable.as_str();

        if let Some(value) = form.value_string(key) {
            env.set(key, value);
        } else if field.field_type == FieldType::Random {
            match existing.and_then(|e| e.get(key)) {
                Some(previous) => env.set(key, previous),
                None => {
                    let length = field.min.unwrap_or(DEFAULT_SECRET_LENGTH);
                    env.set(key, derive_entropy(seed, key, length, field.encoding));
                }
            }
        } else if let Some(default) = field.default.as_ref().and_then(json_to_env) {
            env.set(key, default);
        } else if field.required {
            return Err(ValidationError::MissingRequiredField(key.to_string()).into());
        }
    }

    match (form.exposed, form.domain()) {
        (true, Some(domain)) => {
            env.set("APP_EXPOSED", "true");
            env.set("APP_DOMAIN", domain);
            env.set("APP_HOST", domain);
            env.set("APP_PROTOCOL", "https");
        }
        _ if form.exposed_local && !form.open_port => {
            let host = format!("{}.{}", app_id, network.local_domain);
            env.set("APP_EXPOSED", "false");
            env.set("APP_DOMAIN", host.as_str());
            env.set("APP_HOST", host);
            env.set("APP_PROTOCOL", "https");
        }
        _ => {
            env.set("APP_EXPOSED", "false");
            env.set("APP_DOMAIN", format!("{}:{}", network.internal_ip, info.port));
            env.set("APP_HOST", network.internal_ip.as_str());
            env.set("APP_PROTOCOL", "http");
        }
    }
    env.set("LOCAL_DOMAIN", network.local_domain.as_str());

    // a line break would smuggle extra assignments into the env file
    if let Some((key, _)) = env.iter().find(|(_, value)| value.contains(['\n', '\r'])) {
        return Err(ValidationError::InvalidFieldValue {
            field: key.to_string(),
            reason: "must be a single line".to_string(),
        }
        .into());
    }

    Ok(env)
}

/// Derive a stable secret of `length` characters from the install seed and a field name
pub fn derive_entropy(seed: &str, name: &str, length: usize, encoding: SecretEncoding) -> String {
    let mut out = String::with_capacity(length + 64);
    let mut round: u32 = 0;

    while out.len() < length {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(seed.as_bytes());
        if round > 0 {
            hasher.update(round.to_be_bytes());
        }
        let digest = hasher.finalize();

        match encoding {
            SecretEncoding::Hex => out.push_str(&hex::encode(digest)),
            SecretEncoding::Base64 => out.push_str(&STANDARD_NO_PAD.encode(digest)),
        }
        round += 1;
    }

    out.truncate(length);
    out
}

fn json_to_env(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Generates and persists app environment files
pub struct EnvGenerator {
    layout: StorageLayout,
    network: NetworkSettings,
}

impl EnvGenerator {
    pub fn new(layout: StorageLayout, network: NetworkSettings) -> Self {
        Self { layout, network }
    }

    /// Per-install seed, created on first use
    pub async fn seed(&self) -> Result<String, HarborError> {
        let file = self.layout.seed_file();
        if let Some(seed) = file.read_string_opt().await? {
            let seed = seed.trim().to_string();
            if !seed.is_empty() {
                return Ok(seed);
            }
        }

        let seed = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        file.write_atomic(seed.as_bytes()).await?;
        info!("Generated new install seed at {}", file.path().display());
        Ok(seed)
    }

    pub async fn has_env_file(&self, app_id: &str) -> bool {
        self.layout.app_env_file(app_id).exists().await
    }

    /// Regenerate the environment file of an app, overwriting it atomically
    pub async fn generate(
        &self,
        app_id: &str,
        info: &AppInfo,
        form: &AppForm,
    ) -> Result<EnvMap, HarborError> {
        let base = match self.layout.base_env_file().read_string_opt().await? {
            Some(text) => EnvMap::parse(&text),
            None => EnvMap::new(),
        };

        let env_file = self.layout.app_env_file(app_id);
        let existing = env_file
            .read_string_opt()
            .await?
            .map(|text| EnvMap::parse(&text));

        let seed = self.seed().await?;
        let data_dir = self.layout.app_data_dir(app_id);

        let env = build_env(EnvInputs {
            app_id,
            info,
            form,
            base: &base,
            existing: existing.as_ref(),
            seed: &seed,
            network: &self.network,
            root_folder: &self.layout.base_dir,
            data_dir: data_dir.path(),
        })?;

        env_file.write_atomic(env.to_env_string().as_bytes()).await?;
        debug!("Wrote {} variables to {}", env.len(), env_file.path().display());
        Ok(env)
    }
}
