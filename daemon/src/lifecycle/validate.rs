//! Synchronous preconditions checked before any status change

use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::errors::ValidationError;
use crate::models::app::{App, AppForm};
use crate::models::definition::{AppInfo, FieldType, FormField};

/// Installed apps allowed in demo mode
pub const DEMO_APP_LIMIT: usize = 6;

fn domain_regex() -> &'static Regex {
    static DOMAIN: OnceLock<Regex> = OnceLock::new();
    DOMAIN.get_or_init(|| {
        Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9][a-z0-9-]{0,61}[a-z0-9]$")
            .unwrap_or_else(|e| panic!("invalid domain regex: {e}"))
    })
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|e| panic!("invalid email regex: {e}"))
    })
}

fn url_regex() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| {
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap_or_else(|e| panic!("invalid url regex: {e}"))
    })
}

/// Lowercase fully qualified domain name
pub fn is_valid_domain(domain: &str) -> bool {
    domain.len() <= 253 && domain_regex().is_match(domain)
}

/// `major.minor.patch`, with an optional `v` prefix and ignored pre-release suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlatformVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl PlatformVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let core = raw.trim().trim_start_matches('v');
        let core = core.split(['-', '+']).next()?;

        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(part) => part.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(part) => part.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self { major, minor, patch })
    }
}

/// Platform identity the app definition is checked against
#[derive(Debug, Clone)]
pub struct Platform<'a> {
    pub version: &'a str,
    pub architecture: &'a str,
}

/// Minimum platform version and architecture support
pub fn check_platform(app_id: &str, info: &AppInfo, platform: &Platform<'_>) -> Result<(), ValidationError> {
    if let Some(required) = info.min_platform_version.as_deref() {
        match (PlatformVersion::parse(required), PlatformVersion::parse(platform.version)) {
            (Some(min), Some(current)) if current < min => {
                return Err(ValidationError::VersionTooLow {
                    app_id: app_id.to_string(),
                    required: required.to_string(),
                    current: platform.version.to_string(),
                });
            }
            (Some(_), Some(_)) => {}
            _ => warn!(
                "Cannot compare platform version {} with {} required by {}",
                platform.version, required, app_id
            ),
        }
    }

    if !info.supported_architectures.is_empty()
        && !info
            .supported_architectures
            .iter()
            .any(|arch| arch.eq_ignore_ascii_case(platform.architecture))
    {
        return Err(ValidationError::ArchitectureNotSupported {
            app_id: app_id.to_string(),
            arch: platform.architecture.to_string(),
        });
    }

    Ok(())
}

/// Exposure rules; `apps` are the other records used for the domain-uniqueness check
pub fn check_exposure(
    app_id: &str,
    info: &AppInfo,
    form: &AppForm,
    apps: &[App],
) -> Result<(), ValidationError> {
    if form.exposed {
        let Some(domain) = form.domain() else {
            return Err(ValidationError::DomainRequired(app_id.to_string()));
        };
        if !is_valid_domain(domain) {
            return Err(ValidationError::InvalidDomain(domain.to_string()));
        }
        if !info.exposable {
            return Err(ValidationError::NotExposable(app_id.to_string()));
        }
        if let Some(other) = apps.iter().find(|app| {
            app.id != app_id && app.is_present() && app.exposed && app.domain.as_deref() == Some(domain)
        }) {
            return Err(ValidationError::DomainInUse {
                domain: domain.to_string(),
                other: other.id.clone(),
            });
        }
    } else if info.force_expose {
        return Err(ValidationError::ForceExposeRequired(app_id.to_string()));
    }

    Ok(())
}

/// Demo installations cap the number of installed apps
pub fn check_demo_limit(demo_mode: bool, apps: &[App]) -> Result<(), ValidationError> {
    if demo_mode && apps.iter().filter(|app| app.is_present()).count() >= DEMO_APP_LIMIT {
        return Err(ValidationError::DemoLimitReached(DEMO_APP_LIMIT));
    }
    Ok(())
}

/// Required fields are present and typed values parse
pub fn check_form(info: &AppInfo, form: &AppForm) -> Result<(), ValidationError> {
    for field in &info.form_fields {
        let key = field.env_variable.as_str();
        match form.value_string(key) {
            Some(value) => check_field_value(field, &value)?,
            None if field.required && field.field_type != FieldType::Random && field.default.is_none() => {
                return Err(ValidationError::MissingRequiredField(key.to_string()));
            }
            None => {}
        }
    }
    Ok(())
}

fn check_field_value(field: &FormField, value: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFieldValue {
        field: field.env_variable.clone(),
        reason: reason.to_string(),
    };

    if value.contains(['\n', '\r']) {
        return Err(invalid("must be a single line"));
    }

    let length = value.chars().count();
    if field.min.is_some_and(|min| length < min) {
        return Err(invalid("too short"));
    }
    if field.max.is_some_and(|max| length > max) {
        return Err(invalid("too long"));
    }

    let ok = match field.field_type {
        FieldType::Text | FieldType::Password | FieldType::Random => true,
        FieldType::Number => value.parse::<f64>().is_ok(),
        FieldType::Boolean => matches!(value, "true" | "false"),
        FieldType::Email => email_regex().is_match(value),
        FieldType::Fqdn => is_valid_domain(value),
        FieldType::Ip => value.parse::<IpAddr>().is_ok(),
        FieldType::Fqdnip => is_valid_domain(value) || value.parse::<IpAddr>().is_ok(),
        FieldType::Url => url_regex().is_match(value),
    };

    if ok {
        Ok(())
    } else {
        Err(invalid(&format!("not a valid {:?}", field.field_type).to_lowercase()))
    }
}
