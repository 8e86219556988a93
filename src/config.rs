//! Service configuration
//!
//! Defaults, overridden by `INJ_POINTS_*` environment variables, overridden
//! in turn by CLI flags in the binary.

use crate::error::PointsError;
use crate::store::MAX_DOCUMENT_BYTES;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const ENV_BIND: &str = "INJ_POINTS_BIND";
pub const ENV_DATA_DIR: &str = "INJ_POINTS_DATA_DIR";
pub const ENV_PUBLIC_URL: &str = "INJ_POINTS_PUBLIC_URL";
pub const ENV_MAX_BODY_BYTES: &str = "INJ_POINTS_MAX_BODY_BYTES";
pub const ENV_EPHEMERAL: &str = "INJ_POINTS_EPHEMERAL";

/// Runtime configuration for the HTTP service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Socket address to listen on
    pub bind: SocketAddr,
    /// Root directory of the filesystem document store
    pub data_dir: PathBuf,
    /// Base URL reported for written documents
    pub public_base_url: Option<String>,
    /// Request body ceiling in bytes
    pub max_body_bytes: usize,
    /// Keep documents in memory only
    pub ephemeral: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            data_dir: PathBuf::from("data"),
            public_base_url: None,
            max_body_bytes: MAX_DOCUMENT_BYTES,
            ephemeral: false,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, PointsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults overridden by an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PointsError> {
        let mut config = Self::default();

        if let Some(bind) = lookup(ENV_BIND) {
            config.bind = bind
                .trim()
                .parse()
                .map_err(|e| PointsError::Config(format!("{ENV_BIND}={bind}: {e}")))?;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(url) = lookup(ENV_PUBLIC_URL).filter(|u| !u.trim().is_empty()) {
            config.public_base_url = Some(url.trim().to_string());
        }
        if let Some(limit) = lookup(ENV_MAX_BODY_BYTES) {
            config.max_body_bytes = limit.trim().parse().map_err(|e| {
                PointsError::Config(format!("{ENV_MAX_BODY_BYTES}={limit}: {e}"))
            })?;
        }
        if let Some(flag) = lookup(ENV_EPHEMERAL) {
            config.ephemeral = parse_flag(&flag);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), PointsError> {
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_DOCUMENT_BYTES {
            return Err(PointsError::Config(format!(
                "max_body_bytes must be between 1 and {MAX_DOCUMENT_BYTES}"
            )));
        }
        if let Some(url) = &self.public_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(PointsError::Config(format!(
                    "public_base_url must be an http(s) URL, got {url}"
                )));
            }
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.max_body_bytes, 220_000);
    }

    #[test]
    fn test_env_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_DATA_DIR, "/var/lib/inj-points"),
            (ENV_PUBLIC_URL, "https://blobs.example.com"),
            (ENV_MAX_BODY_BYTES, "1000"),
            (ENV_EPHEMERAL, "yes"),
        ]))
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/inj-points"));
        assert_eq!(config.public_base_url.as_deref(), Some("https://blobs.example.com"));
        assert_eq!(config.max_body_bytes, 1000);
        assert!(config.ephemeral);
    }

    #[test]
    fn test_invalid_values() {
        assert!(ServiceConfig::from_lookup(lookup(&[(ENV_BIND, "nowhere")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[(ENV_MAX_BODY_BYTES, "-1")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[(ENV_MAX_BODY_BYTES, "999999")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[(ENV_PUBLIC_URL, "ftp://x")])).is_err());
    }
}
