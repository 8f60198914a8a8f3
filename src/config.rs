use serde::Deserialize;

use crate::core::{ProxyError, Result};

/// Settings shared by every proxy accessor of a registry.
///
/// Can be built in code or loaded from JSON:
///
/// ```
/// use shapeproxy::ProxyConfig;
///
/// let config = ProxyConfig::from_json(r#"{ "shape_suffix": "View", "max_concurrent_hooks": 4 }"#).unwrap();
/// assert_eq!(config.shape_suffix, "View");
/// assert_eq!(config.member_prefix, "$");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Infix of generated shape names: `{Entity}{suffix}{n}`
    pub shape_suffix: String,

    /// Prefix of synthetic dependency members
    pub member_prefix: String,

    /// Reject field names that are not valid GraphQL names
    pub validate_field_names: bool,

    /// Maximum hook actions in flight per executor
    pub max_concurrent_hooks: usize,
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self {
            shape_suffix: "Proxy".to_string(),
            member_prefix: "$".to_string(),
            validate_field_names: true,
            max_concurrent_hooks: 16,
        }
    }

    pub fn shape_suffix(mut self, suffix: &str) -> Self {
        self.shape_suffix = suffix.to_string();
        self
    }

    pub fn member_prefix(mut self, prefix: &str) -> Self {
        self.member_prefix = prefix.to_string();
        self
    }

    pub fn validate_field_names(mut self, validate: bool) -> Self {
        self.validate_field_names = validate;
        self
    }

    pub fn max_concurrent_hooks(mut self, max: usize) -> Self {
        self.max_concurrent_hooks = max;
        self
    }

    /// Parse and validate a JSON document. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| ProxyError::invalid_configuration("ProxyConfig", err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shape_suffix.is_empty() {
            return Err(ProxyError::invalid_configuration(
                "ProxyConfig",
                "shape_suffix must not be empty",
            ));
        }
        // Synthetic names must never collide with declared GraphQL field names
        if self.member_prefix.is_empty()
            || self
                .member_prefix
                .chars()
                .all(|c| c == '_' || c.is_ascii_alphanumeric())
        {
            return Err(ProxyError::invalid_configuration(
                "ProxyConfig",
                format!(
                    "member_prefix '{}' must contain a character outside [_0-9A-Za-z]",
                    self.member_prefix
                ),
            ));
        }
        if self.max_concurrent_hooks == 0 {
            return Err(ProxyError::invalid_configuration(
                "ProxyConfig",
                "max_concurrent_hooks must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new()
    }
}
