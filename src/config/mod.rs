//! Configuration loading and management

use crate::core::error::GraphResult;
use crate::core::schema::{Entity, TypeGraph};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Key material and validation options for credential verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JWT algorithm (e.g. "HS256", "RS256", "ES256")
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Shared secret for HMAC algorithms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// PEM-encoded public key for RSA / EC algorithms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,

    /// Required `iss` claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Accepted `aud` values; empty disables the audience check
    #[serde(default)]
    pub audience: Vec<String>,

    /// Clock skew tolerated when checking `exp`
    #[serde(default)]
    pub leeway_seconds: u64,

    /// Reject tokens whose `exp` is in the past (tokens without `exp` are accepted)
    #[serde(default = "default_validate_exp")]
    pub validate_exp: bool,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_validate_exp() -> bool {
    true
}

impl AuthConfig {
    /// HS256 configuration with the given shared secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            algorithm: default_algorithm(),
            secret: Some(secret.into()),
            public_key_pem: None,
            issuer: None,
            audience: Vec::new(),
            leeway_seconds: 0,
            validate_exp: true,
        }
    }
}

/// Complete configuration: the type graph and how to verify credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Credential verification; without it any supplied credential is rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    /// Entities of the type graph
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl GraphConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Build and validate the type graph described by this configuration
    pub fn type_graph(&self) -> GraphResult<TypeGraph> {
        TypeGraph::new(self.entities.clone())
    }

    /// Merge several configurations
    ///
    /// Entities are keyed by name and a later declaration replaces an earlier
    /// one in place; the last `auth` section present wins.
    pub fn merge(configs: Vec<GraphConfig>) -> Self {
        let mut merged = GraphConfig::default();

        for config in configs {
            if config.auth.is_some() {
                merged.auth = config.auth;
            }
            for entity in config.entities {
                match merged.entities.iter_mut().find(|e| e.name == entity.name) {
                    Some(existing) => *existing = entity,
                    None => merged.entities.push(entity),
                }
            }
        }

        merged
    }
}
