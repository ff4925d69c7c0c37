//! Authorization rules and the authorization parameter
//!
//! Rules are declared on entities and fields of the type graph and compiled
//! into Cypher predicates by the translation engine. At request time the
//! [`AuthParamDeriver`] turns the caller's raw credentials into an
//! [`AuthParam`], the claim map those predicates reference as `$auth`.
//!
//! - No credentials: the unauthenticated (empty) parameter, not an error
//! - Credentials that verify: their claims
//! - Credentials that fail verification: [`GraphError::Unauthorized`]

use crate::config::AuthConfig;
use crate::core::context::ExecutionContext;
use crate::core::error::{GraphError, GraphResult};
use crate::core::schema::Operation;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

/// A declarative access predicate over the caller's claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AuthPredicate {
    /// The node's `field` must equal the claim at `claim` (dotted path)
    Equals { field: String, claim: String },

    /// The caller's `roles` claim must contain at least one of `roles`
    AnyRole { roles: Vec<String> },

    /// The caller must carry a `sub` claim
    Authenticated,
}

/// An authorization rule, optionally narrowed to some operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRule {
    /// Operations the rule applies to; empty means all of them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,

    #[serde(flatten)]
    pub predicate: AuthPredicate,
}

impl AuthRule {
    pub fn new(predicate: AuthPredicate) -> Self {
        Self {
            operations: Vec::new(),
            predicate,
        }
    }

    /// "claim `claim` must equal field `field`"
    pub fn equals(field: impl Into<String>, claim: impl Into<String>) -> Self {
        Self::new(AuthPredicate::Equals {
            field: field.into(),
            claim: claim.into(),
        })
    }

    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AuthPredicate::AnyRole {
            roles: roles.into_iter().map(Into::into).collect(),
        })
    }

    pub fn authenticated() -> Self {
        Self::new(AuthPredicate::Authenticated)
    }

    /// Narrow the rule to the given operations
    pub fn on(mut self, operations: &[Operation]) -> Self {
        self.operations = operations.to_vec();
        self
    }

    pub fn applies_to(&self, operation: Operation) -> bool {
        self.operations.is_empty() || self.operations.contains(&operation)
    }
}

/// The verified, flattened claim map referenced as `$auth` in compiled queries
///
/// Never absent: callers without credentials get [`AuthParam::unauthenticated`],
/// an empty map, so every `$auth.<claim>` lookup evaluates to `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthParam(Map<String, Value>);

impl AuthParam {
    pub fn unauthenticated() -> Self {
        Self(Map::new())
    }

    pub fn from_claims(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn is_authenticated(&self) -> bool {
        !self.0.is_empty()
    }

    /// Look a claim up by dotted path (`"org.id"`)
    pub fn claim(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = self.0.get(segments.next()?)?;
        segments.try_fold(first, |value, segment| value.get(segment))
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Verifies a raw credential and returns its claims
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Map<String, Value>>;
}

/// JSON Web Token verifier backed by `jsonwebtoken`
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build a verifier from explicit configuration
    ///
    /// HMAC algorithms need `secret`; RSA, EC and EdDSA algorithms need
    /// `public_key_pem`. `exp` is checked when present but not required.
    pub fn new(config: &AuthConfig) -> GraphResult<Self> {
        let algorithm = Algorithm::from_str(&config.algorithm).map_err(|e| {
            GraphError::Config(format!("unknown algorithm '{}': {}", config.algorithm, e))
        })?;

        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config.secret.as_deref().ok_or_else(|| {
                    GraphError::Config(format!("{} requires a secret", config.algorithm))
                })?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            Algorithm::ES256 | Algorithm::ES384 => {
                let pem = require_pem(config)?;
                DecodingKey::from_ec_pem(pem.as_bytes())
                    .map_err(|e| GraphError::Config(format!("invalid EC public key: {}", e)))?
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => {
                let pem = require_pem(config)?;
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| GraphError::Config(format!("invalid RSA public key: {}", e)))?
            }
            Algorithm::EdDSA => {
                let pem = require_pem(config)?;
                DecodingKey::from_ed_pem(pem.as_bytes())
                    .map_err(|e| GraphError::Config(format!("invalid EdDSA public key: {}", e)))?
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        validation.validate_exp = config.validate_exp;
        validation.leeway = config.leeway_seconds;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }
        if config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&config.audience);
        }

        Ok(Self { key, validation })
    }
}

fn require_pem(config: &AuthConfig) -> GraphResult<&str> {
    config.public_key_pem.as_deref().ok_or_else(|| {
        GraphError::Config(format!("{} requires public_key_pem", config.algorithm))
    })
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Map<String, Value>> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(|e| anyhow!("{}", e))?;
        Ok(data.claims)
    }
}

/// Derives the authorization parameter from an execution context
#[derive(Clone, Default)]
pub struct AuthParamDeriver {
    verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl AuthParamDeriver {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
        }
    }

    /// A deriver that has no key material: any supplied credential is rejected
    pub fn without_verifier() -> Self {
        Self { verifier: None }
    }

    pub fn from_config(config: &AuthConfig) -> GraphResult<Self> {
        Ok(Self::new(Arc::new(JwtVerifier::new(config)?)))
    }

    pub async fn derive(&self, ctx: &ExecutionContext) -> GraphResult<AuthParam> {
        let Some(raw) = ctx.credentials() else {
            return Ok(AuthParam::unauthenticated());
        };
        let token = bearer_token(raw);
        if token.is_empty() {
            return Ok(AuthParam::unauthenticated());
        }

        let verifier = self.verifier.as_ref().ok_or_else(|| GraphError::Unauthorized {
            reason: "no verification key configured".to_string(),
        })?;

        match verifier.verify(token).await {
            Ok(claims) => Ok(AuthParam::from_claims(claims)),
            Err(e) => {
                tracing::warn!("rejected credentials: {}", e);
                Err(GraphError::Unauthorized {
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Strip an optional (case-insensitive) `Bearer ` scheme
fn bearer_token(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.get(..6) {
        Some(scheme)
            if scheme.eq_ignore_ascii_case("bearer")
                && raw[6..].chars().next().is_none_or(char::is_whitespace) =>
        {
            raw[6..].trim()
        }
        _ => raw,
    }
}
