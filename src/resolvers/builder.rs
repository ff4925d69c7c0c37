//! GraphBuilder for a fluent API to build handler registries

use super::compose::compose;
use super::generated::generate;
use super::registry::{HandlerRegistry, ResolverMap};
use super::wrap::wrap;
use crate::config::{AuthConfig, GraphConfig};
use crate::core::auth::{AuthParamDeriver, CredentialVerifier};
use crate::core::error::{GraphError, GraphResult};
use crate::core::schema::TypeGraph;
use std::sync::Arc;

/// Builder generating, composing and wrapping handlers in one step
///
/// # Example
///
/// ```ignore
/// let registry = GraphBuilder::new()
///     .with_config(GraphConfig::from_yaml_file("graph.yaml")?)
///     .with_resolvers(custom)
///     .build()?;
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    type_graph: Option<Arc<TypeGraph>>,
    configs: Vec<GraphConfig>,
    auth_config: Option<AuthConfig>,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    resolvers: ResolverMap,
}

impl GraphBuilder {
    /// Create a new GraphBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already built type graph instead of the configured entities
    pub fn with_type_graph(mut self, type_graph: TypeGraph) -> Self {
        self.type_graph = Some(Arc::new(type_graph));
        self
    }

    /// Add a configuration; several are merged in the order they were added
    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Verify credentials with these JWT settings, overriding any configured `auth`
    pub fn with_auth_config(mut self, config: AuthConfig) -> Self {
        self.auth_config = Some(config);
        self
    }

    /// Verify credentials with a custom verifier; takes precedence over `with_auth_config`
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Custom resolvers merged over the generated ones
    pub fn with_resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Build the wrapped handler registry
    pub fn build(self) -> GraphResult<HandlerRegistry> {
        let merged = GraphConfig::merge(self.configs);

        let graph = match self.type_graph {
            Some(graph) => graph,
            None if !merged.entities.is_empty() => Arc::new(merged.type_graph()?),
            None => {
                return Err(GraphError::Config(
                    "no type graph: call with_type_graph or with_config".to_string(),
                ));
            }
        };

        let deriver = match (self.verifier, self.auth_config.or(merged.auth)) {
            (Some(verifier), _) => AuthParamDeriver::new(verifier),
            (None, Some(config)) => AuthParamDeriver::from_config(&config)?,
            (None, None) => {
                tracing::warn!("no credential verifier configured, supplied credentials will be rejected");
                AuthParamDeriver::without_verifier()
            }
        };

        let entity_names = graph.entity_names();
        let generated = generate(graph.clone());
        let (handlers, passthrough) = compose(self.resolvers, generated, &entity_names)?.into_parts();
        let registry = HandlerRegistry::new(wrap(handlers, Arc::new(deriver)), passthrough);

        tracing::info!(
            entities = graph.len(),
            handlers = registry.handler_count(),
            "handler registry built"
        );
        Ok(registry)
    }
}
