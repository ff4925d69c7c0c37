//! Resolver trait and the typed handler tree
//!
//! A registry is a tree of [`RegistryNode`]s: namespaces (`Query`,
//! `Mutation`, entity types) hold handlers or further namespaces, and
//! passthrough values (custom scalars, directive implementations) are kept
//! opaque. The tree is built once at startup and shared behind an `Arc`.

use crate::core::context::ExecutionContext;
use crate::core::error::{GraphError, GraphResult};
use crate::core::selection::{Arguments, SelectionTree};
use async_trait::async_trait;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An executable request handler
///
/// Mirrors the execution engine's calling shape: parent result, call
/// arguments, execution context and the requested selection.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        parent: Value,
        args: Arguments,
        ctx: ExecutionContext,
        selection: SelectionTree,
    ) -> GraphResult<Value>;
}

struct FnResolver<F>(F);

#[async_trait]
impl<F> Resolver for FnResolver<F>
where
    F: Fn(Value, Arguments, ExecutionContext, SelectionTree) -> BoxFuture<'static, GraphResult<Value>>
        + Send
        + Sync,
{
    async fn resolve(
        &self,
        parent: Value,
        args: Arguments,
        ctx: ExecutionContext,
        selection: SelectionTree,
    ) -> GraphResult<Value> {
        (self.0)(parent, args, ctx, selection).await
    }
}

/// Turn a closure returning a boxed future into a resolver
///
/// ```rust,ignore
/// let hello = resolver_fn(|_, _, _, _| Box::pin(async { Ok(json!("hello")) }));
/// ```
pub fn resolver_fn<F>(f: F) -> Arc<dyn Resolver>
where
    F: Fn(Value, Arguments, ExecutionContext, SelectionTree) -> BoxFuture<'static, GraphResult<Value>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnResolver(f))
}

/// A handler leaf: the resolver as supplied, plus its guarded form once wrapped
#[derive(Clone)]
pub struct Handler {
    origin: Arc<dyn Resolver>,
    guarded: Option<Arc<dyn Resolver>>,
}

impl Handler {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            origin: resolver,
            guarded: None,
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Value, Arguments, ExecutionContext, SelectionTree) -> BoxFuture<'static, GraphResult<Value>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(resolver_fn(f))
    }

    /// The resolver this handler was created from, unaffected by wrapping
    pub fn origin(&self) -> &Arc<dyn Resolver> {
        &self.origin
    }

    pub fn is_guarded(&self) -> bool {
        self.guarded.is_some()
    }

    pub(crate) fn with_guard(mut self, guarded: Arc<dyn Resolver>) -> Self {
        self.guarded = Some(guarded);
        self
    }

    /// Invoke the handler; the guarded form runs when present
    pub async fn call(
        &self,
        parent: Value,
        args: Arguments,
        ctx: ExecutionContext,
        selection: SelectionTree,
    ) -> GraphResult<Value> {
        let resolver = self.guarded.as_ref().unwrap_or(&self.origin);
        resolver.resolve(parent, args, ctx, selection).await
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("guarded", &self.is_guarded())
            .finish()
    }
}

/// One entry of the handler tree
#[derive(Clone)]
pub enum RegistryNode {
    Namespace(ResolverMap),
    Handler(Handler),
    /// A non-handler value that is carried along but never wrapped or called
    Passthrough(Arc<dyn Any + Send + Sync>),
}

impl RegistryNode {
    pub fn handler(resolver: Arc<dyn Resolver>) -> Self {
        RegistryNode::Handler(Handler::new(resolver))
    }

    pub fn passthrough<T: Any + Send + Sync>(value: T) -> Self {
        RegistryNode::Passthrough(Arc::new(value))
    }

    pub fn as_namespace(&self) -> Option<&ResolverMap> {
        match self {
            RegistryNode::Namespace(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            RegistryNode::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            RegistryNode::Namespace(_) => "namespace",
            RegistryNode::Handler(_) => "handler",
            RegistryNode::Passthrough(_) => "passthrough value",
        }
    }
}

impl fmt::Debug for RegistryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryNode::Namespace(map) => f.debug_map().entries(map.iter()).finish(),
            RegistryNode::Handler(handler) => fmt::Debug::fmt(handler, f),
            RegistryNode::Passthrough(_) => f.write_str("Passthrough"),
        }
    }
}

/// Named entries of one tree level, in insertion order
pub type ResolverMap = IndexMap<String, RegistryNode>;

/// The installable result of composition
///
/// `handlers` holds the root operation types and entity namespaces; every
/// other top-level key lives in `passthrough` and is never wrapped.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: ResolverMap,
    passthrough: ResolverMap,
}

impl HandlerRegistry {
    pub fn new(handlers: ResolverMap, passthrough: ResolverMap) -> Self {
        Self {
            handlers,
            passthrough,
        }
    }

    pub fn handlers(&self) -> &ResolverMap {
        &self.handlers
    }

    pub fn passthrough(&self) -> &ResolverMap {
        &self.passthrough
    }

    pub(crate) fn into_parts(self) -> (ResolverMap, ResolverMap) {
        (self.handlers, self.passthrough)
    }

    pub fn namespace(&self, name: &str) -> Option<&ResolverMap> {
        self.handlers.get(name).and_then(RegistryNode::as_namespace)
    }

    /// Handler for `type_name.field`
    pub fn get(&self, type_name: &str, field: &str) -> Option<&Handler> {
        self.namespace(type_name)?
            .get(field)
            .and_then(RegistryNode::as_handler)
    }

    /// Handler at a dotted path (`"Query.people"`)
    pub fn lookup(&self, path: &str) -> Option<&Handler> {
        let mut segments = path.split('.');
        let mut node = self.handlers.get(segments.next()?)?;
        for segment in segments {
            node = node.as_namespace()?.get(segment)?;
        }
        node.as_handler()
    }

    /// Number of handler leaves in the tree
    pub fn handler_count(&self) -> usize {
        fn count(map: &ResolverMap) -> usize {
            map.values()
                .map(|node| match node {
                    RegistryNode::Namespace(inner) => count(inner),
                    RegistryNode::Handler(_) => 1,
                    RegistryNode::Passthrough(_) => 0,
                })
                .sum()
        }
        count(&self.handlers)
    }

    /// Invoke `type_name.field` for a root selection
    ///
    /// The parent is `null` and the arguments are the selection's own.
    pub async fn resolve_root(
        &self,
        type_name: &str,
        selection: SelectionTree,
        ctx: ExecutionContext,
    ) -> GraphResult<Value> {
        let handler = self
            .get(type_name, &selection.name)
            .ok_or_else(|| GraphError::schema_mismatch(type_name, &selection.name))?;
        let args = selection.arguments.clone();
        handler.call(Value::Null, args, ctx, selection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: Value) -> Handler {
        Handler::from_fn(move |_, _, _, _| {
            let value = value.clone();
            Box::pin(async move { Ok(value) })
        })
    }

    fn registry() -> HandlerRegistry {
        let mut query = ResolverMap::new();
        query.insert("people".into(), RegistryNode::Handler(constant(json!([]))));
        query.insert("version".into(), RegistryNode::Handler(constant(json!("1"))));
        let mut handlers = ResolverMap::new();
        handlers.insert("Query".into(), RegistryNode::Namespace(query));

        let mut passthrough = ResolverMap::new();
        passthrough.insert("DateTime".into(), RegistryNode::passthrough("scalar"));
        HandlerRegistry::new(handlers, passthrough)
    }

    #[test]
    fn test_lookup() {
        let registry = registry();
        assert!(registry.get("Query", "people").is_some());
        assert!(registry.lookup("Query.version").is_some());
        assert!(registry.lookup("Query").is_none());
        assert!(registry.lookup("Mutation.createPeople").is_none());
        assert_eq!(registry.handler_count(), 2);
        assert!(registry.passthrough().contains_key("DateTime"));
    }

    #[tokio::test]
    async fn test_resolve_root() {
        let registry = registry();
        let value = registry
            .resolve_root("Query", SelectionTree::new("version"), ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(value, json!("1"));

        let missing = registry
            .resolve_root("Query", SelectionTree::new("movies"), ExecutionContext::new())
            .await;
        assert!(matches!(missing, Err(GraphError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_passthrough_downcast() {
        let node = RegistryNode::passthrough(42_u32);
        match node {
            RegistryNode::Passthrough(value) => assert_eq!(value.downcast_ref::<u32>(), Some(&42)),
            other => panic!("expected passthrough, got {:?}", other),
        }
    }
}
