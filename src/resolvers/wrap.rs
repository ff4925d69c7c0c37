//! Guarding every handler with the connection check and auth derivation

use super::registry::{Handler, RegistryNode, Resolver, ResolverMap};
use crate::core::auth::AuthParamDeriver;
use crate::core::context::ExecutionContext;
use crate::core::error::{GraphError, GraphResult};
use crate::core::selection::{Arguments, SelectionTree};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Replace every unguarded handler in `tree` with its guarded form
///
/// Namespaces are descended into, passthrough values are left alone and
/// handlers that are already guarded keep their existing guard, so
/// wrapping a tree twice still derives the auth parameter once per call.
pub fn wrap(tree: ResolverMap, deriver: Arc<AuthParamDeriver>) -> ResolverMap {
    tree.into_iter()
        .map(|(key, node)| (key, wrap_node(node, &deriver)))
        .collect()
}

fn wrap_node(node: RegistryNode, deriver: &Arc<AuthParamDeriver>) -> RegistryNode {
    match node {
        RegistryNode::Namespace(map) => RegistryNode::Namespace(wrap(map, deriver.clone())),
        RegistryNode::Handler(handler) => RegistryNode::Handler(handler.guarded(deriver.clone())),
        passthrough @ RegistryNode::Passthrough(_) => passthrough,
    }
}

/// Wraps a resolver with the request preconditions
struct GuardedResolver {
    inner: Arc<dyn Resolver>,
    deriver: Arc<AuthParamDeriver>,
}

#[async_trait]
impl Resolver for GuardedResolver {
    async fn resolve(
        &self,
        parent: Value,
        args: Arguments,
        ctx: ExecutionContext,
        selection: SelectionTree,
    ) -> GraphResult<Value> {
        if ctx.connection().is_none() {
            return Err(GraphError::MissingConnection);
        }

        let auth = self.deriver.derive(&ctx).await?;
        let ctx = ctx.augment(auth);
        self.inner.resolve(parent, args, ctx, selection).await
    }
}

impl Handler {
    /// Guard a single handler; an already guarded handler is returned as is
    pub fn guarded(self, deriver: Arc<AuthParamDeriver>) -> Self {
        if self.is_guarded() {
            return self;
        }
        let guard = GuardedResolver {
            inner: self.origin().clone(),
            deriver,
        };
        self.with_guard(Arc::new(guard))
    }
}
