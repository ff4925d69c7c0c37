//! Merging generated resolvers with caller-supplied overrides

use super::registry::{HandlerRegistry, RegistryNode, ResolverMap};
use crate::core::error::{GraphError, GraphResult};

const QUERY: &str = "Query";
const MUTATION: &str = "Mutation";
const SUBSCRIPTION: &str = "Subscription";

/// Compose the final handler tree
///
/// - `Query` and `Mutation` always exist; the two sides are merged field
///   by field and a custom field replaces a generated one of the same name
/// - `Subscription` is the custom set alone, omitted when empty
/// - entity namespaces (names in `entity_names`) merge field by field,
///   custom first
/// - any other top-level key goes to the passthrough set untouched
///
/// Both sides must hold namespaces where namespaces are expected; anything
/// else is a [`GraphError::Composition`].
pub fn compose(
    custom: ResolverMap,
    generated: ResolverMap,
    entity_names: &[String],
) -> GraphResult<HandlerRegistry> {
    let mut custom = custom;
    let mut generated = generated;
    let mut handlers = ResolverMap::new();

    for root in [QUERY, MUTATION] {
        let merged = merge(
            root,
            take_namespace(&mut generated, root)?,
            take_namespace(&mut custom, root)?,
        );
        handlers.insert(root.to_string(), RegistryNode::Namespace(merged));
    }

    // generated subscriptions are never installed
    take_namespace(&mut generated, SUBSCRIPTION)?;
    let subscriptions = take_namespace(&mut custom, SUBSCRIPTION)?;
    if !subscriptions.is_empty() {
        handlers.insert(
            SUBSCRIPTION.to_string(),
            RegistryNode::Namespace(subscriptions),
        );
    }

    for name in entity_names {
        let from_generated = generated.contains_key(name);
        let from_custom = custom.contains_key(name);
        if !from_generated && !from_custom {
            continue;
        }
        let merged = merge(
            name,
            take_namespace(&mut generated, name)?,
            take_namespace(&mut custom, name)?,
        );
        handlers.insert(name.clone(), RegistryNode::Namespace(merged));
    }

    let mut passthrough = custom;
    for (key, node) in generated {
        passthrough.entry(key).or_insert(node);
    }

    Ok(HandlerRegistry::new(handlers, passthrough))
}

/// Remove `key` from `map`, requiring a namespace when present
fn take_namespace(map: &mut ResolverMap, key: &str) -> GraphResult<ResolverMap> {
    match map.shift_remove(key) {
        None => Ok(ResolverMap::new()),
        Some(RegistryNode::Namespace(namespace)) => Ok(namespace),
        Some(other) => Err(GraphError::Composition(format!(
            "'{}' must be a namespace, found a {}",
            key,
            other.kind()
        ))),
    }
}

/// Field-by-field merge; `overrides` wins and keeps the generated order
fn merge(name: &str, base: ResolverMap, overrides: ResolverMap) -> ResolverMap {
    let mut merged = base;
    for (field, node) in overrides {
        if merged.contains_key(&field) {
            tracing::debug!("custom resolver {}.{} overrides the generated one", name, field);
        }
        merged.insert(field, node);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::registry::Handler;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn constant(value: Value) -> RegistryNode {
        RegistryNode::Handler(Handler::from_fn(move |_, _, _, _| {
            let value = value.clone();
            Box::pin(async move { Ok(value) })
        }))
    }

    fn namespace(entries: Vec<(&str, RegistryNode)>) -> RegistryNode {
        RegistryNode::Namespace(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn origin(registry: &HandlerRegistry, path: &str) -> Arc<dyn crate::resolvers::Resolver> {
        registry.lookup(path).unwrap().origin().clone()
    }

    #[test]
    fn test_custom_wins_by_identity() {
        let generated_people = constant(json!("generated"));
        let custom_people = constant(json!("custom"));
        let custom_origin = custom_people.as_handler().unwrap().origin().clone();

        let mut generated = ResolverMap::new();
        generated.insert(
            "Query".into(),
            namespace(vec![("people", generated_people), ("movies", constant(json!([])))]),
        );
        let mut custom = ResolverMap::new();
        custom.insert("Query".into(), namespace(vec![("people", custom_people)]));

        let registry = compose(custom, generated, &[]).unwrap();
        assert!(Arc::ptr_eq(&origin(&registry, "Query.people"), &custom_origin));
        assert!(registry.lookup("Query.movies").is_some());

        let order: Vec<&String> = registry.namespace("Query").unwrap().keys().collect();
        assert_eq!(order, vec!["people", "movies"]);
    }

    #[test]
    fn test_query_and_mutation_always_present() {
        let registry = compose(ResolverMap::new(), ResolverMap::new(), &[]).unwrap();
        assert!(registry.namespace("Query").is_some());
        assert!(registry.namespace("Mutation").is_some());
        assert!(registry.namespace("Subscription").is_none());
    }

    #[test]
    fn test_subscription_is_custom_only() {
        let mut generated = ResolverMap::new();
        generated.insert("Subscription".into(), namespace(vec![("a", constant(json!(1)))]));
        let mut custom = ResolverMap::new();
        custom.insert("Subscription".into(), namespace(vec![("b", constant(json!(2)))]));

        let registry = compose(custom, generated, &[]).unwrap();
        let keys: Vec<&String> = registry.namespace("Subscription").unwrap().keys().collect();
        assert_eq!(keys, vec!["b"]);
    }

    #[test]
    fn test_entity_namespaces_and_passthrough() {
        let mut generated = ResolverMap::new();
        generated.insert(
            "Person".into(),
            namespace(vec![("fullName", constant(json!("g"))), ("age", constant(json!(1)))]),
        );
        generated.insert("DateTime".into(), RegistryNode::passthrough("generated"));

        let mut custom = ResolverMap::new();
        custom.insert("Person".into(), namespace(vec![("fullName", constant(json!("c")))]));
        custom.insert("DateTime".into(), RegistryNode::passthrough("custom"));
        custom.insert("JSON".into(), namespace(vec![("parse", constant(json!(null)))]));

        let registry = compose(custom, generated, &["Person".to_string()]).unwrap();
        let person = registry.namespace("Person").unwrap();
        assert_eq!(person.len(), 2);

        let passthrough = registry.passthrough();
        assert_eq!(passthrough.len(), 2);
        match &passthrough["DateTime"] {
            RegistryNode::Passthrough(value) => {
                assert_eq!(value.downcast_ref::<&str>(), Some(&"custom"))
            }
            other => panic!("expected passthrough, got {:?}", other),
        }
        assert!(registry.namespace("JSON").is_none());
    }

    #[test]
    fn test_handler_where_namespace_expected() {
        let mut custom = ResolverMap::new();
        custom.insert("Query".into(), constant(json!(1)));
        let err = compose(custom, ResolverMap::new(), &[]).unwrap_err();
        assert!(matches!(err, GraphError::Composition(_)));
        assert!(err.is_startup_error());
    }
}
