//! Authorization rules compiled into Cypher predicates

use super::CypherBuilder;
use crate::core::auth::{AuthPredicate, AuthRule};
use crate::core::schema::{Entity, Operation};
use indexmap::IndexMap;
use serde_json::Value;

/// Rules that constrain `operation` on `entity` when `requested` fields are touched
///
/// Entity rules come first, then field rules in the order the fields were
/// requested. A field requested twice contributes its rules once.
pub(crate) fn rules_in_scope<'e>(
    entity: &'e Entity,
    operation: Operation,
    requested: &[&str],
) -> Vec<&'e AuthRule> {
    let mut rules: Vec<&AuthRule> = entity
        .auth
        .iter()
        .filter(|rule| rule.applies_to(operation))
        .collect();

    let mut seen: Vec<&str> = Vec::new();
    for name in requested {
        if seen.contains(name) {
            continue;
        }
        seen.push(name);
        if let Some(field) = entity.field(name) {
            rules.extend(field.auth.iter().filter(|rule| rule.applies_to(operation)));
        }
    }
    rules
}

/// Predicates over the node bound to `var`
pub(crate) fn node_predicates(
    b: &mut CypherBuilder<'_>,
    var: &str,
    rules: &[&AuthRule],
) -> Vec<String> {
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| match &rule.predicate {
            AuthPredicate::Equals { field, claim } => format!(
                "{var}.{field} IS NOT NULL AND {var}.{field} = {}",
                b.claim(claim)
            ),
            AuthPredicate::AnyRole { roles } => any_role(b, var, i, roles),
            AuthPredicate::Authenticated => authenticated(b),
        })
        .collect()
}

/// Predicates over input values that are about to be written to `var`
///
/// `supplied` maps each input field to the parameter holding its value. An
/// equality rule on a field the input does not supply can never hold.
pub(crate) fn input_predicates(
    b: &mut CypherBuilder<'_>,
    var: &str,
    rules: &[&AuthRule],
    supplied: &IndexMap<String, String>,
) -> Vec<String> {
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| match &rule.predicate {
            AuthPredicate::Equals { field, claim } => match supplied.get(field) {
                Some(param) => format!("{} = {}", param, b.claim(claim)),
                None => "false".to_string(),
            },
            AuthPredicate::AnyRole { roles } => any_role(b, var, i, roles),
            AuthPredicate::Authenticated => authenticated(b),
        })
        .collect()
}

fn any_role(b: &mut CypherBuilder<'_>, var: &str, index: usize, roles: &[String]) -> String {
    let param = b.param(
        format!("{}_auth{}_roles", var, index),
        Value::from(roles.to_vec()),
    );
    format!(
        "ANY({var}_role IN {param} WHERE {var}_role IN coalesce({}, []))",
        b.claim("roles")
    )
}

fn authenticated(b: &CypherBuilder<'_>) -> String {
    format!("{} IS NOT NULL", b.claim("sub"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Field, TypeGraph};
    use serde_json::json;

    fn person() -> Entity {
        Entity::new("Person")
            .with_scalar("id", "ID")
            .with_field(
                Field::scalar("salary", "Int")
                    .with_rule(AuthRule::any_role(["hr"]).on(&[Operation::Read])),
            )
            .with_rule(AuthRule::equals("id", "sub").on(&[Operation::Update]))
            .with_rule(AuthRule::authenticated())
    }

    #[test]
    fn test_rules_in_scope() {
        let entity = person();
        assert_eq!(rules_in_scope(&entity, Operation::Read, &["id"]).len(), 1);
        assert_eq!(
            rules_in_scope(&entity, Operation::Read, &["salary", "salary"]).len(),
            2
        );
        assert_eq!(rules_in_scope(&entity, Operation::Update, &["salary"]).len(), 2);
    }

    #[test]
    fn test_node_predicates() {
        let graph = TypeGraph::default();
        let mut b = CypherBuilder::new(&graph);
        let entity = person();
        let rules = rules_in_scope(&entity, Operation::Update, &["salary"]);
        let predicates = node_predicates(&mut b, "this", &rules);

        assert_eq!(
            predicates,
            vec![
                "this.id IS NOT NULL AND this.id = $auth.sub".to_string(),
                "$auth.sub IS NOT NULL".to_string(),
            ]
        );
    }

    #[test]
    fn test_role_list_is_parameterised() {
        let graph = TypeGraph::default();
        let mut b = CypherBuilder::new(&graph);
        let rule = AuthRule::any_role(["admin", "editor"]);
        let predicates = node_predicates(&mut b, "this", &[&rule]);

        assert_eq!(
            predicates[0],
            "ANY(this_role IN $this_auth0_roles WHERE this_role IN coalesce($auth.roles, []))"
        );
        let query = b.finish(predicates.join(" AND "));
        assert_eq!(query.params["this_auth0_roles"], json!(["admin", "editor"]));
        assert!(query.is_auth_dependent());
    }

    #[test]
    fn test_input_predicate_without_supplied_field() {
        let graph = TypeGraph::default();
        let mut b = CypherBuilder::new(&graph);
        let rule = AuthRule::equals("id", "sub");

        let mut supplied = IndexMap::new();
        assert_eq!(input_predicates(&mut b, "this0", &[&rule], &supplied), vec!["false"]);

        supplied.insert("id".to_string(), "$this0_id".to_string());
        assert_eq!(
            input_predicates(&mut b, "this0", &[&rule], &supplied),
            vec!["$this0_id = $auth.sub"]
        );
    }
}
