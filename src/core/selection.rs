//! Field-selection trees
//!
//! A [`SelectionTree`] is the requested shape of one operation: the root
//! field (e.g. `people`) with its arguments and the nested fields below it.
//! The execution engine builds one per request; [`SelectionTree::from_query`]
//! builds them straight from a GraphQL document with `graphql-parser`.

use crate::core::error::{GraphError, GraphResult};
use graphql_parser::query::{
    Definition, Directive, FragmentDefinition, OperationDefinition, Selection, SelectionSet,
    Value as GqlValue, parse_query,
};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// Call arguments of a field, already resolved to JSON
pub type Arguments = Map<String, Value>;

/// A requested field with its arguments and nested selection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionTree {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Arguments,
    pub fields: Vec<SelectionTree>,
}

impl SelectionTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn with_field(mut self, field: SelectionTree) -> Self {
        self.fields.push(field);
        self
    }

    /// Add leaf fields by name
    pub fn with_scalars(mut self, names: &[&str]) -> Self {
        self.fields
            .extend(names.iter().map(|name| SelectionTree::new(*name)));
        self
    }

    /// Key under which the field appears in the result
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    /// First child selecting the field `name`
    pub fn child(&self, name: &str) -> Option<&SelectionTree> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_leaf(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a GraphQL document and return one tree per root field of the
    /// chosen operation (first operation when `operation_name` is `None`)
    pub fn from_query(
        document: &str,
        operation_name: Option<&str>,
        variables: &Map<String, Value>,
    ) -> GraphResult<Vec<SelectionTree>> {
        let doc = parse_query::<String>(document)
            .map_err(|e| GraphError::invalid_argument("query", e.to_string()))?;

        let mut fragments = HashMap::new();
        let mut operations = Vec::new();
        for definition in &doc.definitions {
            match definition {
                Definition::Fragment(fragment) => {
                    fragments.insert(fragment.name.as_str(), fragment);
                }
                Definition::Operation(op) => operations.push(op),
            }
        }

        let operation = operations
            .into_iter()
            .find(|op| match operation_name {
                Some(name) => operation_name_of(op) == Some(name),
                None => true,
            })
            .ok_or_else(|| {
                GraphError::invalid_argument(
                    "operationName",
                    format!("no operation named {:?}", operation_name),
                )
            })?;

        let selection_set = match operation {
            OperationDefinition::SelectionSet(set) => set,
            OperationDefinition::Query(q) => &q.selection_set,
            OperationDefinition::Mutation(m) => &m.selection_set,
            OperationDefinition::Subscription(s) => &s.selection_set,
        };

        let converter = Converter {
            fragments,
            variables,
        };
        converter.selection_set(selection_set, &mut Vec::new())
    }
}

fn operation_name_of<'a>(op: &'a OperationDefinition<'_, String>) -> Option<&'a str> {
    match op {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(q) => q.name.as_deref(),
        OperationDefinition::Mutation(m) => m.name.as_deref(),
        OperationDefinition::Subscription(s) => s.name.as_deref(),
    }
}

struct Converter<'d, 'a, 'v> {
    fragments: HashMap<&'d str, &'d FragmentDefinition<'a, String>>,
    variables: &'v Map<String, Value>,
}

impl<'d, 'a> Converter<'d, 'a, '_> {
    fn selection_set(
        &self,
        set: &'d SelectionSet<'a, String>,
        visiting: &mut Vec<&'d str>,
    ) -> GraphResult<Vec<SelectionTree>> {
        let mut fields = Vec::new();
        for selection in &set.items {
            match selection {
                Selection::Field(field) => {
                    if self.is_skipped(&field.directives) {
                        continue;
                    }
                    let mut arguments = Map::new();
                    for (name, value) in &field.arguments {
                        if let Some(value) = self.value(value) {
                            arguments.insert(name.clone(), value);
                        }
                    }
                    fields.push(SelectionTree {
                        name: field.name.clone(),
                        alias: field.alias.clone(),
                        arguments,
                        fields: self.selection_set(&field.selection_set, visiting)?,
                    });
                }
                Selection::InlineFragment(inline) => {
                    if self.is_skipped(&inline.directives) {
                        continue;
                    }
                    fields.extend(self.selection_set(&inline.selection_set, visiting)?);
                }
                Selection::FragmentSpread(spread) => {
                    if self.is_skipped(&spread.directives) {
                        continue;
                    }
                    let name = spread.fragment_name.as_str();
                    if visiting.contains(&name) {
                        return Err(GraphError::invalid_argument(
                            "query",
                            format!("fragment '{}' spreads itself", name),
                        ));
                    }
                    let fragment = self.fragments.get(name).copied().ok_or_else(|| {
                        GraphError::invalid_argument("query", format!("unknown fragment '{}'", name))
                    })?;
                    visiting.push(name);
                    fields.extend(self.selection_set(&fragment.selection_set, visiting)?);
                    visiting.pop();
                }
            }
        }
        Ok(fields)
    }

    /// `@skip(if: true)` or `@include(if: false)`
    fn is_skipped(&self, directives: &[Directive<'_, String>]) -> bool {
        directives.iter().any(|directive| {
            let condition = directive
                .arguments
                .iter()
                .find(|(name, _)| name == "if")
                .and_then(|(_, value)| self.value(value))
                .and_then(|v| v.as_bool());
            match (directive.name.as_str(), condition) {
                ("skip", Some(true)) => true,
                ("include", Some(false)) => true,
                _ => false,
            }
        })
    }

    /// Convert a GraphQL value, `None` for an undefined variable
    fn value(&self, value: &GqlValue<'_, String>) -> Option<Value> {
        Some(match value {
            GqlValue::Variable(name) => return self.variables.get(name).cloned(),
            GqlValue::Null => Value::Null,
            GqlValue::Int(i) => json!(i.as_i64().unwrap_or(0)),
            GqlValue::Float(f) => json!(f),
            GqlValue::String(s) => json!(s),
            GqlValue::Boolean(b) => json!(b),
            GqlValue::Enum(e) => json!(e),
            GqlValue::List(list) => Value::Array(
                list.iter()
                    .map(|v| self.value(v).unwrap_or(Value::Null))
                    .collect(),
            ),
            GqlValue::Object(obj) => {
                let mut map = Map::new();
                for (k, v) in obj {
                    if let Some(v) = self.value(v) {
                        map.insert(k.clone(), v);
                    }
                }
                Value::Object(map)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_lookup() {
        let tree = SelectionTree::new("people")
            .with_argument("where", json!({"name": "Keanu"}))
            .with_scalars(&["id", "name"])
            .with_field(SelectionTree::new("movies").with_alias("films"));

        assert_eq!(tree.fields.len(), 3);
        assert_eq!(tree.argument("where"), Some(&json!({"name": "Keanu"})));
        assert_eq!(tree.child("movies").map(|m| m.response_key()), Some("films"));
        assert!(tree.child("id").is_some_and(SelectionTree::is_leaf));
    }

    #[test]
    fn test_null_argument_is_absent() {
        let tree = SelectionTree::new("people").with_argument("where", Value::Null);
        assert!(tree.argument("where").is_none());
    }

    #[test]
    fn test_from_query_with_variables_and_alias() {
        let query = r#"
            query People($name: String) {
                people(where: { name: $name }, options: { limit: 2 }) {
                    id
                    fullName: name
                    movies { title }
                }
            }
        "#;
        let variables = json!({"name": "Keanu"}).as_object().unwrap().clone();
        let trees = SelectionTree::from_query(query, None, &variables).unwrap();

        assert_eq!(trees.len(), 1);
        let people = &trees[0];
        assert_eq!(people.name, "people");
        assert_eq!(people.argument("where"), Some(&json!({"name": "Keanu"})));
        assert_eq!(people.argument("options"), Some(&json!({"limit": 2})));
        assert_eq!(people.fields[1].name, "name");
        assert_eq!(people.fields[1].response_key(), "fullName");
        assert_eq!(people.fields[2].fields[0].name, "title");
    }

    #[test]
    fn test_from_query_undefined_variable_is_omitted() {
        let query = "query ($w: PersonWhere) { people(where: $w) { id } }";
        let trees = SelectionTree::from_query(query, None, &Map::new()).unwrap();
        assert!(trees[0].arguments.is_empty());
    }

    #[test]
    fn test_from_query_fragments_and_directives() {
        let query = r#"
            query {
                people {
                    ...PersonParts
                    ... on Person { born }
                    secret @skip(if: true)
                    visible @include(if: true)
                }
            }
            fragment PersonParts on Person { id name }
        "#;
        let trees = SelectionTree::from_query(query, None, &Map::new()).unwrap();
        let names: Vec<&str> = trees[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "born", "visible"]);
    }

    #[test]
    fn test_from_query_named_operation() {
        let query = r#"
            query A { people { id } }
            mutation B { deletePeople { nodesDeleted } }
        "#;
        let trees = SelectionTree::from_query(query, Some("B"), &Map::new()).unwrap();
        assert_eq!(trees[0].name, "deletePeople");

        let missing = SelectionTree::from_query(query, Some("C"), &Map::new());
        assert!(matches!(missing, Err(GraphError::InvalidArgument { .. })));
    }

    #[test]
    fn test_from_query_cyclic_fragment_rejected() {
        let query = r#"
            query { people { ...A } }
            fragment A on Person { id ...A }
        "#;
        let result = SelectionTree::from_query(query, None, &Map::new());
        assert!(matches!(result, Err(GraphError::InvalidArgument { .. })));
    }

    #[test]
    fn test_from_query_parse_error() {
        let result = SelectionTree::from_query("query {", None, &Map::new());
        assert!(matches!(result, Err(GraphError::InvalidArgument { .. })));
    }
}
