//! Shared schema-building helpers for the scenario tests (§8).

use fedgraph::introspection::{
    Field, InputValue, IntrospectedSchema, IntrospectedType, TypeKind, TypeRef,
};
use indexmap::IndexMap;

pub fn object(name: &str, fields: Vec<Field>) -> IntrospectedType {
    IntrospectedType {
        name: name.to_owned(),
        kind: TypeKind::Object,
        fields,
        input_fields: Vec::new(),
        possible_types: Vec::new(),
        enum_values: Vec::new(),
    }
}

pub fn union(name: &str, possible_types: &[&str]) -> IntrospectedType {
    IntrospectedType {
        name: name.to_owned(),
        kind: TypeKind::Union,
        fields: Vec::new(),
        input_fields: Vec::new(),
        possible_types: possible_types.iter().map(|s| s.to_string()).collect(),
        enum_values: Vec::new(),
    }
}

pub fn input_object(name: &str, fields: Vec<InputValue>) -> IntrospectedType {
    IntrospectedType {
        name: name.to_owned(),
        kind: TypeKind::InputObject,
        fields: Vec::new(),
        input_fields: fields,
        possible_types: Vec::new(),
        enum_values: Vec::new(),
    }
}

pub fn field(name: &str, type_ref: TypeRef) -> Field {
    Field { name: name.to_owned(), args: Vec::new(), type_ref }
}

pub fn field_with_args(name: &str, args: Vec<InputValue>, type_ref: TypeRef) -> Field {
    Field { name: name.to_owned(), args, type_ref }
}

pub fn input(name: &str, type_ref: TypeRef) -> InputValue {
    InputValue { name: name.to_owned(), type_ref }
}

pub fn scalar(name: &str) -> TypeRef {
    TypeRef::named(TypeKind::Scalar, name)
}

pub fn schema(query_fields: Vec<Field>, extra_types: Vec<IntrospectedType>) -> IntrospectedSchema {
    let mut types: IndexMap<String, IntrospectedType> = extra_types.into_iter().map(|t| (t.name.clone(), t)).collect();
    let query = object("Query", query_fields);
    types.insert(query.name.clone(), query);
    IntrospectedSchema { types, query_type_name: "Query".to_owned(), mutation_type_name: None }
}

pub fn one_version(schema: IntrospectedSchema) -> IndexMap<String, IntrospectedSchema> {
    let mut versions = IndexMap::new();
    versions.insert("v1".to_owned(), schema);
    versions
}
