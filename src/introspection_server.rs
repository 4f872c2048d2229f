//! C6: answers `__schema` / `__type` queries against the gateway's own
//! merged schema, without leaving the process (§4.6).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json_bytes::Value;

use crate::error::ExecuteError;
use crate::executor::{ExecutorClient, SubqueryRequest, SubqueryResponse};
use crate::introspection::{Field, InputValue, IntrospectedType, TypeRef};
use crate::merge::type_ref::type_kind_name as kind_name;
use crate::merge::MergedSchema;

/// The reserved service name the self-server is registered under.
pub const INTROSPECTION_CLIENT: &str = "introspection-client";

/// A synthetic `ExecutorClient` serving introspection of `schema` itself.
pub struct IntrospectionServer {
    schema: Arc<MergedSchema>,
}

impl IntrospectionServer {
    pub fn new(schema: Arc<MergedSchema>) -> Self {
        IntrospectionServer { schema }
    }
}

#[async_trait]
impl ExecutorClient for IntrospectionServer {
    async fn execute(&self, request: SubqueryRequest) -> Result<SubqueryResponse, ExecuteError> {
        let selections = request.selection_set.as_object().ok_or_else(|| ExecuteError::MalformedResponse {
            service: INTROSPECTION_CLIENT.to_owned(),
            message: "introspection queries must be object-shaped".to_owned(),
        })?;

        let mut fields = serde_json_bytes::Map::new();
        for selection in selections {
            let value = match selection.name.as_str() {
                "__schema" => schema_value(&self.schema),
                "__type" => {
                    let name = selection
                        .args
                        .get("name")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| ExecuteError::MalformedResponse {
                            service: INTROSPECTION_CLIENT.to_owned(),
                            message: "__type requires a `name` argument".to_owned(),
                        })?;
                    self.schema.types.get(name).map(type_value).unwrap_or(Value::Null)
                }
                other => {
                    return Err(ExecuteError::MalformedResponse {
                        service: INTROSPECTION_CLIENT.to_owned(),
                        message: format!("unsupported introspection field `{other}`"),
                    })
                }
            };
            fields.insert(selection.alias.clone(), value);
        }

        tracing::debug!(fields = fields.len(), "answered introspection query locally");
        Ok(SubqueryResponse { result: Value::Object(fields), metadata: Value::Null })
    }
}

fn schema_value(schema: &MergedSchema) -> Value {
    let mut types: Vec<&IntrospectedType> = schema.types.values().collect();
    types.sort_unstable_by(|a, b| a.name.cmp(&b.name));

    let mut obj = serde_json_bytes::Map::new();
    obj.insert("queryType", Value::String(schema.query_type_name.clone().into()));
    obj.insert(
        "mutationType",
        schema.mutation_type_name.clone().map(|n| Value::String(n.into())).unwrap_or(Value::Null),
    );
    obj.insert("types", Value::Array(types.into_iter().map(type_value).collect()));
    Value::Object(obj)
}

fn type_value(ty: &IntrospectedType) -> Value {
    let mut obj = serde_json_bytes::Map::new();
    obj.insert("name", Value::String(ty.name.clone().into()));
    obj.insert("kind", Value::String(kind_name(ty.kind).into()));
    obj.insert("fields", Value::Array(ty.fields.iter().map(field_value).collect()));
    obj.insert("inputFields", Value::Array(ty.input_fields.iter().map(input_value_value).collect()));
    obj.insert(
        "possibleTypes",
        Value::Array(ty.possible_types.iter().map(|name| Value::String(name.clone().into())).collect()),
    );
    obj.insert(
        "enumValues",
        Value::Array(
            ty.enum_values
                .iter()
                .map(|v| {
                    let mut ev = serde_json_bytes::Map::new();
                    ev.insert("name", Value::String(v.name.clone().into()));
                    Value::Object(ev)
                })
                .collect(),
        ),
    );
    Value::Object(obj)
}

fn field_value(field: &Field) -> Value {
    let mut obj = serde_json_bytes::Map::new();
    obj.insert("name", Value::String(field.name.clone().into()));
    obj.insert("args", Value::Array(field.args.iter().map(input_value_value).collect()));
    obj.insert("type", type_ref_value(&field.type_ref));
    Value::Object(obj)
}

fn input_value_value(input: &InputValue) -> Value {
    let mut obj = serde_json_bytes::Map::new();
    obj.insert("name", Value::String(input.name.clone().into()));
    obj.insert("type", type_ref_value(&input.type_ref));
    Value::Object(obj)
}

fn type_ref_value(type_ref: &TypeRef) -> Value {
    let mut obj = serde_json_bytes::Map::new();
    obj.insert("kind", Value::String(kind_name(type_ref.kind).into()));
    obj.insert("name", type_ref.name.clone().map(|n| Value::String(n.into())).unwrap_or(Value::Null));
    obj.insert(
        "ofType",
        type_ref.of_type.as_ref().map(|t| type_ref_value(t)).unwrap_or(Value::Null),
    );
    Value::Object(obj)
}
