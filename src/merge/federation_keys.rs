//! Federation-key detection and validation (§4.2.5).
//!
//! A service can expose a synthetic `Federation` type whose fields are
//! named `"{objectName}-{service}"` and accept a `keys: [InputObject!]!`
//! argument. This module validates those declarations against every
//! service that treats `objectName` as a *root* object (one with its own
//! `__federation` field) and builds the `federatedKeys` map the executor
//! uses to project a parent object's key payload down to just the fields a
//! given foreign service actually declared as its join key.

use indexmap::{IndexMap, IndexSet};

use crate::error::SchemaMergeError;
use crate::introspection::{IntrospectedSchema, IntrospectedType, TypeKind};
use crate::merge::field_key::FieldKey;

pub const FEDERATION_TYPE_NAME: &str = "Federation";
pub const FEDERATION_FIELD_NAME: &str = "__federation";
pub const KEY_FIELD_NAME: &str = "__key";
const KEYS_ARG_NAME: &str = "keys";

/// Splits a Federation field name `"{TypeName}-{ServiceName}"` into its two
/// parts. The object-type name comes first, so we split at the first `-`.
fn split_federation_field_name(field_name: &str) -> Option<(&str, &str)> {
    field_name.split_once('-')
}

fn is_root_object(ty: &IntrospectedType) -> bool {
    ty.kind == TypeKind::Object && ty.field(FEDERATION_FIELD_NAME).is_some()
}

pub fn detect_federated_keys(
    merged: &IntrospectedSchema,
    per_service: &IndexMap<String, IntrospectedSchema>,
) -> Result<IndexMap<FieldKey, IndexSet<String>>, SchemaMergeError> {
    let mut federated_keys: IndexMap<FieldKey, IndexSet<String>> = IndexMap::new();

    let Some(federation_type) = merged.types.get(FEDERATION_TYPE_NAME) else {
        return Ok(federated_keys);
    };

    let mut field_names: Vec<&str> = federation_type.fields.iter().map(|f| f.name.as_str()).collect();
    field_names.sort_unstable();

    for field_name in field_names {
        let field = federation_type
            .field(field_name)
            .expect("name was collected from this same type's fields");

        let (object_name, service_name) =
            split_federation_field_name(field_name).ok_or_else(|| SchemaMergeError::InvalidFederationKey {
                type_name: FEDERATION_TYPE_NAME.to_owned(),
                service: "<unknown>".to_owned(),
                message: format!(
                    "field `{field_name}` does not match the required \"{{TypeName}}-{{ServiceName}}\" format"
                ),
            })?;

        let keys_arg = field.args.iter().find(|a| a.name == KEYS_ARG_NAME).ok_or_else(|| {
            SchemaMergeError::InvalidFederationKey {
                type_name: object_name.to_owned(),
                service: service_name.to_owned(),
                message: format!("field `{field_name}` is missing its `{KEYS_ARG_NAME}` argument"),
            }
        })?;

        let keys_type_name = keys_arg.type_ref.name().ok_or_else(|| SchemaMergeError::InvalidFederationKey {
            type_name: object_name.to_owned(),
            service: service_name.to_owned(),
            message: format!("`{KEYS_ARG_NAME}` argument of `{field_name}` has no named input type"),
        })?;

        let keys_type = merged.types.get(keys_type_name).ok_or_else(|| SchemaMergeError::InvalidFederationKey {
            type_name: object_name.to_owned(),
            service: service_name.to_owned(),
            message: format!("`{KEYS_ARG_NAME}` input type `{keys_type_name}` is not defined"),
        })?;

        if keys_type.kind != TypeKind::InputObject {
            return Err(SchemaMergeError::InvalidFederationKey {
                type_name: object_name.to_owned(),
                service: service_name.to_owned(),
                message: format!("`{keys_type_name}` is not an input object type"),
            });
        }

        // (a) every key field must exist on `objectName` in every service
        // that exposes it as a root object.
        for (exposing_service, schema) in per_service {
            let Some(object_type) = schema.types.get(object_name) else {
                continue;
            };
            if !is_root_object(object_type) {
                continue;
            }
            for key_field in &keys_type.input_fields {
                if object_type.field(&key_field.name).is_none() {
                    return Err(SchemaMergeError::InvalidFederationKey {
                        type_name: object_name.to_owned(),
                        service: service_name.to_owned(),
                        message: format!(
                            "key field `{}` is not defined on `{object_name}` in service `{exposing_service}`",
                            key_field.name
                        ),
                    });
                }
            }
        }

        // (b) record the declaring service against every key field.
        for key_field in &keys_type.input_fields {
            federated_keys
                .entry(FieldKey::new(object_name, &key_field.name))
                .or_default()
                .insert(service_name.to_owned());
        }
    }

    Ok(federated_keys)
}
