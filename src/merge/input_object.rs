//! INPUT_OBJECT union/intersection merge (§4.2.3).

use indexmap::IndexMap;

use crate::error::SchemaMergeError;
use crate::introspection::{InputValue, IntrospectedType, TypeKind};
use crate::merge::type_ref::{merge_type_ref, Direction};
use crate::merge::MergeMode;

pub fn merge_input_object_type(
    mode: MergeMode,
    left: &IntrospectedType,
    right: &IntrospectedType,
) -> Result<IntrospectedType, SchemaMergeError> {
    debug_assert_eq!(left.name, right.name);
    let name = &left.name;

    let left_fields: IndexMap<&str, &InputValue> = left
        .input_fields
        .iter()
        .map(|f| (f.name.as_str(), f))
        .collect();
    let right_fields: IndexMap<&str, &InputValue> = right
        .input_fields
        .iter()
        .map(|f| (f.name.as_str(), f))
        .collect();

    let mut field_names: Vec<&str> = match mode {
        MergeMode::Union => left_fields
            .keys()
            .chain(right_fields.keys())
            .copied()
            .collect(),
        // "Intersection never adds one-sided fields."
        MergeMode::Intersection => left_fields
            .keys()
            .filter(|k| right_fields.contains_key(*k))
            .copied()
            .collect(),
    };
    field_names.sort_unstable();
    field_names.dedup();

    let mut input_fields = Vec::with_capacity(field_names.len());
    for field_name in field_names {
        let merged = match (left_fields.get(field_name), right_fields.get(field_name)) {
            (Some(l), Some(r)) => InputValue {
                name: l.name.clone(),
                type_ref: merge_type_ref(Direction::Input, name, field_name, &l.type_ref, &r.type_ref)?,
            },
            // "A field present in only one side is admitted only if it is
            // nullable there (else fail NewNonNullInput)."
            (Some(l), None) => {
                if l.type_ref.is_non_null() {
                    return Err(SchemaMergeError::NewNonNullInput {
                        type_name: name.clone(),
                        field_name: field_name.to_owned(),
                    });
                }
                (*l).clone()
            }
            (None, Some(r)) => {
                if r.type_ref.is_non_null() {
                    return Err(SchemaMergeError::NewNonNullInput {
                        type_name: name.clone(),
                        field_name: field_name.to_owned(),
                    });
                }
                (*r).clone()
            }
            (None, None) => unreachable!("field name was collected from one of the two sides"),
        };
        input_fields.push(merged);
    }

    Ok(IntrospectedType {
        name: name.clone(),
        kind: TypeKind::InputObject,
        fields: Vec::new(),
        input_fields,
        possible_types: Vec::new(),
        enum_values: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection::TypeRef;

    fn input_obj(name: &str, fields: Vec<InputValue>) -> IntrospectedType {
        IntrospectedType {
            name: name.to_owned(),
            kind: TypeKind::InputObject,
            fields: Vec::new(),
            input_fields: fields,
            possible_types: Vec::new(),
            enum_values: Vec::new(),
        }
    }

    fn nullable_field(name: &str) -> InputValue {
        InputValue {
            name: name.to_owned(),
            type_ref: TypeRef::named(TypeKind::Scalar, "String"),
        }
    }

    fn non_null_field(name: &str) -> InputValue {
        InputValue {
            name: name.to_owned(),
            type_ref: TypeRef::non_null(TypeRef::named(TypeKind::Scalar, "String")),
        }
    }

    #[test]
    fn union_admits_one_sided_nullable_field() {
        let left = input_obj("Filter", vec![nullable_field("a")]);
        let right = input_obj("Filter", vec![]);
        let merged = merge_input_object_type(MergeMode::Union, &left, &right).unwrap();
        assert_eq!(merged.input_fields.len(), 1);
    }

    #[test]
    fn union_rejects_one_sided_non_null_field() {
        let left = input_obj("Filter", vec![non_null_field("a")]);
        let right = input_obj("Filter", vec![]);
        let err = merge_input_object_type(MergeMode::Union, &left, &right).unwrap_err();
        assert!(matches!(err, SchemaMergeError::NewNonNullInput { .. }));
    }

    #[test]
    fn intersection_never_admits_one_sided_field() {
        let left = input_obj("Filter", vec![nullable_field("a")]);
        let right = input_obj("Filter", vec![]);
        let merged = merge_input_object_type(MergeMode::Intersection, &left, &right).unwrap();
        assert!(merged.input_fields.is_empty());
    }
}
