//! OBJECT (and the `Query`/`Mutation` roots, which are just objects) union-
//! and intersection-merge (§4.2.3).

use indexmap::IndexMap;

use crate::error::SchemaMergeError;
use crate::introspection::{Field, InputValue, IntrospectedType, TypeKind};
use crate::merge::type_ref::{merge_type_ref, Direction};
use crate::merge::MergeMode;

pub fn merge_object_type(
    mode: MergeMode,
    left: &IntrospectedType,
    right: &IntrospectedType,
) -> Result<IntrospectedType, SchemaMergeError> {
    debug_assert_eq!(left.name, right.name);
    let name = &left.name;

    let left_fields: IndexMap<&str, &Field> =
        left.fields.iter().map(|f| (f.name.as_str(), f)).collect();
    let right_fields: IndexMap<&str, &Field> =
        right.fields.iter().map(|f| (f.name.as_str(), f)).collect();

    let mut field_names: Vec<&str> = match mode {
        MergeMode::Union => left_fields
            .keys()
            .chain(right_fields.keys())
            .copied()
            .collect(),
        MergeMode::Intersection => left_fields
            .keys()
            .filter(|k| right_fields.contains_key(*k))
            .copied()
            .collect(),
    };
    field_names.sort_unstable();
    field_names.dedup();

    let mut fields = Vec::with_capacity(field_names.len());
    for field_name in field_names {
        let merged = match (left_fields.get(field_name), right_fields.get(field_name)) {
            (Some(l), Some(r)) => merge_field(name, l, r)?,
            (Some(l), None) => (*l).clone(),
            (None, Some(r)) => (*r).clone(),
            (None, None) => unreachable!("field name was collected from one of the two sides"),
        };
        fields.push(merged);
    }

    Ok(IntrospectedType {
        name: name.clone(),
        kind: TypeKind::Object,
        fields,
        input_fields: Vec::new(),
        possible_types: Vec::new(),
        enum_values: Vec::new(),
    })
}

fn merge_field(
    type_name: &str,
    left: &Field,
    right: &Field,
) -> Result<Field, SchemaMergeError> {
    let type_ref = merge_type_ref(
        Direction::Output,
        type_name,
        &left.name,
        &left.type_ref,
        &right.type_ref,
    )?;
    let args = merge_args(type_name, &left.name, &left.args, &right.args)?;
    Ok(Field {
        name: left.name.clone(),
        args,
        type_ref,
    })
}

/// Overlapping arguments must merge (§4.2.3: "Overlapping args must
/// merge"); an argument present on only one side is still admitted (it's
/// simply optional from the other service's perspective at the gateway
/// layer — the gateway never sends an argument a service didn't declare).
fn merge_args(
    type_name: &str,
    field_name: &str,
    left: &[InputValue],
    right: &[InputValue],
) -> Result<Vec<InputValue>, SchemaMergeError> {
    let left_by_name: IndexMap<&str, &InputValue> =
        left.iter().map(|a| (a.name.as_str(), a)).collect();
    let right_by_name: IndexMap<&str, &InputValue> =
        right.iter().map(|a| (a.name.as_str(), a)).collect();

    let mut names: Vec<&str> = left_by_name
        .keys()
        .chain(right_by_name.keys())
        .copied()
        .collect();
    names.sort_unstable();
    names.dedup();

    let mut args = Vec::with_capacity(names.len());
    for arg_name in names {
        let merged = match (left_by_name.get(arg_name), right_by_name.get(arg_name)) {
            (Some(l), Some(r)) => {
                let type_ref = merge_type_ref(
                    Direction::Input,
                    type_name,
                    field_name,
                    &l.type_ref,
                    &r.type_ref,
                )
                .map_err(|e| SchemaMergeError::IncompatibleArgs {
                    type_name: type_name.to_owned(),
                    field_name: field_name.to_owned(),
                    arg_name: arg_name.to_owned(),
                    message: e.to_string(),
                })?;
                InputValue {
                    name: l.name.clone(),
                    type_ref,
                }
            }
            (Some(l), None) => (*l).clone(),
            (None, Some(r)) => (*r).clone(),
            (None, None) => unreachable!("arg name was collected from one of the two sides"),
        };
        args.push(merged);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection::TypeRef;

    fn obj(name: &str, fields: Vec<Field>) -> IntrospectedType {
        IntrospectedType {
            name: name.to_owned(),
            kind: TypeKind::Object,
            fields,
            input_fields: Vec::new(),
            possible_types: Vec::new(),
            enum_values: Vec::new(),
        }
    }

    fn field(name: &str, type_ref: TypeRef) -> Field {
        Field {
            name: name.to_owned(),
            args: Vec::new(),
            type_ref,
        }
    }

    #[test]
    fn union_includes_fields_from_either_side() {
        let left = obj("User", vec![field("id", TypeRef::named(TypeKind::Scalar, "ID"))]);
        let right = obj(
            "User",
            vec![field("email", TypeRef::named(TypeKind::Scalar, "String"))],
        );
        let merged = merge_object_type(MergeMode::Union, &left, &right).unwrap();
        let mut names: Vec<_> = merged.fields.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["email", "id"]);
    }

    #[test]
    fn intersection_keeps_only_fields_in_both() {
        let left = obj(
            "User",
            vec![
                field("id", TypeRef::named(TypeKind::Scalar, "ID")),
                field("email", TypeRef::named(TypeKind::Scalar, "String")),
            ],
        );
        let right = obj("User", vec![field("id", TypeRef::named(TypeKind::Scalar, "ID"))]);
        let merged = merge_object_type(MergeMode::Intersection, &left, &right).unwrap();
        let names: Vec<_> = merged.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id"]);
    }

    #[test]
    fn field_names_are_sorted_for_determinism() {
        let left = obj(
            "User",
            vec![
                field("zeta", TypeRef::named(TypeKind::Scalar, "String")),
                field("alpha", TypeRef::named(TypeKind::Scalar, "String")),
            ],
        );
        let right = obj("User", vec![]);
        let merged = merge_object_type(MergeMode::Union, &left, &right).unwrap();
        let names: Vec<_> = merged.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
