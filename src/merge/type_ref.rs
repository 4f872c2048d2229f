//! Type-ref merging (§4.2.6): reconciling the declared type of the same
//! field/arg/input-field across two schemas.

use crate::error::SchemaMergeError;
use crate::introspection::{TypeKind, TypeRef};

/// Which direction a type-ref is used in. This controls how `NON_NULL` is
/// reconciled; it is orthogonal to whether the *field* merge itself is a
/// union or an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// An argument or input-object field type: the merged type must be
    /// accepted by every side, so nullability is strictest-wins.
    Input,
    /// An object/interface field's return type: the merged type must
    /// describe every side's possible responses, so nullability is
    /// loosest-wins.
    Output,
}

/// Merges two type-refs that describe "the same" field/argument across two
/// schemas, per §4.2.6.
pub fn merge_type_ref(
    direction: Direction,
    type_name: &str,
    field_name: &str,
    left: &TypeRef,
    right: &TypeRef,
) -> Result<TypeRef, SchemaMergeError> {
    let left_non_null = left.is_non_null();
    let right_non_null = right.is_non_null();
    let left_inner = left.nullable();
    let right_inner = right.nullable();

    let merged_inner = merge_unwrapped(direction, type_name, field_name, left_inner, right_inner)?;

    let merged_non_null = match direction {
        Direction::Input => left_non_null || right_non_null,
        Direction::Output => left_non_null && right_non_null,
    };

    Ok(if merged_non_null {
        TypeRef::non_null(merged_inner)
    } else {
        merged_inner
    })
}

/// Merges two type-refs known to not be `NON_NULL` at the top level
/// (`NON_NULL` has already been stripped by the caller).
fn merge_unwrapped(
    direction: Direction,
    type_name: &str,
    field_name: &str,
    left: &TypeRef,
    right: &TypeRef,
) -> Result<TypeRef, SchemaMergeError> {
    match (left.is_list(), right.is_list()) {
        (true, true) => {
            let item = merge_type_ref(
                direction,
                type_name,
                field_name,
                left.item_type(),
                right.item_type(),
            )?;
            Ok(TypeRef::list(item))
        }
        (false, false) => {
            let left_name = left.name().unwrap_or_default();
            let right_name = right.name().unwrap_or_default();
            if left.kind != right.kind || left_name != right_name {
                return Err(SchemaMergeError::IncompatibleTypes {
                    type_name: type_name.to_owned(),
                    field_name: field_name.to_owned(),
                    left: left.to_string(),
                    right: right.to_string(),
                });
            }
            Ok(left.clone())
        }
        _ => Err(SchemaMergeError::IncompatibleTypes {
            type_name: type_name.to_owned(),
            field_name: field_name.to_owned(),
            left: left.to_string(),
            right: right.to_string(),
        }),
    }
}

/// The `SCREAMING_SNAKE_CASE` wire name of a kind (matching the
/// `#[serde(rename_all = "SCREAMING_SNAKE_CASE")]` used to decode it);
/// `TypeKind`'s derived `Display` is not rename-aware, so this is spelled
/// out rather than reused.
pub fn type_kind_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Scalar => "SCALAR",
        TypeKind::Object => "OBJECT",
        TypeKind::InputObject => "INPUT_OBJECT",
        TypeKind::Union => "UNION",
        TypeKind::Enum => "ENUM",
        TypeKind::List => "LIST",
        TypeKind::NonNull => "NON_NULL",
    }
}
