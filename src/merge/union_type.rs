//! UNION union/intersection merge (§4.2.3): possible-types combined by name.

use std::collections::BTreeSet;

use crate::error::SchemaMergeError;
use crate::introspection::{IntrospectedType, TypeKind};
use crate::merge::MergeMode;

pub fn merge_union_type(
    mode: MergeMode,
    left: &IntrospectedType,
    right: &IntrospectedType,
) -> Result<IntrospectedType, SchemaMergeError> {
    debug_assert_eq!(left.name, right.name);
    let left_types: BTreeSet<&str> = left.possible_types.iter().map(String::as_str).collect();
    let right_types: BTreeSet<&str> = right.possible_types.iter().map(String::as_str).collect();

    let possible_types: Vec<String> = match mode {
        MergeMode::Union => left_types
            .union(&right_types)
            .map(|s| s.to_string())
            .collect(),
        MergeMode::Intersection => left_types
            .intersection(&right_types)
            .map(|s| s.to_string())
            .collect(),
    };

    Ok(IntrospectedType {
        name: left.name.clone(),
        kind: TypeKind::Union,
        fields: Vec::new(),
        input_fields: Vec::new(),
        possible_types,
        enum_values: Vec::new(),
    })
}
