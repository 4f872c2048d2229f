//! ENUM union/intersection merge (§4.2.3): enum values combined by name.

use std::collections::BTreeSet;

use crate::error::SchemaMergeError;
use crate::introspection::{EnumValue, IntrospectedType, TypeKind};
use crate::merge::MergeMode;

pub fn merge_enum_type(
    mode: MergeMode,
    left: &IntrospectedType,
    right: &IntrospectedType,
) -> Result<IntrospectedType, SchemaMergeError> {
    debug_assert_eq!(left.name, right.name);
    let left_values: BTreeSet<&str> = left.enum_values.iter().map(|v| v.name.as_str()).collect();
    let right_values: BTreeSet<&str> = right.enum_values.iter().map(|v| v.name.as_str()).collect();

    let names: Vec<&str> = match mode {
        MergeMode::Union => left_values.union(&right_values).copied().collect(),
        MergeMode::Intersection => left_values.intersection(&right_values).copied().collect(),
    };

    Ok(IntrospectedType {
        name: left.name.clone(),
        kind: TypeKind::Enum,
        fields: Vec::new(),
        input_fields: Vec::new(),
        possible_types: Vec::new(),
        enum_values: names
            .into_iter()
            .map(|name| EnumValue { name: name.to_owned() })
            .collect(),
    })
}
