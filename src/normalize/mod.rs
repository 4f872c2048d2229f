//! C3: rewrites a raw client selection set into canonical form (§4.3).
//!
//! Object-typed selection sets come out with unique aliases and no
//! fragments; union-typed selection sets come out as one fragment per
//! possible concrete type, sorted by type name, with empty fragments
//! dropped.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::introspection::{IntrospectedType, TypeKind};

/// A field/fragment/arguments selection set as produced by the (external,
/// out-of-scope) query parser: fields and inline fragments live side by
/// side, and the same alias may appear more than once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSelectionSet {
    pub selections: Vec<RawSelection>,
    pub fragments: Vec<RawFragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawSelection {
    pub alias: Option<String>,
    pub name: String,
    pub args: IndexMap<String, serde_json_bytes::Value>,
    pub child_set: Option<RawSelectionSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFragment {
    pub on_type_name: String,
    pub child_set: RawSelectionSet,
}

/// One entry of a normalized, object-typed selection set.
///
/// The wire encoding forwarded to `ExecutorClient` (§6) nests the
/// object/union split under `child_set` rather than sibling
/// `selectionSet`/`fragments` keys; this is a concretization of the
/// logical shape, not a change to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub alias: String,
    pub name: String,
    #[serde(default, rename = "arguments")]
    pub args: IndexMap<String, serde_json_bytes::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_set: Option<NormalizedSelectionSet>,
}

/// One possible-type branch of a normalized, union-typed selection set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(rename = "on")]
    pub on_type_name: String,
    pub child_set: NormalizedSelectionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedSelectionSet {
    Object {
        selections: Vec<Selection>,
    },
    /// `flatten()` never populates `selections` here (§4.3: "union-level
    /// sets have only fragments"); the planner (C4) uses the slot to inject
    /// a synthesized `__typename` selection (§4.4: "Always include a
    /// `__typename` selection").
    Union {
        #[serde(default)]
        selections: Vec<Selection>,
        fragments: Vec<Fragment>,
    },
}

impl NormalizedSelectionSet {
    pub fn is_empty(&self) -> bool {
        match self {
            NormalizedSelectionSet::Object { selections } => selections.is_empty(),
            NormalizedSelectionSet::Union { fragments, .. } => fragments.is_empty(),
        }
    }

    pub fn as_object(&self) -> Option<&[Selection]> {
        match self {
            NormalizedSelectionSet::Object { selections } => Some(selections),
            NormalizedSelectionSet::Union { .. } => None,
        }
    }

    pub fn as_union(&self) -> Option<&[Fragment]> {
        match self {
            NormalizedSelectionSet::Union { fragments, .. } => Some(fragments),
            NormalizedSelectionSet::Object { .. } => None,
        }
    }
}

/// `flatten(selectionSet, type, typeTable) → NormalizedSelectionSet` (§4.3).
#[tracing::instrument(skip(set, types), level = "debug")]
pub fn flatten(
    set: &RawSelectionSet,
    type_name: &str,
    types: &IndexMap<String, IntrospectedType>,
) -> Result<NormalizedSelectionSet, PlanError> {
    let ty = types
        .get(type_name)
        .ok_or_else(|| PlanError::UnknownFragmentTarget { type_name: type_name.to_owned() })?;
    match ty.kind {
        TypeKind::Object => flatten_object(set, ty, types),
        TypeKind::Union => flatten_union(set, ty, types),
        _ => Err(PlanError::UnknownFragmentTarget { type_name: type_name.to_owned() }),
    }
}

/// Depth-first gather of every selection in `set` that applies to
/// `object_type_name`, inlining fragments transitively. A fragment applies
/// if its `on` names the object directly, or names a union that has the
/// object among its possible types.
fn gather_applicable<'a>(
    set: &'a RawSelectionSet,
    object_type_name: &str,
    types: &IndexMap<String, IntrospectedType>,
) -> Result<Vec<&'a RawSelection>, PlanError> {
    let mut out: Vec<&RawSelection> = set.selections.iter().collect();
    for fragment in &set.fragments {
        let applies = if fragment.on_type_name == object_type_name {
            true
        } else {
            match types.get(&fragment.on_type_name) {
                Some(t) if t.kind == TypeKind::Union => {
                    t.possible_types.iter().any(|p| p == object_type_name)
                }
                Some(_) => false,
                None => {
                    return Err(PlanError::UnknownFragmentTarget {
                        type_name: fragment.on_type_name.clone(),
                    })
                }
            }
        };
        if applies {
            out.extend(gather_applicable(&fragment.child_set, object_type_name, types)?);
        }
    }
    Ok(out)
}

struct MergedRaw {
    name: String,
    args: IndexMap<String, serde_json_bytes::Value>,
    child_sets: Vec<RawSelectionSet>,
}

fn flatten_object(
    set: &RawSelectionSet,
    object_type: &IntrospectedType,
    types: &IndexMap<String, IntrospectedType>,
) -> Result<NormalizedSelectionSet, PlanError> {
    let applicable = gather_applicable(set, &object_type.name, types)?;

    let mut merged: IndexMap<String, MergedRaw> = IndexMap::new();
    for raw in applicable {
        let alias = raw.alias.clone().unwrap_or_else(|| raw.name.clone());
        match merged.get_mut(&alias) {
            None => {
                merged.insert(
                    alias,
                    MergedRaw {
                        name: raw.name.clone(),
                        args: raw.args.clone(),
                        child_sets: raw.child_set.clone().into_iter().collect(),
                    },
                );
            }
            Some(existing) => {
                if existing.name != raw.name || existing.args != raw.args {
                    return Err(PlanError::AliasConflict {
                        alias,
                        first: existing.name.clone(),
                        second: raw.name.clone(),
                    });
                }
                if let Some(cs) = &raw.child_set {
                    existing.child_sets.push(cs.clone());
                }
            }
        }
    }

    let mut selections = Vec::with_capacity(merged.len());
    for (alias, m) in merged {
        let combined_child = if m.child_sets.is_empty() {
            None
        } else {
            Some(m.child_sets.into_iter().fold(RawSelectionSet::default(), |mut acc, cs| {
                acc.selections.extend(cs.selections);
                acc.fragments.extend(cs.fragments);
                acc
            }))
        };
        let child_set = resolve_field_and_recurse(object_type, &m.name, combined_child.as_ref(), types)?;
        selections.push(Selection {
            alias,
            name: m.name,
            args: m.args,
            child_set,
        });
    }

    Ok(NormalizedSelectionSet::Object { selections })
}

fn flatten_union(
    set: &RawSelectionSet,
    union_type: &IntrospectedType,
    types: &IndexMap<String, IntrospectedType>,
) -> Result<NormalizedSelectionSet, PlanError> {
    let mut possible: Vec<&String> = union_type.possible_types.iter().collect();
    possible.sort_unstable();

    let mut fragments = Vec::new();
    for type_name in possible {
        let concrete = types
            .get(type_name)
            .ok_or_else(|| PlanError::UnknownFragmentTarget { type_name: type_name.clone() })?;
        let child_set = flatten_object(set, concrete, types)?;
        if !child_set.is_empty() {
            fragments.push(Fragment {
                on_type_name: type_name.clone(),
                child_set,
            });
        }
    }
    Ok(NormalizedSelectionSet::Union {
        selections: Vec::new(),
        fragments,
    })
}

fn resolve_field_and_recurse(
    object_type: &IntrospectedType,
    field_name: &str,
    child_set: Option<&RawSelectionSet>,
    types: &IndexMap<String, IntrospectedType>,
) -> Result<Option<NormalizedSelectionSet>, PlanError> {
    if field_name == "__typename" {
        return if child_set.is_some() {
            Err(PlanError::ScalarHasSelection {
                type_name: object_type.name.clone(),
                field_name: field_name.to_owned(),
            })
        } else {
            Ok(None)
        };
    }

    let field = object_type.field(field_name).ok_or_else(|| PlanError::UnknownField {
        type_name: object_type.name.clone(),
        field_name: field_name.to_owned(),
    })?;

    let inner = field.type_ref.inner_named();
    let inner_kind = inner.name().and_then(|name| types.get(name)).map(|t| t.kind);

    match inner_kind {
        Some(TypeKind::Object) | Some(TypeKind::Union) => {
            let child_set = child_set.ok_or_else(|| PlanError::ObjectMissingSelection {
                type_name: object_type.name.clone(),
                field_name: field_name.to_owned(),
            })?;
            let name = inner.name().expect("checked above");
            Ok(Some(flatten(child_set, name, types)?))
        }
        _ => {
            if child_set.is_some() {
                return Err(PlanError::ScalarHasSelection {
                    type_name: object_type.name.clone(),
                    field_name: field_name.to_owned(),
                });
            }
            Ok(None)
        }
    }
}
