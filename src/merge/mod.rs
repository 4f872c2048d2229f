//! C2: the schema merger (§4.2).
//!
//! Combines the introspected schemas of every registered service —
//! including, per service, every version currently considered live — into
//! one `MergedSchema` the rest of the gateway plans and executes against.

pub mod enum_type;
pub mod federation_keys;
pub mod field_key;
pub mod input_object;
pub mod object;
pub mod type_ref;
pub mod union_type;

use indexmap::{IndexMap, IndexSet};

use crate::error::{FederationError, SchemaMergeError};
use crate::introspection::{IntrospectedSchema, IntrospectedType, TypeKind};
use crate::{ensure, internal_error};
use field_key::FieldKey;

/// Whether a merge combines two definitions by taking everything either
/// side declares (`Union`, used across services) or only what both sides
/// agree on (`Intersection`, used across a service's live versions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Union,
    Intersection,
}

/// The merged schema served to clients, annotated with enough provenance
/// for the planner and executor to route fields back to the services that
/// can resolve them.
#[derive(Debug, Clone)]
pub struct MergedSchema {
    pub types: IndexMap<String, IntrospectedType>,
    pub query_type_name: String,
    pub mutation_type_name: Option<String>,
    /// Every service whose per-service (post-intersection) schema still
    /// contains a given `(type, field)`.
    pub field_provenance: IndexMap<FieldKey, IndexSet<String>>,
    /// Every service that declared a given `(type, field)` as part of its
    /// `Federation.{type}-{service}(keys: ...)` join-key shape.
    pub federated_keys: IndexMap<FieldKey, IndexSet<String>>,
}

impl MergedSchema {
    pub fn query_type(&self) -> Option<&IntrospectedType> {
        self.types.get(&self.query_type_name)
    }

    pub fn mutation_type(&self) -> Option<&IntrospectedType> {
        self.mutation_type_name.as_ref().and_then(|name| self.types.get(name))
    }

    /// Services that can resolve `field` on `type_name`, per `field_provenance`.
    pub fn provenance_of(&self, type_name: &str, field_name: &str) -> Option<&IndexSet<String>> {
        self.field_provenance.get(&FieldKey::new(type_name, field_name))
    }
}

/// Merges two named types of matching kind. Scalars have nothing further to
/// reconcile beyond kind agreement; everything else dispatches to its
/// per-kind module.
fn merge_named_type(
    mode: MergeMode,
    left: &IntrospectedType,
    right: &IntrospectedType,
) -> Result<IntrospectedType, SchemaMergeError> {
    if left.kind != right.kind {
        return Err(SchemaMergeError::ConflictingKinds {
            name: left.name.clone(),
            left_kind: left.kind,
            right_kind: right.kind,
        });
    }

    match left.kind {
        TypeKind::Object => object::merge_object_type(mode, left, right),
        TypeKind::InputObject => input_object::merge_input_object_type(mode, left, right),
        TypeKind::Union => union_type::merge_union_type(mode, left, right),
        TypeKind::Enum => enum_type::merge_enum_type(mode, left, right),
        TypeKind::Scalar => Ok(left.clone()),
        TypeKind::List | TypeKind::NonNull => Err(SchemaMergeError::UnknownKind {
            name: left.name.clone(),
            kind: type_ref::type_kind_name(left.kind).to_owned(),
        }),
    }
}

/// Merges two whole schemas type-by-type, per §4.2.3.
fn merge_schema(
    mode: MergeMode,
    left: &IntrospectedSchema,
    right: &IntrospectedSchema,
) -> Result<IntrospectedSchema, SchemaMergeError> {
    let mut type_names: Vec<&str> = match mode {
        MergeMode::Union => left
            .types
            .keys()
            .chain(right.types.keys())
            .map(String::as_str)
            .collect(),
        MergeMode::Intersection => left
            .types
            .keys()
            .filter(|name| right.types.contains_key(*name))
            .map(String::as_str)
            .collect(),
    };
    type_names.sort_unstable();
    type_names.dedup();

    let mut types = IndexMap::with_capacity(type_names.len());
    for type_name in type_names {
        let merged = match (left.types.get(type_name), right.types.get(type_name)) {
            (Some(l), Some(r)) => merge_named_type(mode, l, r)?,
            (Some(l), None) => l.clone(),
            (None, Some(r)) => r.clone(),
            (None, None) => unreachable!("type name was collected from one of the two sides"),
        };
        types.insert(type_name.to_owned(), merged);
    }

    Ok(IntrospectedSchema {
        types,
        query_type_name: left.query_type_name.clone(),
        mutation_type_name: left.mutation_type_name.clone().or_else(|| right.mutation_type_name.clone()),
    })
}

/// Intersection-merges every live version of a single service into the one
/// schema that version set can jointly serve (§4.2.2 step 1).
fn merge_live_versions(
    service_name: &str,
    versions: &IndexMap<String, IntrospectedSchema>,
) -> Result<IntrospectedSchema, FederationError> {
    let mut version_names: Vec<&String> = versions.keys().collect();
    version_names.sort_unstable();

    let mut iter = version_names.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| internal_error!("service `{service_name}` has no live versions"))?;
    ensure!(versions.contains_key(first), "name was collected from this same map's keys");
    let mut acc = versions[first].clone();

    for version_name in iter {
        ensure!(versions.contains_key(version_name), "name was collected from this same map's keys");
        acc = merge_schema(MergeMode::Intersection, &acc, &versions[version_name])?;
    }

    Ok(acc)
}

fn build_field_provenance(
    merged: &IntrospectedSchema,
    per_service: &IndexMap<String, IntrospectedSchema>,
) -> IndexMap<FieldKey, IndexSet<String>> {
    let mut provenance: IndexMap<FieldKey, IndexSet<String>> = IndexMap::new();
    for (type_name, ty) in &merged.types {
        if ty.kind != TypeKind::Object {
            continue;
        }
        for field in &ty.fields {
            for (service_name, schema) in per_service {
                let resolves = schema
                    .types
                    .get(type_name)
                    .map(|t| t.field(&field.name).is_some())
                    .unwrap_or(false);
                if resolves {
                    provenance
                        .entry(FieldKey::new(type_name.clone(), field.name.clone()))
                        .or_default()
                        .insert(service_name.clone());
                }
            }
        }
    }
    provenance
}

/// `mergeVersionedSchemas(services: name→(version→IntrospectedSchema)) →
/// MergedSchema | MergeError` (§4.2.2).
#[tracing::instrument(skip(services), level = "debug")]
pub fn merge_versioned_schemas(
    services: &IndexMap<String, IndexMap<String, IntrospectedSchema>>,
) -> Result<MergedSchema, FederationError> {
    let mut service_names: Vec<&String> = services.keys().collect();
    service_names.sort_unstable();

    let mut per_service: IndexMap<String, IntrospectedSchema> = IndexMap::new();
    for service_name in service_names {
        ensure!(services.contains_key(service_name), "name was collected from this same map's keys");
        let schema = merge_live_versions(service_name, &services[service_name])?;
        tracing::debug!(service = %service_name, types = schema.types.len(), "intersection-merged live versions");
        per_service.insert(service_name.clone(), schema);
    }

    let mut merged: Option<IntrospectedSchema> = None;
    for schema in per_service.values() {
        merged = Some(match merged {
            None => schema.clone(),
            Some(acc) => merge_schema(MergeMode::Union, &acc, schema)?,
        });
    }
    let merged = merged.ok_or_else(|| internal_error!("no services were registered with the gateway"))?;
    tracing::debug!(types = merged.types.len(), services = per_service.len(), "union-merged service schemas");

    let field_provenance = build_field_provenance(&merged, &per_service);
    let federated_keys = federation_keys::detect_federated_keys(&merged, &per_service)?;

    Ok(MergedSchema {
        types: merged.types,
        query_type_name: merged.query_type_name,
        mutation_type_name: merged.mutation_type_name,
        field_provenance,
        federated_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection::Field;

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

    fn scalar_field(name: &str) -> Field {
        Field {
            name: name.to_owned(),
            args: Vec::new(),
            type_ref: crate::introspection::TypeRef::named(TypeKind::Scalar, "ID"),
        }
    }

    fn schema_with(query_fields: Vec<Field>, extra: Vec<IntrospectedType>) -> IntrospectedSchema {
        let mut types: IndexMap<String, IntrospectedType> =
            extra.into_iter().map(|t| (t.name.clone(), t)).collect();
        let query = obj("Query", query_fields);
        types.insert(query.name.clone(), query);
        IntrospectedSchema {
            types,
            query_type_name: "Query".to_owned(),
            mutation_type_name: None,
        }
    }

    #[test]
    fn union_merges_two_services_and_records_provenance() {
        let s1 = schema_with(
            vec![scalar_field("users")],
            vec![obj("User", vec![scalar_field("id")])],
        );
        let s2 = schema_with(
            vec![],
            vec![obj("User", vec![scalar_field("email")])],
        );

        let mut versions1 = IndexMap::new();
        versions1.insert("v1".to_owned(), s1);
        let mut versions2 = IndexMap::new();
        versions2.insert("v1".to_owned(), s2);

        let mut services = IndexMap::new();
        services.insert("s1".to_owned(), versions1);
        services.insert("s2".to_owned(), versions2);

        let merged = merge_versioned_schemas(&services).unwrap();
        let user = merged.types.get("User").unwrap();
        let mut names: Vec<_> = user.fields.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["email", "id"]);

        assert_eq!(
            merged.provenance_of("User", "id"),
            Some(&IndexSet::from(["s1".to_owned()]))
        );
        assert_eq!(
            merged.provenance_of("User", "email"),
            Some(&IndexSet::from(["s2".to_owned()]))
        );
    }

    #[test]
    fn retiring_an_old_version_drops_a_field_from_provenance() {
        let old = schema_with(vec![], vec![obj("User", vec![scalar_field("id"), scalar_field("legacy")])]);
        let new = schema_with(vec![], vec![obj("User", vec![scalar_field("id")])]);

        let mut versions = IndexMap::new();
        versions.insert("old".to_owned(), old);
        versions.insert("new".to_owned(), new);
        let mut services = IndexMap::new();
        services.insert("s1".to_owned(), versions);

        let merged = merge_versioned_schemas(&services).unwrap();
        assert!(merged.provenance_of("User", "legacy").is_none());
        assert!(merged.provenance_of("User", "id").is_some());
    }

    #[test]
    fn conflicting_kinds_fail() {
        let mut s1_type = obj("Color", vec![]);
        s1_type.kind = TypeKind::Object;
        let mut s2_type = obj("Color", vec![]);
        s2_type.kind = TypeKind::Enum;

        let s1 = schema_with(vec![], vec![s1_type]);
        let s2 = schema_with(vec![], vec![s2_type]);

        let mut versions1 = IndexMap::new();
        versions1.insert("v1".to_owned(), s1);
        let mut versions2 = IndexMap::new();
        versions2.insert("v1".to_owned(), s2);
        let mut services = IndexMap::new();
        services.insert("s1".to_owned(), versions1);
        services.insert("s2".to_owned(), versions2);

        let err = merge_versioned_schemas(&services).unwrap_err();
        assert!(matches!(err, FederationError::SchemaMerge(SchemaMergeError::ConflictingKinds { .. })));
    }
}
