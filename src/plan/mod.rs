//! C4: walks the normalized tree and the merged schema, producing a tree of
//! per-service subqueries with join paths (§4.4).

use indexmap::IndexMap;

use crate::error::{FederationError, PlanError};
use crate::introspection::{IntrospectedType, TypeKind};
use crate::{ensure, internal_error};
use crate::merge::federation_keys::FEDERATION_FIELD_NAME;
use crate::merge::MergedSchema;
use crate::normalize::{Fragment, NormalizedSelectionSet, Selection};

/// The reserved service name of the synthetic root plan node.
pub const GATEWAY_COORDINATOR: &str = "gateway-coordinator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Query,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStepKind {
    Field,
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub kind: PathStepKind,
    pub name: String,
}

/// A tree node describing which service resolves which subselection and
/// how the executor should join its result back to its parent.
#[derive(Debug, Clone)]
pub struct Plan {
    pub service: String,
    pub kind: PlanKind,
    pub type_name: String,
    pub selection_set: NormalizedSelectionSet,
    pub path: Vec<PathStep>,
    pub after: Vec<Plan>,
}

/// Generalizes `QueryPlannerDebugConfig.max_evaluated_plans` from "number of
/// alternative plans considered" (this planner never backtracks) to "total
/// selections planned" (§4.4 ADDED).
struct PlanBudget {
    limit: u32,
    used: u32,
}

impl PlanBudget {
    fn consume(&mut self, n: u32) -> Result<(), PlanError> {
        self.used += n;
        if self.used > self.limit {
            return Err(PlanError::EvaluationCapExceeded { limit: self.limit });
        }
        Ok(())
    }
}

/// `planRoot(query) → Plan` (§4.4).
#[tracing::instrument(skip(selection_set, schema), level = "debug")]
pub fn plan_root(
    kind: PlanKind,
    selection_set: &NormalizedSelectionSet,
    schema: &MergedSchema,
    max_evaluated_plans: u32,
) -> Result<Plan, FederationError> {
    let mut budget = PlanBudget { limit: max_evaluated_plans, used: 0 };

    let root_type_name = match kind {
        PlanKind::Query => schema.query_type_name.clone(),
        PlanKind::Mutation => schema
            .mutation_type_name
            .clone()
            .ok_or_else(|| internal_error!("mutation requested but the merged schema has no mutation type"))?,
    };

    let selections = selection_set
        .as_object()
        .ok_or_else(|| internal_error!("root selection set for `{root_type_name}` must be object-shaped"))?;

    let mut by_service: IndexMap<String, Vec<Selection>> = IndexMap::new();
    for selection in selections {
        budget.consume(1)?;
        let services = schema
            .provenance_of(&root_type_name, &selection.name)
            .cloned()
            .ok_or_else(|| PlanError::UnknownField {
                type_name: root_type_name.clone(),
                field_name: selection.name.clone(),
            })?;
        let mut service_names: Vec<&String> = services.iter().collect();
        service_names.sort_unstable();
        for service in service_names {
            by_service.entry(service.clone()).or_default().push(selection.clone());
        }
    }

    let mut service_names: Vec<&String> = by_service.keys().collect();
    service_names.sort_unstable();

    let mut after = Vec::with_capacity(service_names.len());
    for service in service_names {
        ensure!(by_service.contains_key(service), "name was collected from this same map's keys");
        let mut plan = plan_object_for_service(schema, kind, &root_type_name, service, &by_service[service], &mut budget)?;
        reverse_all(&mut plan);
        after.push(plan);
    }
    tracing::debug!(fields = selections.len(), subplans = after.len(), "planned root query");

    Ok(Plan {
        service: GATEWAY_COORDINATOR.to_owned(),
        kind,
        type_name: root_type_name,
        selection_set: NormalizedSelectionSet::Object { selections: Vec::new() },
        path: Vec::new(),
        after,
    })
}

fn plan_object_for_service(
    schema: &MergedSchema,
    kind: PlanKind,
    type_name: &str,
    service: &str,
    selections: &[Selection],
    budget: &mut PlanBudget,
) -> Result<Plan, FederationError> {
    let set = NormalizedSelectionSet::Object { selections: selections.to_vec() };
    let (own_set, after) = plan_type(schema, kind, type_name, service, &set, budget)?;
    Ok(Plan {
        service: service.to_owned(),
        kind,
        type_name: type_name.to_owned(),
        selection_set: own_set,
        path: Vec::new(),
        after,
    })
}

fn plan_type(
    schema: &MergedSchema,
    kind: PlanKind,
    type_name: &str,
    current_service: &str,
    selection_set: &NormalizedSelectionSet,
    budget: &mut PlanBudget,
) -> Result<(NormalizedSelectionSet, Vec<Plan>), FederationError> {
    let ty = schema.types.get(type_name).ok_or_else(|| internal_error!("plan references unknown type `{type_name}`"))?;
    match ty.kind {
        TypeKind::Object => plan_object(schema, kind, ty, current_service, selection_set, budget),
        TypeKind::Union => plan_union(schema, kind, ty, current_service, selection_set, budget),
        _ => Err(internal_error!("cannot plan a selection set against non-object/union type `{type_name}`")),
    }
}

/// Object planning (§4.4), given the `current` service resolving `object_type`.
fn plan_object(
    schema: &MergedSchema,
    kind: PlanKind,
    object_type: &IntrospectedType,
    current_service: &str,
    selection_set: &NormalizedSelectionSet,
    budget: &mut PlanBudget,
) -> Result<(NormalizedSelectionSet, Vec<Plan>), FederationError> {
    let selections = selection_set
        .as_object()
        .ok_or_else(|| internal_error!("expected object-shaped selection set for `{}`", object_type.name))?;

    // Step 1: partition into `local` vs `byService`.
    let mut local: Vec<Selection> = Vec::new();
    let mut by_service: IndexMap<String, Vec<Selection>> = IndexMap::new();

    for selection in selections {
        budget.consume(1)?;
        if selection.name == "__typename" {
            local.push(selection.clone());
            continue;
        }
        let services = schema.provenance_of(&object_type.name, &selection.name).ok_or_else(|| PlanError::UnknownField {
            type_name: object_type.name.clone(),
            field_name: selection.name.clone(),
        })?;
        if services.contains(current_service) {
            local.push(selection.clone());
        } else {
            let mut candidates: Vec<&String> = services.iter().collect();
            candidates.sort_unstable();
            let other = candidates.first().ok_or_else(|| PlanError::UnknownField {
                type_name: object_type.name.clone(),
                field_name: selection.name.clone(),
            })?;
            by_service.entry((*other).clone()).or_default().push(selection.clone());
        }
    }

    // Step 2: recurse into `local` selections, still in `current_service`.
    let mut own_selections = Vec::with_capacity(local.len());
    let mut after: Vec<Plan> = Vec::new();

    for selection in local {
        if selection.name == "__typename" || selection.child_set.is_none() {
            own_selections.push(selection);
            continue;
        }
        let field = object_type.field(&selection.name).ok_or_else(|| PlanError::UnknownField {
            type_name: object_type.name.clone(),
            field_name: selection.name.clone(),
        })?;
        let field_type_name = field
            .type_ref
            .inner_named()
            .name()
            .ok_or_else(|| internal_error!("field `{}.{}` has no named type", object_type.name, selection.name))?;

        let child_set = selection.child_set.as_ref().expect("checked above");
        let (child_own_set, mut child_after) = plan_type(schema, kind, field_type_name, current_service, child_set, budget)?;
        for plan in &mut child_after {
            plan.path.push(PathStep { kind: PathStepKind::Field, name: selection.alias.clone() });
        }
        after.append(&mut child_after);

        own_selections.push(Selection {
            alias: selection.alias,
            name: selection.name,
            args: selection.args,
            child_set: Some(child_own_set),
        });
    }

    // Step 3: one subplan per foreign service, sorted by name.
    let mut foreign_services: Vec<&String> = by_service.keys().collect();
    foreign_services.sort_unstable();
    let any_foreign = !foreign_services.is_empty();

    for service in foreign_services {
        ensure!(by_service.contains_key(service), "name was collected from this same map's keys");
        let plan = plan_object_for_service(schema, kind, &object_type.name, service, &by_service[service], budget)?;
        after.push(plan);
    }

    // Step 4: inject `__federation` if any child needs a join key.
    if any_foreign {
        match own_selections.iter().find(|s| s.alias == FEDERATION_FIELD_NAME) {
            Some(existing) if existing.name != FEDERATION_FIELD_NAME => {
                return Err(PlanError::AliasConflict {
                    alias: FEDERATION_FIELD_NAME.to_owned(),
                    first: existing.name.clone(),
                    second: FEDERATION_FIELD_NAME.to_owned(),
                }
                .into());
            }
            Some(_) => {}
            None => {
                own_selections.push(Selection {
                    alias: FEDERATION_FIELD_NAME.to_owned(),
                    name: FEDERATION_FIELD_NAME.to_owned(),
                    args: IndexMap::new(),
                    child_set: None,
                });
            }
        }
    }

    Ok((NormalizedSelectionSet::Object { selections: own_selections }, after))
}

/// Union planning (§4.4).
fn plan_union(
    schema: &MergedSchema,
    kind: PlanKind,
    union_type: &IntrospectedType,
    current_service: &str,
    selection_set: &NormalizedSelectionSet,
    budget: &mut PlanBudget,
) -> Result<(NormalizedSelectionSet, Vec<Plan>), FederationError> {
    let fragments = selection_set
        .as_union()
        .ok_or_else(|| internal_error!("expected union-shaped selection set for `{}`", union_type.name))?;

    budget.consume(1)?; // the synthesized `__typename`

    let mut own_fragments = Vec::with_capacity(fragments.len());
    let mut after = Vec::new();

    for fragment in fragments {
        budget.consume(1)?;
        let concrete = schema
            .types
            .get(&fragment.on_type_name)
            .ok_or_else(|| PlanError::UnknownFragmentTarget { type_name: fragment.on_type_name.clone() })?;
        let (child_own_set, mut child_after) = plan_object(schema, kind, concrete, current_service, &fragment.child_set, budget)?;
        for plan in &mut child_after {
            plan.path.push(PathStep { kind: PathStepKind::Type, name: fragment.on_type_name.clone() });
        }
        after.append(&mut child_after);
        own_fragments.push(Fragment {
            on_type_name: fragment.on_type_name.clone(),
            child_set: child_own_set,
        });
    }

    let typename_selection = Selection {
        alias: "__typename".to_owned(),
        name: "__typename".to_owned(),
        args: IndexMap::new(),
        child_set: None,
    };

    Ok((
        NormalizedSelectionSet::Union {
            selections: vec![typename_selection],
            fragments: own_fragments,
        },
        after,
    ))
}

fn reverse_all(plan: &mut Plan) {
    plan.path.reverse();
    for child in &mut plan.after {
        reverse_all(child);
    }
}
