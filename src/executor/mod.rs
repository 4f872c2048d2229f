//! C5: runs a `Plan` concurrently against the registered services, follows
//! join paths, and merges results (§4.5).

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json_bytes::Value;
use tokio::sync::{watch, Mutex};

use crate::error::{ExecuteError, FederationError};
use crate::internal_error;
use crate::merge::federation_keys::FEDERATION_FIELD_NAME;
use crate::merge::MergedSchema;
use crate::normalize::{NormalizedSelectionSet, Selection};
use crate::plan::{Plan, PathStep, PathStepKind, PlanKind, GATEWAY_COORDINATOR};

/// Opaque per-request context threaded through `ExecutorClient::execute`
/// (§9: "Metadata is opaque values, not a typed tree").
pub type Metadata = Value;

#[derive(Debug, Clone)]
pub struct SubqueryRequest {
    pub kind: PlanKind,
    pub selection_set: NormalizedSelectionSet,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct SubqueryResponse {
    pub result: Value,
    pub metadata: Metadata,
}

/// The single outbound port (§6): any transport plugs in behind this trait.
#[async_trait]
pub trait ExecutorClient: Send + Sync {
    async fn execute(&self, request: SubqueryRequest) -> Result<SubqueryResponse, ExecuteError>;
}

/// An address into the in-flight result tree: a path of object-field and
/// array-index steps, recorded while following a child plan's `path` so the
/// child's response can be merged back into exactly the objects it was
/// joined from.
#[derive(Debug, Clone)]
enum Addr {
    Field(String),
    Index(usize),
}

fn addr_to_string(addr: &[Addr]) -> String {
    addr.iter()
        .map(|a| match a {
            Addr::Field(name) => name.clone(),
            Addr::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn path_to_string(path: &[PathStep]) -> String {
    path.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(".")
}

pub struct Executor {
    schema: Arc<MergedSchema>,
    clients: IndexMap<String, Arc<dyn ExecutorClient>>,
}

impl Executor {
    pub fn new(schema: Arc<MergedSchema>, clients: IndexMap<String, Arc<dyn ExecutorClient>>) -> Self {
        Executor { schema, clients }
    }

    /// `execute(ctx, query, metadata) → (result, perSubqueryMetadata[])` (§4.5).
    #[tracing::instrument(skip(self, plan, metadata), level = "debug")]
    pub async fn execute(&self, plan: &Plan, metadata: Metadata) -> Result<(Value, Vec<Metadata>), FederationError> {
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let completed: Arc<Mutex<Vec<Metadata>>> = Arc::new(Mutex::new(Vec::new()));

        let mut result = self.run(plan, None, &metadata, &cancel_tx, &completed).await?;
        strip_federation(&mut result);

        let metadata_list = completed.lock().await.clone();
        Ok((result, metadata_list))
    }

    #[async_recursion::async_recursion]
    async fn run(
        &self,
        plan: &Plan,
        parent_keys: Option<&[Value]>,
        request_metadata: &Metadata,
        cancel_tx: &watch::Sender<bool>,
        completed: &Arc<Mutex<Vec<Metadata>>>,
    ) -> Result<Value, FederationError> {
        if *cancel_tx.borrow() {
            return Err(ExecuteError::Cancelled.into());
        }

        if plan.service == GATEWAY_COORDINATOR {
            return self.run_coordinator(plan, request_metadata, cancel_tx, completed).await;
        }

        let mut result = self.dispatch(plan, parent_keys, request_metadata, cancel_tx, completed).await?;
        self.run_children(plan, &mut result, request_metadata, cancel_tx, completed).await?;
        Ok(result)
    }

    async fn run_coordinator(
        &self,
        plan: &Plan,
        request_metadata: &Metadata,
        cancel_tx: &watch::Sender<bool>,
        completed: &Arc<Mutex<Vec<Metadata>>>,
    ) -> Result<Value, FederationError> {
        let futures = plan.after.iter().map(|child| self.run(child, None, request_metadata, cancel_tx, completed));
        let child_results = match futures::future::try_join_all(futures).await {
            Ok(results) => results,
            Err(e) => {
                let _ = cancel_tx.send(true);
                return Err(e);
            }
        };

        let mut result = Value::Object(serde_json_bytes::Map::new());
        for (child, child_result) in plan.after.iter().zip(child_results) {
            merge_into(&mut result, child_result, &child.service)?;
        }
        Ok(result)
    }

    async fn dispatch(
        &self,
        plan: &Plan,
        parent_keys: Option<&[Value]>,
        request_metadata: &Metadata,
        cancel_tx: &watch::Sender<bool>,
        completed: &Arc<Mutex<Vec<Metadata>>>,
    ) -> Result<Value, FederationError> {
        let client = self
            .clients
            .get(&plan.service)
            .ok_or_else(|| internal_error!("no ExecutorClient registered for service `{}`", plan.service))?;

        let selection_set = match parent_keys {
            None => plan.selection_set.clone(),
            Some(keys) => wrap_with_federation(plan, keys),
        };

        let request = SubqueryRequest { kind: plan.kind, selection_set, metadata: request_metadata.clone() };

        let response = match client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                let _ = cancel_tx.send(true);
                return Err(FederationError::Execute(e));
            }
        };

        if *cancel_tx.borrow() {
            return Err(ExecuteError::Cancelled.into());
        }

        completed.lock().await.push(response.metadata.clone());

        match parent_keys {
            None => Ok(response.result),
            Some(keys) => {
                let federation_field = format!("{}-{}", plan.type_name, plan.service);
                let list = response
                    .result
                    .as_object()
                    .and_then(|obj| obj.get(FEDERATION_FIELD_NAME))
                    .and_then(|v| v.as_object())
                    .and_then(|obj| obj.get(federation_field.as_str()))
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| ExecuteError::MalformedResponse {
                        service: plan.service.clone(),
                        message: format!("response is missing __federation.{federation_field}"),
                    })?
                    .clone();
                if list.len() != keys.len() {
                    return Err(ExecuteError::KeyShapeMismatch {
                        service: plan.service.clone(),
                        path: plan.type_name.clone(),
                        expected: keys.len(),
                        got: list.len(),
                    }
                    .into());
                }
                Ok(Value::Array(list))
            }
        }
    }

    async fn run_children(
        &self,
        plan: &Plan,
        result: &mut Value,
        request_metadata: &Metadata,
        cancel_tx: &watch::Sender<bool>,
        completed: &Arc<Mutex<Vec<Metadata>>>,
    ) -> Result<(), FederationError> {
        if plan.after.is_empty() {
            return Ok(());
        }

        let mut prepared = Vec::with_capacity(plan.after.len());
        for child in &plan.after {
            let targets = collect_targets(result, &child.path, &child.service)?;
            let keys: Vec<Value> = targets.iter().map(|(_, key)| key.clone()).collect();
            let filtered_keys = self.filter_keys_for_child(&keys, child)?;
            prepared.push((child, targets, filtered_keys));
        }

        let futures = prepared
            .iter()
            .map(|(child, _, keys)| self.run(child, Some(keys), request_metadata, cancel_tx, completed));
        let child_results = match futures::future::try_join_all(futures).await {
            Ok(results) => results,
            Err(e) => {
                let _ = cancel_tx.send(true);
                return Err(e);
            }
        };

        for ((child, targets, _), child_result) in prepared.iter().zip(child_results) {
            let items = child_result.as_array().cloned().unwrap_or_default();
            if items.len() != targets.len() {
                return Err(ExecuteError::KeyShapeMismatch {
                    service: child.service.clone(),
                    path: path_to_string(&child.path),
                    expected: targets.len(),
                    got: items.len(),
                }
                .into());
            }
            for ((addr, _), item) in targets.iter().zip(items) {
                write_merge_at(result, addr, item, &child.service)?;
            }
        }
        Ok(())
    }

    /// Projects `keys` down to only the fields known to be federation keys
    /// for `child.service` on `child.type_name` (§4.2.5/§4.5). A `__federation`
    /// payload may be a struct or a bare scalar (§6); a scalar stands for the
    /// value of the type's single declared key field.
    fn filter_keys_for_child(&self, keys: &[Value], child: &Plan) -> Result<Vec<Value>, FederationError> {
        let mut allowed: Vec<&str> = self
            .schema
            .federated_keys
            .iter()
            .filter(|(field_key, services)| field_key.type_name == child.type_name && services.contains(&child.service))
            .map(|(field_key, _)| field_key.field_name.as_str())
            .collect();
        allowed.sort_unstable();

        keys.iter()
            .map(|key| match key.as_object() {
                Some(obj) => {
                    let mut filtered = serde_json_bytes::Map::new();
                    for field_name in &allowed {
                        if let Some(v) = obj.get(*field_name) {
                            filtered.insert(field_name.to_string(), v.clone());
                        }
                    }
                    Ok(Value::Object(filtered))
                }
                None => {
                    let field_name = match allowed.as_slice() {
                        [single] => *single,
                        _ => {
                            return Err(internal_error!(
                                "scalar federation key for `{}` requires exactly one declared key field, found {}",
                                child.type_name,
                                allowed.len()
                            ))
                        }
                    };
                    let mut filtered = serde_json_bytes::Map::new();
                    filtered.insert(field_name.to_string(), key.clone());
                    Ok(Value::Object(filtered))
                }
            })
            .collect()
    }
}

fn wrap_with_federation(plan: &Plan, keys: &[Value]) -> NormalizedSelectionSet {
    let federation_field_name = format!("{}-{}", plan.type_name, plan.service);
    let mut args = IndexMap::new();
    args.insert("keys".to_owned(), Value::Array(keys.to_vec()));

    let federation_call = Selection {
        alias: federation_field_name.clone(),
        name: federation_field_name,
        args,
        child_set: Some(plan.selection_set.clone()),
    };

    NormalizedSelectionSet::Object {
        selections: vec![Selection {
            alias: FEDERATION_FIELD_NAME.to_owned(),
            name: FEDERATION_FIELD_NAME.to_owned(),
            args: IndexMap::new(),
            child_set: Some(NormalizedSelectionSet::Object { selections: vec![federation_call] }),
        }],
    }
}

/// Walks `path` from `result`, fanning out elementwise over any list
/// encountered, and collects each leaf object's `__federation` value
/// alongside the address it was found at.
fn collect_targets(result: &Value, path: &[PathStep], service: &str) -> Result<Vec<(Vec<Addr>, Value)>, FederationError> {
    let mut out = Vec::new();
    walk_path(Vec::new(), result, path, service, &mut out)?;
    Ok(out)
}

fn walk_path(
    addr: Vec<Addr>,
    value: &Value,
    path: &[PathStep],
    service: &str,
    out: &mut Vec<(Vec<Addr>, Value)>,
) -> Result<(), FederationError> {
    if let Some(items) = value.as_array() {
        for (i, item) in items.iter().enumerate() {
            let mut next_addr = addr.clone();
            next_addr.push(Addr::Index(i));
            walk_path(next_addr, item, path, service, out)?;
        }
        return Ok(());
    }

    match path.split_first() {
        None => {
            let obj = value
                .as_object()
                .ok_or_else(|| internal_error!("join target at `{}` is not an object", addr_to_string(&addr)))?;
            let key = obj.get(FEDERATION_FIELD_NAME).cloned().ok_or_else(|| ExecuteError::FederationKeyMissing {
                service: service.to_owned(),
                path: addr_to_string(&addr),
            })?;
            out.push((addr, key));
            Ok(())
        }
        Some((step, rest)) => match step.kind {
            PathStepKind::Field => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| internal_error!("path step `{}` expects an object at `{}`", step.name, addr_to_string(&addr)))?;
                let child = obj
                    .get(step.name.as_str())
                    .ok_or_else(|| internal_error!("path step `{}` missing at `{}`", step.name, addr_to_string(&addr)))?;
                let mut next_addr = addr.clone();
                next_addr.push(Addr::Field(step.name.clone()));
                walk_path(next_addr, child, rest, service, out)
            }
            PathStepKind::Type => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| internal_error!("type-filter step expects an object at `{}`", addr_to_string(&addr)))?;
                let typename = obj.get("__typename").and_then(|v| v.as_str()).unwrap_or_default();
                if typename == step.name {
                    walk_path(addr, value, rest, service, out)
                } else {
                    Ok(())
                }
            }
        },
    }
}

fn navigate_mut<'a>(value: &'a mut Value, addr: &[Addr]) -> Result<&'a mut Value, FederationError> {
    let mut current = value;
    for a in addr {
        current = match a {
            Addr::Field(name) => current
                .as_object_mut()
                .and_then(|o| o.get_mut(name.as_str()))
                .ok_or_else(|| internal_error!("merge address missing field `{name}`"))?,
            Addr::Index(i) => current
                .as_array_mut()
                .and_then(|arr| arr.get_mut(*i))
                .ok_or_else(|| internal_error!("merge address missing index `{i}`"))?,
        };
    }
    Ok(current)
}

fn write_merge_at(result: &mut Value, addr: &[Addr], incoming: Value, service: &str) -> Result<(), FederationError> {
    let target = navigate_mut(result, addr)?;
    merge_into(target, incoming, service)
}

/// Merges `incoming`'s fields into `target`. A key already present must
/// carry an identical value, unless it's the `__key` sentinel duplicated
/// across services (§4.5, §9 "merge-and-check always").
fn merge_into(target: &mut Value, incoming: Value, service: &str) -> Result<(), FederationError> {
    let incoming_obj = match incoming {
        Value::Object(map) => map,
        _ => return Err(internal_error!("service `{service}` returned a non-object merge value")),
    };
    let target_obj = target
        .as_object_mut()
        .ok_or_else(|| internal_error!("merge target for `{service}` is not an object"))?;

    for (key, value) in incoming_obj.into_iter() {
        match target_obj.get(&key) {
            None => {
                target_obj.insert(key, value);
            }
            Some(existing) if *existing == value || key.as_str() == "__key" => {}
            Some(_) => {
                return Err(ExecuteError::MergeKeyConflict {
                    key: key.as_str().to_owned(),
                    service: service.to_owned(),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn strip_federation(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove(FEDERATION_FIELD_NAME);
            for (_, v) in map.iter_mut() {
                strip_federation(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strip_federation(item);
            }
        }
        _ => {}
    }
}
