//! C10: in-process `ExecutorClient` test double, used both by unit tests
//! colocated with each module and by the scenario tests under `tests/`
//! (§4.10). Not `#[cfg(test)]`-gated since integration tests need it too.

use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json_bytes::Value;

use crate::error::ExecuteError;
use crate::executor::{ExecutorClient, SubqueryRequest, SubqueryResponse};
use crate::merge::federation_keys::FEDERATION_FIELD_NAME;

/// Matches an incoming subquery to a caller-registered canned JSON response
/// by the alias of its single top-level selection, unwrapping one
/// `__federation` level so a join request like
/// `{ __federation { "User-s2"(keys: ...) { ... } } }` is looked up under
/// `"User-s2"` rather than `"__federation"`.
pub struct StubExecutorClient {
    responses: Mutex<IndexMap<String, Value>>,
}

impl StubExecutorClient {
    pub fn new(responses: IndexMap<String, Value>) -> Self {
        StubExecutorClient { responses: Mutex::new(responses) }
    }

    fn key_for(request: &SubqueryRequest) -> Option<String> {
        let selections = request.selection_set.as_object()?;
        let first = selections.first()?;
        if first.name == FEDERATION_FIELD_NAME {
            let nested = first.child_set.as_ref()?.as_object()?;
            return nested.first().map(|s| s.alias.clone());
        }
        Some(first.alias.clone())
    }
}

#[async_trait]
impl ExecutorClient for StubExecutorClient {
    async fn execute(&self, request: SubqueryRequest) -> Result<SubqueryResponse, ExecuteError> {
        let key = Self::key_for(&request).ok_or_else(|| ExecuteError::MalformedResponse {
            service: "stub".to_owned(),
            message: "could not derive a lookup key for this request".to_owned(),
        })?;
        let responses = self.responses.lock().expect("stub response map mutex poisoned");
        let result = responses.get(&key).cloned().ok_or_else(|| ExecuteError::SubqueryFailed {
            service: "stub".to_owned(),
            message: format!("no canned response registered for `{key}`"),
        })?;
        Ok(SubqueryResponse { result, metadata: Value::Null })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{NormalizedSelectionSet, Selection};
    use crate::plan::PlanKind;
    use serde_json_bytes::json;

    fn leaf(name: &str) -> Selection {
        Selection { alias: name.to_owned(), name: name.to_owned(), args: IndexMap::new(), child_set: None }
    }

    #[tokio::test]
    async fn matches_top_level_field_by_alias() {
        let mut responses = IndexMap::new();
        responses.insert("users".to_owned(), json!({"users": []}));
        let client = StubExecutorClient::new(responses);

        let request = SubqueryRequest {
            kind: PlanKind::Query,
            selection_set: NormalizedSelectionSet::Object { selections: vec![leaf("users")] },
            metadata: Value::Null,
        };
        let response = client.execute(request).await.unwrap();
        assert_eq!(response.result, json!({"users": []}));
    }

    #[tokio::test]
    async fn matches_federation_wrapped_field_by_inner_alias() {
        let mut responses = IndexMap::new();
        responses.insert("User-s2".to_owned(), json!({"__federation": {"User-s2": [{"email": "a@example.com"}]}}));
        let client = StubExecutorClient::new(responses);

        let inner = Selection {
            alias: "User-s2".to_owned(),
            name: "User-s2".to_owned(),
            args: IndexMap::new(),
            child_set: Some(NormalizedSelectionSet::Object { selections: vec![leaf("email")] }),
        };
        let request = SubqueryRequest {
            kind: PlanKind::Query,
            selection_set: NormalizedSelectionSet::Object {
                selections: vec![Selection {
                    alias: FEDERATION_FIELD_NAME.to_owned(),
                    name: FEDERATION_FIELD_NAME.to_owned(),
                    args: IndexMap::new(),
                    child_set: Some(NormalizedSelectionSet::Object { selections: vec![inner] }),
                }],
            },
            metadata: Value::Null,
        };
        let response = client.execute(request).await.unwrap();
        let list = response.result.as_object().unwrap().get("__federation").unwrap().as_object().unwrap().get("User-s2").unwrap();
        assert!(list.is_array());
    }

    #[tokio::test]
    async fn unregistered_request_fails() {
        let client = StubExecutorClient::new(IndexMap::new());
        let request = SubqueryRequest {
            kind: PlanKind::Query,
            selection_set: NormalizedSelectionSet::Object { selections: vec![leaf("users")] },
            metadata: Value::Null,
        };
        let err = client.execute(request).await.unwrap_err();
        assert!(matches!(err, ExecuteError::SubqueryFailed { .. }));
    }
}
