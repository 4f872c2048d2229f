//! S2 (§8): union dispatch. `Everyone` fans out to `Admin`/`User`
//! fragments; `User.email` additionally joins to a second service, so the
//! resulting subplan's path carries a `Type` step alongside the `Field`
//! step for the union-typed field itself.

use std::sync::Arc;

use fedgraph::config::{Gateway, GatewayConfig};
use fedgraph::executor::ExecutorClient;
use fedgraph::introspection::TypeKind;
use fedgraph::introspection::TypeRef;
use fedgraph::merge::federation_keys::FEDERATION_FIELD_NAME;
use fedgraph::normalize::{flatten, RawFragment, RawSelection, RawSelectionSet};
use fedgraph::plan::{plan_root, PathStep, PathStepKind, PlanKind};
use fedgraph::test_support::StubExecutorClient;
use indexmap::IndexMap;
use serde_json_bytes::{json, Value};

use crate::common::{field, field_with_args, input, input_object, object, one_version, schema, scalar, union};

fn leaf(name: &str) -> RawSelection {
    RawSelection { alias: None, name: name.to_owned(), args: IndexMap::new(), child_set: None }
}

fn build_gateway(s1: Arc<dyn ExecutorClient>, s2: Arc<dyn ExecutorClient>) -> Gateway {
    let s1_schema = schema(
        vec![field_with_args("everyone", vec![], TypeRef::list(TypeRef::named(TypeKind::Union, "Everyone")))],
        vec![
            union("Everyone", &["Admin", "User"]),
            object("Admin", vec![field("id", scalar("ID")), field("hiding", scalar("Boolean"))]),
            object("User", vec![field("id", scalar("ID")), field(FEDERATION_FIELD_NAME, scalar("ID"))]),
        ],
    );
    let s2_schema = schema(
        vec![],
        vec![
            object("User", vec![field("email", scalar("String"))]),
            input_object("UserKeyInput", vec![input("id", scalar("ID"))]),
            object(
                "Federation",
                vec![field_with_args(
                    "User-s2",
                    vec![input("keys", TypeRef::list(TypeRef::non_null(TypeRef::named(TypeKind::InputObject, "UserKeyInput"))))],
                    TypeRef::list(TypeRef::named(TypeKind::Object, "User")),
                )],
            ),
        ],
    );

    let mut services: IndexMap<String, Arc<dyn ExecutorClient>> = IndexMap::new();
    services.insert("s1".to_owned(), s1);
    services.insert("s2".to_owned(), s2);

    let mut schemas = IndexMap::new();
    schemas.insert("s1".to_owned(), one_version(s1_schema));
    schemas.insert("s2".to_owned(), one_version(s2_schema));

    let config = GatewayConfig { services, max_evaluated_plans: 1000, register_introspection: false };
    Gateway::build(config, schemas).unwrap()
}

fn everyone_query() -> RawSelectionSet {
    RawSelectionSet {
        selections: vec![RawSelection {
            alias: None,
            name: "everyone".to_owned(),
            args: IndexMap::new(),
            child_set: Some(RawSelectionSet {
                selections: Vec::new(),
                fragments: vec![
                    RawFragment {
                        on_type_name: "Admin".to_owned(),
                        child_set: RawSelectionSet { selections: vec![leaf("id"), leaf("hiding")], fragments: Vec::new() },
                    },
                    RawFragment {
                        on_type_name: "User".to_owned(),
                        child_set: RawSelectionSet { selections: vec![leaf("id"), leaf("email")], fragments: Vec::new() },
                    },
                ],
            }),
        }],
        fragments: Vec::new(),
    }
}

#[tokio::test]
async fn per_type_fragment_becomes_an_independent_subplan_with_a_type_step() {
    let mut s1_responses = IndexMap::new();
    s1_responses.insert(
        "everyone".to_owned(),
        json!({"everyone": [
            {"__typename": "Admin", "id": "10", "hiding": true},
            {"__typename": "User", "id": "1", "__federation": "1"},
        ]}),
    );
    let s1: Arc<dyn ExecutorClient> = Arc::new(StubExecutorClient::new(s1_responses));

    let mut s2_responses = IndexMap::new();
    s2_responses.insert(
        "User-s2".to_owned(),
        json!({"__federation": {"User-s2": [{"email": "a@example.com"}]}}),
    );
    let s2: Arc<dyn ExecutorClient> = Arc::new(StubExecutorClient::new(s2_responses));

    let gateway = build_gateway(s1, s2);

    let normalized = flatten(&everyone_query(), &gateway.schema.query_type_name, &gateway.schema.types).unwrap();
    let plan = plan_root(PlanKind::Query, &normalized, &gateway.schema, gateway.max_evaluated_plans).unwrap();

    let s1_plan = &plan.after[0];
    assert_eq!(s1_plan.service, "s1");
    assert_eq!(s1_plan.after.len(), 1);
    assert_eq!(
        s1_plan.after[0].path,
        vec![
            PathStep { kind: PathStepKind::Field, name: "everyone".to_owned() },
            PathStep { kind: PathStepKind::Type, name: "User".to_owned() },
        ]
    );

    let (result, _metadata) = gateway.executor.execute(&plan, Value::Null).await.unwrap();
    assert_eq!(
        result,
        json!({"everyone": [
            {"__typename": "Admin", "id": "10", "hiding": true},
            {"__typename": "User", "id": "1", "email": "a@example.com"},
        ]})
    );
}
