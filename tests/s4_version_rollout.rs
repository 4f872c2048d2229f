//! S4 (§8): version rollout. `s1`'s old version exposes a field its new
//! version has dropped; the intersection across `s1`'s own live versions
//! drops that field before the union across services ever sees it, so a
//! second service can still expose the (differently-sourced) same field.

use fedgraph::merge::field_key::FieldKey;
use fedgraph::merge::merge_versioned_schemas;
use indexmap::{IndexMap, IndexSet};

use crate::common::{field, schema, scalar};

#[test]
fn retired_field_on_one_service_does_not_block_another_service_from_exposing_it() {
    let s1_old = schema(vec![field("a", scalar("String")), field("b", scalar("String"))], vec![]);
    let s1_new = schema(vec![field("b", scalar("String"))], vec![]);
    let mut s1_versions = IndexMap::new();
    s1_versions.insert("old".to_owned(), s1_old);
    s1_versions.insert("new".to_owned(), s1_new);

    let s2 = schema(vec![field("a", scalar("String"))], vec![]);
    let mut s2_versions = IndexMap::new();
    s2_versions.insert("v1".to_owned(), s2);

    let mut services = IndexMap::new();
    services.insert("s1".to_owned(), s1_versions);
    services.insert("s2".to_owned(), s2_versions);

    let merged = merge_versioned_schemas(&services).unwrap();

    assert!(merged.query_type().unwrap().field("a").is_some());
    assert!(merged.query_type().unwrap().field("b").is_some());
    assert_eq!(
        merged.field_provenance.get(&FieldKey::new("Query", "a")),
        Some(&IndexSet::from(["s2".to_owned()]))
    );
    assert_eq!(
        merged.field_provenance.get(&FieldKey::new("Query", "b")),
        Some(&IndexSet::from(["s1".to_owned()]))
    );
}
