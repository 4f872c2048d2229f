//! S5 (§8): `s2` declares a federation key field that the `Device` root
//! object on `s1` does not expose. Merge fails with `InvalidFederationKey`.

use fedgraph::error::{FederationError, SchemaMergeError};
use fedgraph::introspection::TypeKind;
use fedgraph::introspection::TypeRef;
use fedgraph::merge::federation_keys::FEDERATION_FIELD_NAME;
use fedgraph::merge::merge_versioned_schemas;
use indexmap::IndexMap;

use crate::common::{field, field_with_args, input, input_object, object, one_version, schema, scalar};

#[test]
fn missing_key_field_on_a_root_object_fails_the_merge() {
    let s1 = schema(
        vec![],
        vec![object(
            "Device",
            vec![field("id", scalar("ID")), field(FEDERATION_FIELD_NAME, scalar("ID"))],
            // no `orgId`, which s2's declared key requires.
        )],
    );
    let s2 = schema(
        vec![],
        vec![
            input_object("DeviceKeyInput", vec![input("id", scalar("ID")), input("orgId", scalar("ID"))]),
            object(
                "Federation",
                vec![field_with_args(
                    "Device-s2",
                    vec![input(
                        "keys",
                        TypeRef::list(TypeRef::non_null(TypeRef::named(TypeKind::InputObject, "DeviceKeyInput"))),
                    )],
                    TypeRef::list(TypeRef::named(TypeKind::Object, "Device")),
                )],
            ),
        ],
    );

    let mut services = IndexMap::new();
    services.insert("s1".to_owned(), one_version(s1));
    services.insert("s2".to_owned(), one_version(s2));

    let err = merge_versioned_schemas(&services).unwrap_err();
    assert!(matches!(err, FederationError::SchemaMerge(SchemaMergeError::InvalidFederationKey { .. })));
}
