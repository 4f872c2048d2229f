//! C1: in-memory representation of a single service's introspected schema.
//!
//! This is a faithful (if partial — we only decode what the rest of the
//! engine needs) decoding of the standard GraphQL introspection JSON shape,
//! so a real downstream service's `__schema` response can be fed in via
//! `serde_json` without any bespoke adapter.

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;

/// The kind of a GraphQL type, as reported by introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, strum_macros::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    InputObject,
    Union,
    Enum,
    List,
    NonNull,
}

impl TypeKind {
    /// Named kinds carry a `name`; wrapper kinds carry an `of_type` instead.
    pub fn is_wrapper(self) -> bool {
        matches!(self, TypeKind::List | TypeKind::NonNull)
    }
}

/// A recursive type reference: `{kind, name, ofType}`.
///
/// Invariant: `List`/`NonNull` always carry a non-null `of_type`; named
/// kinds always carry a non-empty `name`. This invariant is enforced by
/// construction (the two constructors below) and by `Deserialize`, which
/// validates it after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "RawTypeRef")]
pub struct TypeRef {
    pub kind: TypeKind,
    pub name: Option<String>,
    pub of_type: Option<Box<TypeRef>>,
}

impl TypeRef {
    pub fn named(kind: TypeKind, name: impl Into<String>) -> Self {
        debug_assert!(!kind.is_wrapper());
        TypeRef {
            kind,
            name: Some(name.into()),
            of_type: None,
        }
    }

    pub fn list(of_type: TypeRef) -> Self {
        TypeRef {
            kind: TypeKind::List,
            name: None,
            of_type: Some(Box::new(of_type)),
        }
    }

    pub fn non_null(of_type: TypeRef) -> Self {
        TypeRef {
            kind: TypeKind::NonNull,
            name: None,
            of_type: Some(Box::new(of_type)),
        }
    }

    pub fn is_non_null(&self) -> bool {
        self.kind == TypeKind::NonNull
    }

    pub fn is_list(&self) -> bool {
        self.kind == TypeKind::List
    }

    /// Strips a leading `NonNull` wrapper, if present.
    pub fn nullable(&self) -> &TypeRef {
        if self.kind == TypeKind::NonNull {
            self.of_type.as_ref().expect("NonNull always has of_type")
        } else {
            self
        }
    }

    /// The element type of a `List`. Panics if this isn't a list — callers
    /// are expected to check `is_list()` first, mirroring how this codebase
    /// treats type-shape mismatches as a caller bug rather than routing
    /// them through `Result`.
    pub fn item_type(&self) -> &TypeRef {
        self.of_type.as_ref().expect("List always has of_type")
    }

    /// Unwraps every `List`/`NonNull` wrapper down to the named type.
    pub fn inner_named(&self) -> &TypeRef {
        let mut current = self;
        while current.kind.is_wrapper() {
            current = current.of_type.as_ref().expect("wrapper always has of_type");
        }
        current
    }

    pub fn name(&self) -> Option<&str> {
        self.inner_named().name.as_deref()
    }

    /// Resolves this type-ref through a named-type table into a concrete
    /// `IntrospectedType`. Only meaningful for non-wrapper refs (callers
    /// typically call `inner_named()` first).
    pub fn resolve<'a>(
        &self,
        types: &'a IndexMap<String, IntrospectedType>,
    ) -> Option<&'a IntrospectedType> {
        self.name().and_then(|name| types.get(name))
    }
}

impl fmt::Display for TypeRef {
    /// `T!`, `[T]`, `[T!]!`, etc — matches GraphQL SDL type syntax.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::NonNull => write!(f, "{}!", self.of_type.as_ref().expect("checked above")),
            TypeKind::List => write!(f, "[{}]", self.of_type.as_ref().expect("checked above")),
            _ => write!(f, "{}", self.name.as_deref().unwrap_or("<unnamed>")),
        }
    }
}

/// The untyped JSON shape introspection actually sends (`{kind, name,
/// ofType}`), used as the deserialization target before we validate the
/// wrapper/name invariant and build the recursive `TypeRef`.
#[derive(Deserialize)]
struct RawTypeRef {
    kind: TypeKind,
    name: Option<String>,
    #[serde(rename = "ofType")]
    of_type: Option<Box<RawTypeRef>>,
}

impl TryFrom<RawTypeRef> for TypeRef {
    type Error = String;

    fn try_from(raw: RawTypeRef) -> Result<Self, Self::Error> {
        if raw.kind.is_wrapper() {
            let of_type = raw
                .of_type
                .ok_or_else(|| format!("{:?} type-ref is missing ofType", raw.kind))?;
            Ok(TypeRef {
                kind: raw.kind,
                name: None,
                of_type: Some(Box::new(TypeRef::try_from(*of_type)?)),
            })
        } else {
            let name = raw
                .name
                .filter(|n| !n.is_empty())
                .ok_or_else(|| format!("{:?} type-ref is missing a name", raw.kind))?;
            Ok(TypeRef {
                kind: raw.kind,
                name: Some(name),
                of_type: None,
            })
        }
    }
}

/// One argument of a field, or one value of an input object.
#[derive(Debug, Clone, Deserialize)]
pub struct InputValue {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

/// One field of an object or interface type.
#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub args: Vec<InputValue>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

/// One value of an enum type.
#[derive(Debug, Clone, Deserialize)]
pub struct EnumValue {
    pub name: String,
}

/// A single named type as reported by introspection. Only the fields
/// matching `kind` are populated; the rest are empty by construction.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectedType {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, rename = "inputFields")]
    pub input_fields: Vec<InputValue>,
    #[serde(default, rename = "possibleTypes")]
    pub possible_types: Vec<String>,
    #[serde(default, rename = "enumValues")]
    pub enum_values: Vec<EnumValue>,
}

impl IntrospectedType {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single service's introspected schema, as decoded from `__schema`.
///
/// Invariant: each type name appears at most once (`types` is keyed by
/// name, so a duplicate simply overwrites — callers that care about
/// detecting duplicate definitions should check before inserting).
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectedSchema {
    #[serde(
        rename = "types",
        deserialize_with = "deserialize_types_by_name"
    )]
    pub types: IndexMap<String, IntrospectedType>,
    #[serde(rename = "queryType")]
    pub query_type_name: String,
    #[serde(rename = "mutationType")]
    pub mutation_type_name: Option<String>,
}

fn deserialize_types_by_name<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, IntrospectedType>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let types: Vec<IntrospectedType> = Vec::deserialize(deserializer)?;
    Ok(types.into_iter().map(|t| (t.name.clone(), t)).collect())
}

impl IntrospectedSchema {
    pub fn query_type(&self) -> Option<&IntrospectedType> {
        self.types.get(&self.query_type_name)
    }

    pub fn mutation_type(&self) -> Option<&IntrospectedType> {
        self.mutation_type_name
            .as_ref()
            .and_then(|name| self.types.get(name))
    }
}
