//! The gateway's error taxonomy.
//!
//! Every public entry point returns `Result<_, FederationError>`. The four
//! variants mirror the four places a query's path through the gateway can
//! fail: schema merge (fatal to gateway start), normalize/plan (aborts one
//! query), execute (aborts one query), or an internal invariant violation
//! (a gateway bug, not bad input).

use std::fmt;

/// Create an internal error.
///
/// # Example
/// ```
/// use fedgraph::error::FederationError;
/// use fedgraph::internal_error;
///
/// fn may_be_none() -> Option<()> { None }
///
/// let result: Result<(), FederationError> = may_be_none()
///     .ok_or_else(|| internal_error!("expected {} to be Some", "the thing"));
/// assert!(result.is_err());
/// ```
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::FederationError::internal(format!( $( $arg )+ ))
    }
}

/// Break out of the current function, returning an internal error.
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ))
    }
}

/// An assertion that should never fail in normal operation. Panics in debug
/// builds, returns an internal error in release builds.
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        #[cfg(debug_assertions)]
        {
            assert!($expr, $( $arg )+);
        }
        #[cfg(not(debug_assertions))]
        if !($expr) {
            $crate::bail!( $( $arg )+ );
        }
    }
}

/// The top-level error type returned by every fallible gateway operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FederationError {
    #[error(transparent)]
    SchemaMerge(#[from] SchemaMergeError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error("an internal error has occurred, please report this as a bug: {0}")]
    Internal(String),
}

impl FederationError {
    pub fn internal(message: impl fmt::Display) -> Self {
        FederationError::Internal(message.to_string())
    }
}

/// Errors raised while merging introspected schemas (§4.2). Fatal to
/// gateway construction: a gateway that cannot build a merged schema does
/// not start serving queries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaMergeError {
    #[error("type `{name}` has kind {left_kind:?} in one schema and {right_kind:?} in another")]
    ConflictingKinds {
        name: String,
        left_kind: crate::introspection::TypeKind,
        right_kind: crate::introspection::TypeKind,
    },

    #[error("field `{type_name}.{field_name}` has incompatible leaf types `{left}` and `{right}`")]
    IncompatibleTypes {
        type_name: String,
        field_name: String,
        left: String,
        right: String,
    },

    #[error("field `{type_name}.{field_name}` has incompatible argument `{arg_name}`: {message}")]
    IncompatibleArgs {
        type_name: String,
        field_name: String,
        arg_name: String,
        message: String,
    },

    #[error(
        "input field `{type_name}.{field_name}` is non-null in one schema but is absent from another"
    )]
    NewNonNullInput { type_name: String, field_name: String },

    #[error("type `{name}` has an unrecognized kind `{kind}`")]
    UnknownKind { name: String, kind: String },

    #[error("invalid federation key on `{type_name}` declared by `{service}`: {message}")]
    InvalidFederationKey {
        type_name: String,
        service: String,
        message: String,
    },
}

/// Errors raised while normalizing or planning a single client query.
/// Aborts that query only; the gateway keeps serving other queries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanError {
    #[error("field `{type_name}.{field_name}` is not defined in the merged schema")]
    UnknownField { type_name: String, field_name: String },

    #[error("fragment targets unknown type `{type_name}`")]
    UnknownFragmentTarget { type_name: String },

    #[error(
        "selections with alias `{alias}` disagree: `{first}` vs `{second}`"
    )]
    AliasConflict {
        alias: String,
        first: String,
        second: String,
    },

    #[error("scalar or enum field `{type_name}.{field_name}` must not have a selection set")]
    ScalarHasSelection { type_name: String, field_name: String },

    #[error("object field `{type_name}.{field_name}` requires a selection set")]
    ObjectMissingSelection { type_name: String, field_name: String },

    #[error(
        "query exceeded the maximum number of planned selections ({limit}); the query is likely too large or recursive"
    )]
    EvaluationCapExceeded { limit: u32 },
}

/// Errors raised while executing a plan against downstream services.
/// Aborts the query; the first error wins and in-flight siblings are
/// cancelled.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecuteError {
    #[error("subquery to service `{service}` failed: {message}")]
    SubqueryFailed { service: String, message: String },

    #[error("response from service `{service}` was malformed: {message}")]
    MalformedResponse { service: String, message: String },

    #[error(
        "service `{service}` returned {got} results for {expected} join targets at path {path}"
    )]
    KeyShapeMismatch {
        service: String,
        path: String,
        expected: usize,
        got: usize,
    },

    #[error("object at path {path} has no `__federation` key needed to join to `{service}`")]
    FederationKeyMissing { service: String, path: String },

    #[error(
        "merging results at key `{key}` conflicts: existing value differs from the value returned by `{service}`"
    )]
    MergeKeyConflict { key: String, service: String },

    #[error("query was cancelled")]
    Cancelled,
}
