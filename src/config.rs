//! C9: ties schema merge, introspection self-registration and the executor
//! together into one constructed, shareable `Gateway` (§4.9).

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::FederationError;
use crate::executor::{Executor, ExecutorClient};
use crate::internal_error;
use crate::introspection::IntrospectedSchema;
use crate::introspection_server::{IntrospectionServer, INTROSPECTION_CLIENT};
use crate::merge::{merge_versioned_schemas, MergedSchema};

/// Construction-time configuration for a `Gateway`. Mirrors this codebase's
/// existing `QueryPlannerDebugConfig` pattern of a small, validated,
/// `Arc`-shared settings struct built once and handed to every request.
#[derive(Clone)]
pub struct GatewayConfig {
    pub services: IndexMap<String, Arc<dyn ExecutorClient>>,
    pub max_evaluated_plans: u32,
    pub register_introspection: bool,
}

/// The assembled gateway: a merged schema, paired executor, and the plan
/// budget every query is built against. Safely shared (`Arc`) across
/// concurrent requests once constructed.
pub struct Gateway {
    pub schema: Arc<MergedSchema>,
    pub executor: Executor,
    pub max_evaluated_plans: u32,
}

impl Gateway {
    /// Merges `services`' introspected schemas, optionally registers the
    /// introspection self-server and re-merges, and returns a ready
    /// `Gateway` or a fatal `FederationError::SchemaMerge` (§4.9).
    #[tracing::instrument(skip(config, versioned_schemas), level = "debug")]
    pub fn build(
        config: GatewayConfig,
        versioned_schemas: IndexMap<String, IndexMap<String, IntrospectedSchema>>,
    ) -> Result<Gateway, FederationError> {
        if config.services.is_empty() {
            return Err(internal_error!("GatewayConfig must register at least one service"));
        }

        let mut clients = config.services;
        let mut schemas = versioned_schemas;

        let mut merged = merge_versioned_schemas(&schemas)?;
        tracing::debug!(services = clients.len(), types = merged.types.len(), "initial schema merge complete");

        if config.register_introspection {
            let introspection_schema = IntrospectedSchema {
                types: merged.types.clone(),
                query_type_name: merged.query_type_name.clone(),
                mutation_type_name: merged.mutation_type_name.clone(),
            };
            let server = IntrospectionServer::new(Arc::new(merged.clone()));
            clients.insert(INTROSPECTION_CLIENT.to_owned(), Arc::new(server));

            let mut introspection_versions = IndexMap::new();
            introspection_versions.insert("v1".to_owned(), introspection_schema);
            schemas.insert(INTROSPECTION_CLIENT.to_owned(), introspection_versions);

            merged = merge_versioned_schemas(&schemas)?;
            tracing::debug!(types = merged.types.len(), "re-merged schema after registering introspection self-server");
        }

        let schema = Arc::new(merged);
        let executor = Executor::new(Arc::clone(&schema), clients);

        Ok(Gateway { schema, executor, max_evaluated_plans: config.max_evaluated_plans })
    }
}
