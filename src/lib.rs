//! A federated GraphQL query gateway: merges per-service introspected
//! schemas into one served schema (`merge`), rewrites client queries into
//! canonical form (`normalize`), splits them into per-service subqueries
//! with join paths (`plan`), and runs those subqueries concurrently against
//! the registered services (`executor`).
//!
//! [`config::Gateway`] is the entry point: build it from a [`config::GatewayConfig`]
//! and a per-service set of versioned introspected schemas, then drive
//! [`normalize::flatten`] → [`plan::plan_root`] → [`executor::Executor::execute`]
//! per incoming query.

pub mod config;
pub mod error;
pub mod executor;
pub mod introspection;
pub mod introspection_server;
pub mod merge;
pub mod normalize;
pub mod plan;
pub mod test_support;
