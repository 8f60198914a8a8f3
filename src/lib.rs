// ============================================================================
// shapeproxy: per-request projection shapes for GraphQL entities
// ============================================================================
//
// Configuration declares fields, dependencies and load hooks per entity.
// At request time a field-set resolves to a cached concrete shape plus the
// selector that builds it from a source entity; load hooks then run over the
// materialized proxies.

pub mod config;
pub mod core;
pub mod evaluator;
pub mod executor;
pub mod expression;
pub mod facade;
pub mod prelude;
pub mod proxy;
pub mod schema;

pub use config::ProxyConfig;
pub use core::{DataType, EntityMember, EntitySchema, ProxyError, Record, Result, Value};
pub use evaluator::EvaluatorRegistry;
pub use executor::{BatchLoader, ExecutionContext, HooksExecuter, InlineBatchLoader};
pub use expression::{Expr, ExprKey, Lambda, lambda};
pub use facade::{EntitySource, InMemorySource, ProjectionPipeline, ProxyRegistry};
pub use proxy::{
    LoadHook, ProxyAccessor, ProxyInstance, ProxyShape, RecordTypeFactory, Selector, ShapeMember,
    TypeFactory,
};
pub use schema::{EntityCatalog, Field};
