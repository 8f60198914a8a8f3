//! Everything needed to declare entities and resolve projections.
//!
//! ```
//! use shapeproxy::prelude::*;
//! ```

pub use crate::config::ProxyConfig;
pub use crate::core::{DataType, EntityMember, EntitySchema, ProxyError, Record, Result, Value};
pub use crate::evaluator::EvaluatorRegistry;
pub use crate::executor::ExecutionContext;
pub use crate::expression::{Expr, Lambda, lambda};
pub use crate::facade::{InMemorySource, ProjectionPipeline, ProxyRegistry};
pub use crate::proxy::{LoadHook, ProxyAccessor, ProxyInstance, ProxyShape};
pub use crate::schema::{EntityCatalog, Field};
