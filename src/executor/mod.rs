pub mod batch;
pub mod context;
pub mod hooks;

pub use batch::{BatchLoader, InlineBatchLoader};
pub use context::ExecutionContext;
pub use hooks::{BoundHook, HooksExecuter};
