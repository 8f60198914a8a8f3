pub mod accessor;
pub mod cache;
pub mod dependencies;
pub mod hook;
pub mod instance;
pub mod naming;
pub mod selector;
pub mod shape;

pub use accessor::{AccessorStats, FieldSet, GenericShape, ProxyAccessor};
pub use cache::{CacheStats, ShapeCache};
pub use dependencies::{FieldDependencies, FieldDependencyRegistry};
pub use hook::{BatchFunction, HookAction, LoadHook};
pub use instance::ProxyInstance;
pub use naming::{NamedExpression, NamingTable};
pub use selector::{CONTEXT_PARAM, ENTITY_PARAM, Selector, SelectorBuilder};
pub use shape::{ProxyShape, RecordTypeFactory, ShapeMember, TypeFactory};
