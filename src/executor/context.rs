use std::sync::Arc;

use uuid::Uuid;

use crate::core::{Record, Value};

/// Type name under which request variables are exposed to expressions.
pub const CONTEXT_TYPE: &str = "ExecutionContext";

/// Per-request state handed to context-aware field expressions and to load hooks.
///
/// Cheap to clone; hooks receive their own copy.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    request_id: Uuid,
    variables: Arc<Record>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            variables: Arc::new(Record::new(CONTEXT_TYPE)),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.variables).set(name, value);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// The context as seen by expressions: `ctx.UserId` reads variable `UserId`.
    pub fn as_value(&self) -> Value {
        Value::Record(Arc::clone(&self.variables))
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
