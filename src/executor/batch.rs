use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::{Level, event};

use crate::core::{ProxyError, Result, Value};
use crate::executor::ExecutionContext;
use crate::proxy::BatchFunction;

/// Boundary to the dataloader that serves batched hooks.
///
/// Implementations may cache across calls, coalesce with other requests, or
/// enforce timeouts; errors from the batch function are returned unchanged.
#[async_trait]
pub trait BatchLoader: Send + Sync {
    async fn load_batch(
        &self,
        ctx: &ExecutionContext,
        batch: &BatchFunction,
        keys: Vec<Value>,
    ) -> Result<HashMap<Value, Value>>;
}

/// Calls the batch function once per `load_batch` with the distinct non-NULL keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineBatchLoader;

#[async_trait]
impl BatchLoader for InlineBatchLoader {
    async fn load_batch(
        &self,
        ctx: &ExecutionContext,
        batch: &BatchFunction,
        keys: Vec<Value>,
    ) -> Result<HashMap<Value, Value>> {
        let mut seen = HashSet::with_capacity(keys.len());
        let unique: Vec<Value> = keys
            .into_iter()
            .filter(|key| !key.is_null() && seen.insert(key.clone()))
            .collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        event!(Level::TRACE, keys = unique.len(), "loading batch");
        batch(ctx.clone(), unique).await.map_err(|err| {
            event!(Level::ERROR, error = %err, request_id = %ctx.request_id(), "batch function failed");
            ProxyError::Hook(err)
        })
    }
}
