use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::{Instrument, Level, event, info_span};

use super::batch::BatchLoader;
use crate::core::{ProxyError, Result, Value};
use crate::executor::ExecutionContext;
use crate::proxy::{HookAction, LoadHook, ProxyInstance};

/// A registered hook together with the shape member carrying its extraction.
#[derive(Debug, Clone)]
pub struct BoundHook {
    pub member: String,
    pub hook: LoadHook,
}

/// Runs every load hook of one entity over materialized proxies for one request.
///
/// Hooks run concurrently with one another; the number of in-flight hook
/// actions is bounded by a semaphore shared by the whole executor.
pub struct HooksExecuter {
    entity: String,
    ctx: ExecutionContext,
    hooks: Vec<BoundHook>,
    loader: Arc<dyn BatchLoader>,
    permits: Arc<Semaphore>,
}

impl HooksExecuter {
    pub fn new(
        entity: impl Into<String>,
        ctx: ExecutionContext,
        hooks: Vec<BoundHook>,
        loader: Arc<dyn BatchLoader>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            entity: entity.into(),
            ctx,
            hooks,
            loader,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Runs all hooks for all items and hands the items back once every
    /// hook for every item has completed. The first failure is returned.
    ///
    /// Completion is per call, not per key: the returned `Vec<K>` resolves only
    /// when every key is done, in the order the items were given.
    pub async fn execute<K, F>(&self, items: Vec<K>, key_fn: F) -> Result<Vec<K>>
    where
        F: Fn(&K) -> &ProxyInstance,
    {
        let span = info_span!(
            "proxy.hooks.execute",
            entity = %self.entity,
            request_id = %self.ctx.request_id(),
            hooks = self.hooks.len(),
            items = items.len()
        );

        async move {
            let mut extracted = Vec::with_capacity(self.hooks.len());
            for bound in &self.hooks {
                let values = items
                    .iter()
                    .map(|item| key_fn(item).get(&bound.member).cloned())
                    .collect::<Result<Vec<Value>>>()?;
                extracted.push(values);
            }

            try_join_all(
                self.hooks
                    .iter()
                    .zip(extracted)
                    .map(|(bound, values)| self.run_hook(bound, values)),
            )
            .await?;

            event!(Level::DEBUG, "hooks completed");
            Ok(items)
        }
        .instrument(span)
        .await
    }

    async fn run_hook(&self, bound: &BoundHook, values: Vec<Value>) -> Result<()> {
        match &bound.hook {
            LoadHook::Simple { action, .. } => {
                try_join_all(
                    values
                        .into_iter()
                        .map(|value| self.invoke(&bound.member, action, value)),
                )
                .await?;
            }
            LoadHook::Batched { batch, action, .. } => {
                let loaded = self
                    .loader
                    .load_batch(&self.ctx, batch, values.clone())
                    .await?;
                try_join_all(values.into_iter().map(|key| {
                    let value = loaded.get(&key).cloned().unwrap_or(Value::Null);
                    self.invoke(&bound.member, action, value)
                }))
                .await?;
            }
        }
        Ok(())
    }

    async fn invoke(&self, member: &str, action: &HookAction, value: Value) -> Result<()> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProxyError::LockError("hook permit pool closed".to_string()))?;

        action(self.ctx.clone(), value).await.map_err(|err| {
            event!(Level::ERROR, error = %err, member = member, "load hook failed");
            ProxyError::Hook(err)
        })
    }
}

impl fmt::Debug for HooksExecuter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HooksExecuter")
            .field("entity", &self.entity)
            .field("request_id", &self.ctx.request_id())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
