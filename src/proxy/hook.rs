use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::core::{ProxyError, Result, Value};
use crate::executor::ExecutionContext;
use crate::expression::Lambda;

/// Side effect run against one extracted (or batch-loaded) value.
pub type HookAction =
    Arc<dyn Fn(ExecutionContext, Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Loads values for many keys at once. Keys missing from the result map load as NULL.
pub type BatchFunction = Arc<
    dyn Fn(ExecutionContext, Vec<Value>) -> BoxFuture<'static, anyhow::Result<HashMap<Value, Value>>>
        + Send
        + Sync,
>;

/// Post-materialization callback registered on an entity.
#[derive(Clone)]
pub enum LoadHook {
    /// `action(ctx, extraction(proxy))` for every proxy.
    Simple { extraction: Lambda, action: HookAction },
    /// Keys from every proxy are loaded through one batch call, then
    /// `action(ctx, loaded[key])` runs per proxy.
    Batched {
        key: Lambda,
        batch: BatchFunction,
        action: HookAction,
    },
}

impl LoadHook {
    pub fn simple<F, Fut>(extraction: Lambda, action: F) -> Self
    where
        F: Fn(ExecutionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        LoadHook::Simple {
            extraction,
            action: Arc::new(move |ctx, value| action(ctx, value).boxed()),
        }
    }

    pub fn batched<B, BFut, F, Fut>(key: Lambda, batch: B, action: F) -> Self
    where
        B: Fn(ExecutionContext, Vec<Value>) -> BFut + Send + Sync + 'static,
        BFut: Future<Output = anyhow::Result<HashMap<Value, Value>>> + Send + 'static,
        F: Fn(ExecutionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        LoadHook::Batched {
            key,
            batch: Arc::new(move |ctx, keys| batch(ctx, keys).boxed()),
            action: Arc::new(move |ctx, value| action(ctx, value).boxed()),
        }
    }

    /// The expression folded into the entity's member set.
    pub fn extraction(&self) -> &Lambda {
        match self {
            LoadHook::Simple { extraction, .. } => extraction,
            LoadHook::Batched { key, .. } => key,
        }
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, LoadHook::Batched { .. })
    }

    /// Extractions must be closed `entity => ..` lambdas.
    pub(crate) fn validate(&self, entity: &str) -> Result<()> {
        let extraction = self.extraction();
        if extraction.arity() != 1 {
            return Err(ProxyError::invalid_configuration(
                entity,
                format!(
                    "load hook extraction '{}' must take exactly one (entity) parameter",
                    extraction
                ),
            ));
        }
        let free = extraction.body.free_parameters();
        if let Some(unbound) = free.iter().find(|name| !extraction.params.contains(*name)) {
            return Err(ProxyError::invalid_configuration(
                entity,
                format!(
                    "load hook extraction '{}' references unbound parameter '{}'",
                    extraction, unbound
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for LoadHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadHook::Simple { extraction, .. } => f
                .debug_struct("Simple")
                .field("extraction", &extraction.to_string())
                .finish_non_exhaustive(),
            LoadHook::Batched { key, .. } => f
                .debug_struct("Batched")
                .field("key", &key.to_string())
                .finish_non_exhaustive(),
        }
    }
}
