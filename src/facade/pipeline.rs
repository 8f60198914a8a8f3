use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{Instrument, Level, event, info_span};

use super::registry::ProxyRegistry;
use crate::core::{Record, Result, Value};
use crate::evaluator::EvaluatorRegistry;
use crate::executor::ExecutionContext;
use crate::proxy::ProxyInstance;

/// Queryable backend the pipeline reads entities from.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn load(&self, entity: &str) -> Result<Vec<Value>>;
}

/// Entity rows kept in memory, keyed by entity type.
#[derive(Debug, Default)]
pub struct InMemorySource {
    rows: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: Record) -> Result<()> {
        let mut rows = self.rows.write()?;
        rows.entry(record.type_name().to_string())
            .or_default()
            .push(Value::from(record));
        Ok(())
    }

    pub fn with_records(self, records: impl IntoIterator<Item = Record>) -> Result<Self> {
        for record in records {
            self.insert(record)?;
        }
        Ok(self)
    }
}

#[async_trait]
impl EntitySource for InMemorySource {
    async fn load(&self, entity: &str) -> Result<Vec<Value>> {
        let rows = self.rows.read()?;
        Ok(rows.get(entity).cloned().unwrap_or_default())
    }
}

/// Request-time data flow: resolve the shape and selector for the requested
/// fields, project every source entity, then run the entity's load hooks.
pub struct ProjectionPipeline {
    registry: Arc<ProxyRegistry>,
    evaluator: Arc<EvaluatorRegistry>,
    source: Arc<dyn EntitySource>,
}

impl ProjectionPipeline {
    pub fn new(registry: Arc<ProxyRegistry>, source: Arc<dyn EntitySource>) -> Self {
        Self {
            registry,
            evaluator: Arc::new(EvaluatorRegistry::with_default_evaluators()),
            source,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<EvaluatorRegistry>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn registry(&self) -> &Arc<ProxyRegistry> {
        &self.registry
    }

    pub async fn project<I, S>(
        &self,
        entity: &str,
        field_names: I,
        ctx: &ExecutionContext,
    ) -> Result<Vec<ProxyInstance>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let span = info_span!(
            "proxy.project",
            entity = entity,
            request_id = %ctx.request_id()
        );

        async move {
            let (shape, selector) = self.registry.resolve_shape_and_selector(entity, field_names)?;
            let rows = self.source.load(entity).await?;
            let proxies = rows
                .iter()
                .map(|row| selector.evaluate(&self.evaluator, ctx, row))
                .collect::<Result<Vec<_>>>()?;
            event!(Level::DEBUG, shape = shape.name(), rows = proxies.len(), "entities projected");

            match self.registry.resolve_hooks(entity, ctx.clone())? {
                Some(hooks) => hooks.execute(proxies, |proxy| proxy).await,
                None => Ok(proxies),
            }
        }
        .instrument(span)
        .await
    }
}
