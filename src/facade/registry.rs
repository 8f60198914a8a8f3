use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Level, event};

use crate::config::ProxyConfig;
use crate::core::{ProxyError, Result};
use crate::executor::{BatchLoader, ExecutionContext, HooksExecuter, InlineBatchLoader};
use crate::proxy::{ProxyAccessor, ProxyShape, RecordTypeFactory, Selector, TypeFactory};
use crate::schema::EntityCatalog;

/// One proxy accessor per entity type, sharing a catalog, config, type factory
/// and batch loader.
///
/// Configure through [`entity`](Self::entity) while the registry is still
/// exclusively owned, then share it (typically behind an `Arc`) for
/// request-time resolution.
pub struct ProxyRegistry {
    catalog: EntityCatalog,
    config: ProxyConfig,
    factory: Arc<dyn TypeFactory>,
    loader: Arc<dyn BatchLoader>,
    accessors: HashMap<String, ProxyAccessor>,
}

impl ProxyRegistry {
    pub fn new(catalog: EntityCatalog, config: ProxyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            factory: Arc::new(RecordTypeFactory::new(config.shape_suffix.clone())),
            loader: Arc::new(InlineBatchLoader),
            catalog,
            config,
            accessors: HashMap::new(),
        })
    }

    /// Must be set before the first accessor is created.
    pub fn with_type_factory(mut self, factory: Arc<dyn TypeFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Must be set before the first accessor is created.
    pub fn with_batch_loader(mut self, loader: Arc<dyn BatchLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The accessor for `entity`, created on first use. The entity must be in the catalog.
    pub fn entity(&mut self, entity: &str) -> Result<&mut ProxyAccessor> {
        if !self.accessors.contains_key(entity) {
            let accessor = ProxyAccessor::new(entity, self.catalog.clone(), self.config.clone())?
                .with_type_factory(Arc::clone(&self.factory))
                .with_batch_loader(Arc::clone(&self.loader));
            event!(Level::DEBUG, entity = entity, "proxy accessor created");
            self.accessors.insert(entity.to_string(), accessor);
        }
        self.accessors
            .get_mut(entity)
            .ok_or_else(|| ProxyError::EntityNotFound(entity.to_string()))
    }

    pub fn accessor(&self, entity: &str) -> Result<&ProxyAccessor> {
        self.accessors
            .get(entity)
            .ok_or_else(|| ProxyError::EntityNotFound(entity.to_string()))
    }

    pub fn entities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.accessors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Computes every generic shape up front instead of on first request.
    pub fn configure_all(&self) {
        for accessor in self.accessors.values() {
            accessor.configure();
        }
    }

    pub fn resolve_shape_and_selector<I, S>(
        &self,
        entity: &str,
        field_names: I,
    ) -> Result<(Arc<ProxyShape>, Arc<Selector>)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.accessor(entity)?.resolve(field_names)
    }

    pub fn resolve_hooks(&self, entity: &str, ctx: ExecutionContext) -> Result<Option<HooksExecuter>> {
        Ok(self.accessor(entity)?.create_hooks_executer(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, EntityMember, EntitySchema};
    use crate::expression::{Expr, lambda};
    use crate::schema::Field;

    fn registry() -> ProxyRegistry {
        let catalog = EntityCatalog::new()
            .with_entity(EntitySchema::new(
                "Order",
                vec![EntityMember::new("Id", DataType::Integer)],
            ))
            .unwrap()
            .with_entity(EntitySchema::new(
                "Customer",
                vec![EntityMember::new("Name", DataType::Text)],
            ))
            .unwrap();
        ProxyRegistry::new(catalog, ProxyConfig::default()).unwrap()
    }

    #[test]
    fn test_unknown_entities() {
        let mut registry = registry();
        assert!(matches!(registry.entity("Invoice"), Err(ProxyError::EntityNotFound(_))));
        assert!(matches!(
            registry.resolve_shape_and_selector("Order", ["id"]),
            Err(ProxyError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_accessors_share_factory() {
        let mut registry = registry();
        registry
            .entity("Order")
            .unwrap()
            .add_field(Field::computed("id", lambda(["o"], Expr::param("o").member("Id"))))
            .unwrap();
        registry
            .entity("Customer")
            .unwrap()
            .add_field(Field::computed("name", lambda(["c"], Expr::param("c").member("Name"))))
            .unwrap();
        registry.configure_all();

        let (order, _) = registry.resolve_shape_and_selector("Order", ["id"]).unwrap();
        let (customer, _) = registry.resolve_shape_and_selector("Customer", ["name"]).unwrap();
        assert_eq!(order.name(), "OrderProxy0");
        assert_eq!(customer.name(), "CustomerProxy1");
        assert_eq!(registry.entities(), vec!["Customer", "Order"]);
        assert!(registry.resolve_hooks("Order", ExecutionContext::new()).unwrap().is_none());
    }
}
