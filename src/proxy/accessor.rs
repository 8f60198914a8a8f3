use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use tracing::{Level, event};

use super::cache::{CacheStats, ShapeCache};
use super::dependencies::FieldDependencyRegistry;
use super::hook::LoadHook;
use super::naming::NamingTable;
use super::selector::{Selector, SelectorBuilder};
use super::shape::{ProxyShape, RecordTypeFactory, ShapeMember, TypeFactory};
use crate::config::ProxyConfig;
use crate::core::{DataType, ProxyError, Result, Value};
use crate::executor::{BatchLoader, BoundHook, ExecutionContext, HooksExecuter, InlineBatchLoader};
use crate::expression::{ExprKey, Lambda, TypeInference};
use crate::schema::{EntityCatalog, Field, is_valid_field_name};

/// Requested field names, deduplicated and order-independent.
pub type FieldSet = BTreeSet<String>;

/// Identity of a concrete shape: its member names in generic-shape order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShapeKey {
    members: Vec<String>,
    with_original: bool,
}

/// Superset of every member a concrete shape of this entity can carry.
#[derive(Debug, Clone)]
pub struct GenericShape {
    members: Vec<ShapeMember>,
    index: HashMap<String, usize>,
}

impl GenericShape {
    fn new(members: Vec<ShapeMember>) -> Self {
        let index = members
            .iter()
            .enumerate()
            .map(|(idx, member)| (member.name.clone(), idx))
            .collect();
        Self { members, index }
    }

    pub fn members(&self) -> &[ShapeMember] {
        &self.members
    }

    pub fn get(&self, name: &str) -> Option<&ShapeMember> {
        self.index.get(name).map(|idx| &self.members[*idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorStats {
    pub shapes: CacheStats,
    pub selectors: CacheStats,
}

/// Owns the projection bookkeeping of one entity type.
///
/// Configuration (`add_*`, `remove_member`, `replace_field`) needs `&mut self`
/// and is rejected once the generic shape has been computed. Request-time
/// resolution takes `&self` and may run concurrently; the shape and selector
/// caches are get-or-add and never evicted.
pub struct ProxyAccessor {
    entity: String,
    catalog: EntityCatalog,
    config: ProxyConfig,
    factory: Arc<dyn TypeFactory>,
    loader: Arc<dyn BatchLoader>,
    fields: Vec<Field>,
    field_index: HashMap<String, usize>,
    dependencies: FieldDependencyRegistry,
    members: Vec<ExprKey>,
    naming: NamingTable,
    hooks: Vec<BoundHook>,
    generic: OnceLock<GenericShape>,
    shapes: ShapeCache<ShapeKey, Arc<ProxyShape>>,
    selectors: ShapeCache<FieldSet, Arc<Selector>>,
}

impl ProxyAccessor {
    /// The entity must be described by `catalog`; field and dependency types
    /// are inferred against it.
    pub fn new(entity: impl Into<String>, catalog: EntityCatalog, config: ProxyConfig) -> Result<Self> {
        let entity = entity.into();
        catalog.get_entity(&entity)?;
        config.validate()?;

        Ok(Self {
            factory: Arc::new(RecordTypeFactory::new(config.shape_suffix.clone())),
            loader: Arc::new(InlineBatchLoader),
            naming: NamingTable::new(config.member_prefix.clone()),
            entity,
            catalog,
            config,
            fields: Vec::new(),
            field_index: HashMap::new(),
            dependencies: FieldDependencyRegistry::new(),
            members: Vec::new(),
            hooks: Vec::new(),
            generic: OnceLock::new(),
            shapes: ShapeCache::new(),
            selectors: ShapeCache::new(),
        })
    }

    pub fn with_type_factory(mut self, factory: Arc<dyn TypeFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_batch_loader(mut self, loader: Arc<dyn BatchLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.field_index.get(name).map(|idx| &self.fields[*idx])
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn dependencies(&self) -> &FieldDependencyRegistry {
        &self.dependencies
    }

    pub fn naming(&self) -> &NamingTable {
        &self.naming
    }

    /// Synthetic names of the accessor-level member set, in insertion order.
    pub fn member_names(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter_map(|key| self.naming.lookup(key))
            .map(|named| named.name.as_str())
            .collect()
    }

    pub fn has_hooks(&self) -> bool {
        !self.hooks.is_empty()
    }

    pub fn is_configured(&self) -> bool {
        self.generic.get().is_some()
    }

    pub fn cache_stats(&self) -> AccessorStats {
        AccessorStats {
            shapes: self.shapes.stats(),
            selectors: self.selectors.stats(),
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Declares a field. Expression-backed fields without an explicit type get
    /// one inferred from the expression.
    pub fn add_field(&mut self, mut field: Field) -> Result<()> {
        self.ensure_configurable()?;
        self.validate_field_name(field.name())?;
        if self.field_index.contains_key(field.name()) {
            return Err(ProxyError::invalid_configuration(
                &self.entity,
                format!("field '{}' is already declared", field.name()),
            ));
        }

        if let Some(expression) = field.expression() {
            let inferred = self.infer_field_type(field.name(), expression)?;
            if field.field_type().is_none() {
                field.set_field_type(inferred);
            }
        }

        event!(
            Level::TRACE,
            entity = %self.entity,
            field = field.name(),
            field_type = ?field.field_type(),
            "field declared"
        );
        self.field_index
            .insert(field.name().to_string(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    /// Adds an accessor-level dependency carried by every concrete shape.
    /// Returns its synthetic member name.
    pub fn add_member(&mut self, expression: &Lambda) -> Result<String> {
        self.ensure_configurable()?;
        let data_type = self.infer_dependency_type(expression)?;
        let key = ExprKey::new(expression);

        let name = self.naming.name_for(&key, None, data_type).to_string();
        if !self.members.contains(&key) {
            event!(Level::TRACE, entity = %self.entity, member = %name, expression = %key, "member added");
            self.members.push(key);
        }
        Ok(name)
    }

    /// Removes a structurally equal expression from the member set.
    /// Returns whether it was present. Hook extractions cannot be removed.
    pub fn remove_member(&mut self, expression: &Lambda) -> Result<bool> {
        self.ensure_configurable()?;
        let key = ExprKey::new(expression);
        if let Some(bound) = self
            .hooks
            .iter()
            .find(|bound| ExprKey::new(bound.hook.extraction()) == key)
        {
            return Err(ProxyError::invalid_configuration(
                &self.entity,
                format!(
                    "member '{}' is the extraction of a registered load hook",
                    bound.member
                ),
            ));
        }
        let before = self.members.len();
        self.members.retain(|existing| existing != &key);
        Ok(self.members.len() != before)
    }

    /// Records that `field_name` needs `expression` to resolve. Returns the
    /// dependency's synthetic member name.
    pub fn add_field_member(&mut self, field_name: &str, expression: &Lambda) -> Result<String> {
        self.ensure_configurable()?;
        self.validate_field_name(field_name)?;
        let data_type = self.infer_dependency_type(expression)?;
        let key = ExprKey::new(expression);

        self.dependencies.add_dependency(field_name, key.clone());
        Ok(self
            .naming
            .name_for(&key, Some(field_name), data_type)
            .to_string())
    }

    /// Bulk form of [`add_field_member`](Self::add_field_member). Nothing is
    /// recorded unless every expression can be typed. Returns the names of the
    /// dependencies that were not already recorded for the field.
    pub fn add_field_members(&mut self, field_name: &str, expressions: &[Lambda]) -> Result<Vec<String>> {
        self.ensure_configurable()?;
        self.validate_field_name(field_name)?;
        let mut typed = HashMap::with_capacity(expressions.len());
        for expression in expressions {
            let data_type = self.infer_dependency_type(expression)?;
            typed.insert(ExprKey::new(expression), data_type);
        }

        let added = self
            .dependencies
            .add_dependencies(field_name, expressions.iter().map(ExprKey::new));
        let mut names = Vec::with_capacity(added.len());
        for key in added {
            let data_type = typed.get(&key).cloned().unwrap_or(DataType::Any);
            names.push(self.naming.name_for(&key, Some(field_name), data_type).to_string());
        }
        Ok(names)
    }

    /// Marks `field_name` as needing the whole source entity.
    pub fn add_all_members(&mut self, field_name: &str) -> Result<()> {
        self.ensure_configurable()?;
        self.validate_field_name(field_name)?;
        self.dependencies.mark_depends_on_all_members(field_name);
        Ok(())
    }

    /// Registers a hook and folds its extraction into the member set.
    pub fn add_hook(&mut self, hook: LoadHook) -> Result<String> {
        self.ensure_configurable()?;
        hook.validate(&self.entity)?;
        let member = self.add_member(hook.extraction())?;
        event!(
            Level::DEBUG,
            entity = %self.entity,
            member = %member,
            batched = hook.is_batched(),
            "load hook registered"
        );
        self.hooks.push(BoundHook {
            member: member.clone(),
            hook,
        });
        Ok(member)
    }

    pub fn add_load_hook<F, Fut>(&mut self, extraction: Lambda, action: F) -> Result<String>
    where
        F: Fn(ExecutionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_hook(LoadHook::simple(extraction, action))
    }

    pub fn add_batched_load_hook<B, BFut, F, Fut>(
        &mut self,
        key: Lambda,
        batch: B,
        action: F,
    ) -> Result<String>
    where
        B: Fn(ExecutionContext, Vec<Value>) -> BFut + Send + Sync + 'static,
        BFut: Future<Output = anyhow::Result<HashMap<Value, Value>>> + Send + 'static,
        F: Fn(ExecutionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_hook(LoadHook::batched(key, batch, action))
    }

    /// Swaps a declared field for a new one, moving its dependency bookkeeping
    /// to the new name.
    pub fn replace_field(&mut self, old_name: &str, mut new_field: Field) -> Result<()> {
        self.ensure_configurable()?;
        let Some(idx) = self.field_index.get(old_name).copied() else {
            return Err(ProxyError::invalid_configuration(
                &self.entity,
                format!("cannot replace undeclared field '{}'", old_name),
            ));
        };
        self.validate_field_name(new_field.name())?;
        if new_field.name() != old_name && self.field_index.contains_key(new_field.name()) {
            return Err(ProxyError::invalid_configuration(
                &self.entity,
                format!("field '{}' is already declared", new_field.name()),
            ));
        }
        if let Some(expression) = new_field.expression() {
            let inferred = self.infer_field_type(new_field.name(), expression)?;
            if new_field.field_type().is_none() {
                new_field.set_field_type(inferred);
            }
        }

        let new_name = new_field.name().to_string();
        self.dependencies.rekey(old_name, &new_name);
        self.field_index.remove(old_name);
        self.field_index.insert(new_name.clone(), idx);
        self.fields[idx] = new_field;

        event!(Level::TRACE, entity = %self.entity, old = old_name, new = %new_name, "field replaced");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Request time
    // ------------------------------------------------------------------

    /// Computes the generic shape on first call and freezes configuration.
    pub fn configure(&self) -> &GenericShape {
        self.generic.get_or_init(|| {
            let generic = self.build_generic();
            event!(
                Level::DEBUG,
                entity = %self.entity,
                members = generic.len(),
                hooks = self.hooks.len(),
                "generic shape configured"
            );
            generic
        })
    }

    pub fn generic_shape(&self) -> &GenericShape {
        self.configure()
    }

    /// The concrete shape for a field-set. Any permutation of the same names
    /// resolves to the same cached shape.
    pub fn get_concrete_proxy_type<I, S>(&self, field_names: I) -> Result<Arc<ProxyShape>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.concrete_shape(&field_set(field_names))
    }

    /// The `(ctx, entity) -> shape` selector for a field-set, cached like the shape.
    pub fn create_selector_expression<I, S>(&self, field_names: I) -> Result<Arc<Selector>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selector(&field_set(field_names))
    }

    pub fn resolve<I, S>(&self, field_names: I) -> Result<(Arc<ProxyShape>, Arc<Selector>)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selector = self.selector(&field_set(field_names))?;
        Ok((Arc::clone(selector.shape()), selector))
    }

    /// `None` when no hooks are registered; callers skip hook execution.
    pub fn create_hooks_executer(&self, ctx: ExecutionContext) -> Option<HooksExecuter> {
        self.configure();
        if self.hooks.is_empty() {
            return None;
        }
        Some(HooksExecuter::new(
            self.entity.clone(),
            ctx,
            self.hooks.clone(),
            Arc::clone(&self.loader),
            self.config.max_concurrent_hooks,
        ))
    }

    fn concrete_shape(&self, fields: &FieldSet) -> Result<Arc<ProxyShape>> {
        let generic = self.configure();
        let (members, with_original) = self.plan_members(generic, fields)?;
        let key = ShapeKey {
            members: members.iter().map(|member| member.name.clone()).collect(),
            with_original,
        };

        self.shapes.get_or_try_insert_with(&key, || {
            let shape = self
                .factory
                .create_structural_type(&self.entity, members, with_original)?;
            event!(Level::DEBUG, entity = %self.entity, shape = %shape, "generated concrete shape");
            Ok(Arc::new(shape))
        })
    }

    fn selector(&self, fields: &FieldSet) -> Result<Arc<Selector>> {
        self.selectors.get_or_try_insert_with(fields, || {
            let shape = self.concrete_shape(fields)?;
            let selector = self.build_selector(fields, shape)?;
            event!(Level::DEBUG, entity = %self.entity, selector = %selector, "generated selector");
            Ok(Arc::new(selector))
        })
    }

    /// Members of the concrete shape, in generic-shape order, and whether the
    /// shape carries the original entity.
    fn plan_members(&self, generic: &GenericShape, fields: &FieldSet) -> Result<(Vec<ShapeMember>, bool)> {
        let mut included: HashSet<&str> = HashSet::new();
        let mut with_original = false;

        for name in fields {
            let name = name.as_str();
            match self.dependencies.get(name) {
                Some(deps) => {
                    with_original |= deps.depend_on_all_members();
                    for key in deps.expressions() {
                        included.insert(self.synthetic_name(key)?);
                    }
                    // Resolver-only fields are served from their dependencies
                    if self.field(name).is_some_and(Field::is_materializable) {
                        included.insert(name);
                    }
                }
                None if generic.contains(name) => {
                    included.insert(name);
                }
                None => {
                    return Err(ProxyError::UnknownMember {
                        entity: self.entity.clone(),
                        member: name.to_string(),
                    });
                }
            }
        }
        for key in &self.members {
            included.insert(self.synthetic_name(key)?);
        }

        let members = generic
            .members()
            .iter()
            .filter(|member| included.contains(member.name.as_str()))
            .cloned()
            .collect();
        Ok((members, with_original))
    }

    fn build_selector(&self, fields: &FieldSet, shape: Arc<ProxyShape>) -> Result<Selector> {
        let mut builder = SelectorBuilder::new(Arc::clone(&shape));

        for name in fields {
            let Some(expression) = self.field(name).and_then(Field::expression) else {
                continue;
            };
            if shape.has_member(name) {
                builder.bind_field(name, expression)?;
            }
        }

        // A dependency shared by several owners is bound once
        let requested = fields
            .iter()
            .filter_map(|name| self.dependencies.get(name))
            .flat_map(|deps| deps.expressions());
        let mut bound = HashSet::new();
        for key in self.members.iter().chain(requested) {
            let name = self.synthetic_name(key)?;
            if bound.insert(name) {
                builder.bind_dependency(name, key.lambda())?;
            }
        }

        if shape.with_original() {
            builder.bind_original()?;
        }
        Ok(builder.build())
    }

    fn build_generic(&self) -> GenericShape {
        let mut members: Vec<ShapeMember> = self
            .fields
            .iter()
            .filter_map(|field| {
                field
                    .field_type()
                    .map(|ty| ShapeMember::new(field.name(), ty.clone()))
            })
            .collect();

        let referenced: HashSet<&ExprKey> = self
            .members
            .iter()
            .chain(self.dependencies.iter().flat_map(|(_, deps)| deps.expressions()))
            .collect();
        members.extend(
            self.naming
                .iter()
                .filter(|named| referenced.contains(&named.key))
                .map(|named| ShapeMember::new(named.name.clone(), named.data_type.clone())),
        );

        if self.fields.iter().any(Field::is_groupable) {
            members.push(ShapeMember::new(self.group_counter_name(), DataType::Integer));
        }
        GenericShape::new(members)
    }

    /// Member that carries per-group counts for groupable entities.
    pub fn group_counter_name(&self) -> String {
        format!("{}count", self.config.member_prefix)
    }

    fn synthetic_name(&self, key: &ExprKey) -> Result<&str> {
        self.naming
            .lookup(key)
            .map(|named| named.name.as_str())
            .ok_or_else(|| ProxyError::UnknownMember {
                entity: self.entity.clone(),
                member: key.to_string(),
            })
    }

    fn ensure_configurable(&self) -> Result<()> {
        if self.is_configured() {
            return Err(ProxyError::AlreadyConfigured(self.entity.clone()));
        }
        Ok(())
    }

    fn validate_field_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ProxyError::invalid_configuration(
                &self.entity,
                "field name must not be empty",
            ));
        }
        if name.starts_with(&self.config.member_prefix) {
            return Err(ProxyError::invalid_configuration(
                &self.entity,
                format!(
                    "field name '{}' uses the reserved prefix '{}'",
                    name, self.config.member_prefix
                ),
            ));
        }
        if self.config.validate_field_names && !is_valid_field_name(name) {
            return Err(ProxyError::invalid_configuration(
                &self.entity,
                format!("'{}' is not a valid GraphQL name", name),
            ));
        }
        Ok(())
    }

    fn infer_field_type(&self, name: &str, expression: &Lambda) -> Result<DataType> {
        let entity = DataType::entity(&self.entity);
        let params = match expression.arity() {
            1 => vec![entity],
            2 => vec![DataType::Any, entity],
            n => {
                return Err(ProxyError::invalid_configuration(
                    &self.entity,
                    format!(
                        "field '{}' expression must take (entity) or (context, entity), found {} parameter(s)",
                        name, n
                    ),
                ));
            }
        };
        TypeInference::new(&self.catalog)
            .infer_lambda(expression, &params)
            .map_err(|err| {
                ProxyError::invalid_configuration(
                    &self.entity,
                    format!("field '{}' expression '{}': {}", name, expression, err),
                )
            })
    }

    fn infer_dependency_type(&self, expression: &Lambda) -> Result<DataType> {
        if expression.arity() != 1 {
            return Err(ProxyError::invalid_configuration(
                &self.entity,
                format!(
                    "dependency '{}' must take exactly one (entity) parameter",
                    expression
                ),
            ));
        }
        TypeInference::new(&self.catalog)
            .infer_lambda(expression, &[DataType::entity(&self.entity)])
            .map_err(|err| {
                ProxyError::invalid_configuration(
                    &self.entity,
                    format!("dependency '{}': {}", expression, err),
                )
            })
    }
}

impl fmt::Debug for ProxyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAccessor")
            .field("entity", &self.entity)
            .field("fields", &self.fields.len())
            .field("members", &self.members.len())
            .field("hooks", &self.hooks.len())
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

fn field_set<I, S>(field_names: I) -> FieldSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    field_names
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect()
}
