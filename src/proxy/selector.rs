use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::instance::ProxyInstance;
use super::shape::ProxyShape;
use crate::core::{ProxyError, Result, Value};
use crate::evaluator::{EvaluationContext, EvaluatorRegistry};
use crate::executor::ExecutionContext;
use crate::expression::{Expr, Lambda, MemberInit};

/// Parameter names of every selector lambda.
pub const CONTEXT_PARAM: &str = "$ctx";
pub const ENTITY_PARAM: &str = "$entity";

/// The composed `(ctx, entity) -> shape` construction rule for one field-set.
#[derive(Debug)]
pub struct Selector {
    shape: Arc<ProxyShape>,
    bindings: Vec<(usize, Expr)>,
    bind_original: bool,
    lambda: Lambda,
}

impl Selector {
    pub fn shape(&self) -> &Arc<ProxyShape> {
        &self.shape
    }

    /// The selector as an expression tree, for substitution into an outer query.
    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    pub fn binds_original(&self) -> bool {
        self.bind_original
    }

    /// Builds the proxy for one source entity. Members without a binding stay NULL.
    pub fn evaluate(
        &self,
        evaluator: &EvaluatorRegistry,
        ctx: &ExecutionContext,
        entity: &Value,
    ) -> Result<ProxyInstance> {
        let context = EvaluationContext::new(evaluator)
            .bind(CONTEXT_PARAM, ctx.as_value())
            .bind(ENTITY_PARAM, entity.clone());

        let mut values = vec![Value::Null; self.shape.members().len()];
        for (idx, expr) in &self.bindings {
            values[*idx] = context.evaluate(expr)?;
        }
        let original = self.bind_original.then(|| entity.clone());
        ProxyInstance::new(Arc::clone(&self.shape), values, original)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lambda)
    }
}

/// Accumulates member bindings for one shape. Each member may be bound once.
#[derive(Debug)]
pub struct SelectorBuilder {
    shape: Arc<ProxyShape>,
    bindings: Vec<(usize, Expr)>,
    bound: HashSet<String>,
    bind_original: bool,
}

impl SelectorBuilder {
    pub fn new(shape: Arc<ProxyShape>) -> Self {
        Self {
            shape,
            bindings: Vec::new(),
            bound: HashSet::new(),
            bind_original: false,
        }
    }

    /// Binds a field's computation. `entity => ..` and `(ctx, entity) => ..`
    /// are both re-parameterized onto the selector's parameters.
    pub fn bind_field(&mut self, member: &str, expression: &Lambda) -> Result<&mut Self> {
        let body = match expression.arity() {
            1 => expression.apply(&[Expr::param(ENTITY_PARAM)])?,
            2 => expression.apply(&[Expr::param(CONTEXT_PARAM), Expr::param(ENTITY_PARAM)])?,
            n => {
                return Err(ProxyError::invalid_configuration(
                    self.shape.entity(),
                    format!(
                        "field '{}' expression must take (entity) or (context, entity), found {} parameter(s)",
                        member, n
                    ),
                ));
            }
        };
        self.bind(member, body)
    }

    /// Binds a dependency expression `entity => ..` to its synthetic member.
    pub fn bind_dependency(&mut self, member: &str, dependency: &Lambda) -> Result<&mut Self> {
        if dependency.arity() != 1 {
            return Err(ProxyError::invalid_configuration(
                self.shape.entity(),
                format!(
                    "dependency '{}' must take exactly one (entity) parameter",
                    dependency
                ),
            ));
        }
        let body = dependency.apply(&[Expr::param(ENTITY_PARAM)])?;
        self.bind(member, body)
    }

    pub fn bind_original(&mut self) -> Result<&mut Self> {
        if !self.shape.with_original() {
            return Err(ProxyError::UnknownMember {
                entity: self.shape.entity().to_string(),
                member: "<original>".to_string(),
            });
        }
        self.bind_original = true;
        Ok(self)
    }

    fn bind(&mut self, member: &str, body: Expr) -> Result<&mut Self> {
        let idx = self
            .shape
            .position(member)
            .ok_or_else(|| ProxyError::UnknownMember {
                entity: self.shape.entity().to_string(),
                member: member.to_string(),
            })?;
        if !self.bound.insert(member.to_string()) {
            return Err(ProxyError::DuplicateMember {
                shape: self.shape.name().to_string(),
                member: member.to_string(),
            });
        }
        self.bindings.push((idx, body));
        Ok(self)
    }

    pub fn build(mut self) -> Selector {
        // Member order follows the shape, independent of binding order
        self.bindings.sort_by_key(|(idx, _)| *idx);

        let members = self
            .bindings
            .iter()
            .map(|(idx, value)| MemberInit {
                member: self.shape.members()[*idx].name.clone(),
                value: value.clone(),
            })
            .collect();
        let body = Expr::Construct {
            shape: self.shape.name().to_string(),
            members,
            original: self
                .bind_original
                .then(|| Box::new(Expr::param(ENTITY_PARAM))),
        };

        Selector {
            lambda: Lambda::new([CONTEXT_PARAM, ENTITY_PARAM], body),
            shape: self.shape,
            bindings: self.bindings,
            bind_original: self.bind_original,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Record};
    use crate::expression::lambda;
    use crate::proxy::ShapeMember;

    fn shape(with_original: bool) -> Arc<ProxyShape> {
        Arc::new(
            ProxyShape::new(
                "PersonProxy0",
                "Person",
                vec![
                    ShapeMember::new("isMine", DataType::Boolean),
                    ShapeMember::new("$m0", DataType::Integer),
                ],
                with_original,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_binding_order_does_not_matter() {
        let is_mine = lambda(
            ["ctx", "p"],
            Expr::param("p").member("OwnerId").equals(Expr::param("ctx").member("UserId")),
        );
        let id = lambda(["p"], Expr::param("p").member("Id"));

        let mut a = SelectorBuilder::new(shape(false));
        a.bind_field("isMine", &is_mine).unwrap();
        a.bind_dependency("$m0", &id).unwrap();

        let mut b = SelectorBuilder::new(shape(false));
        b.bind_dependency("$m0", &id).unwrap();
        b.bind_field("isMine", &is_mine).unwrap();

        let (a, b) = (a.build(), b.build());
        assert_eq!(a.lambda(), b.lambda());
        assert_eq!(
            a.to_string(),
            "($ctx, $entity) => new PersonProxy0 { isMine = ($entity.OwnerId == $ctx.UserId), $m0 = $entity.Id }"
        );
    }

    #[test]
    fn test_evaluate_with_context() {
        let is_mine = lambda(
            ["ctx", "p"],
            Expr::param("p").member("OwnerId").equals(Expr::param("ctx").member("UserId")),
        );
        let mut builder = SelectorBuilder::new(shape(true));
        builder.bind_field("isMine", &is_mine).unwrap();
        builder.bind_original().unwrap();
        let selector = builder.build();

        let registry = EvaluatorRegistry::default();
        let ctx = ExecutionContext::new().with_variable("UserId", 5i64);
        let entity = Value::from(Record::new("Person").with("Id", 1i64).with("OwnerId", 5i64));

        let proxy = selector.evaluate(&registry, &ctx, &entity).unwrap();
        assert_eq!(proxy.get("isMine").unwrap(), &Value::Boolean(true));
        assert_eq!(proxy.get("$m0").unwrap(), &Value::Null);
        assert_eq!(proxy.original(), Some(&entity));
    }

    #[test]
    fn test_double_binding_fails_fast() {
        let id = lambda(["p"], Expr::param("p").member("Id"));
        let mut builder = SelectorBuilder::new(shape(false));
        builder.bind_dependency("$m0", &id).unwrap();
        let err = builder.bind_dependency("$m0", &id).unwrap_err();
        assert!(matches!(err, ProxyError::DuplicateMember { .. }));
    }

    #[test]
    fn test_unknown_member_and_original() {
        let id = lambda(["p"], Expr::param("p").member("Id"));
        let mut builder = SelectorBuilder::new(shape(false));
        assert!(matches!(
            builder.bind_dependency("Id", &id),
            Err(ProxyError::UnknownMember { .. })
        ));
        assert!(builder.bind_original().is_err());
    }
}
