pub mod plugins;

use std::collections::HashMap;

use tracing::{Level, event};

use crate::core::{ProxyError, Record, Result, Value};
use crate::expression::{Expr, Lambda, UnaryOp};

/// Record member under which a constructed shape carries its source entity.
pub const ORIGINAL_MEMBER: &str = "$original";

/// Evaluates one family of expressions.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluator name for diagnostics
    fn name(&self) -> &'static str;

    /// Can this evaluator handle the expression?
    fn can_evaluate(&self, expr: &Expr) -> bool;

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value>;
}

/// Parameter bindings plus access to the registry for nested evaluation.
pub struct EvaluationContext<'a> {
    registry: &'a EvaluatorRegistry,
    bindings: HashMap<String, Value>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(registry: &'a EvaluatorRegistry) -> Self {
        Self {
            registry,
            bindings: HashMap::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    /// Evaluate through the structural base cases or a matching evaluator
    pub fn evaluate(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Parameter(name) => {
                return self.bindings.get(name).cloned().ok_or_else(|| {
                    ProxyError::EvaluationError(format!("Unbound parameter '{}'", name))
                });
            }
            Expr::Constant(value) => return Ok(value.clone()),
            Expr::Member { target, name } => return self.evaluate(target)?.member(name),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                return if self.evaluate(test)?.as_bool() {
                    self.evaluate(if_true)
                } else {
                    self.evaluate(if_false)
                };
            }
            Expr::Unary { op, expr } => {
                let operand = self.evaluate(expr)?;
                return match (op, operand) {
                    (UnaryOp::Not, Value::Null) => Ok(Value::Null),
                    (UnaryOp::Not, v) => Ok(Value::Boolean(!v.as_bool())),
                    (UnaryOp::Minus, Value::Integer(i)) => Ok(Value::Integer(-i)),
                    (UnaryOp::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Minus, Value::Null) => Ok(Value::Null),
                    (UnaryOp::Minus, v) => Err(ProxyError::TypeMismatch(format!(
                        "Cannot negate a value of type {}",
                        v.type_name()
                    ))),
                };
            }
            Expr::Construct {
                shape,
                members,
                original,
            } => {
                let mut record = Record::new(shape.clone());
                for init in members {
                    record.set(init.member.clone(), self.evaluate(&init.value)?);
                }
                if let Some(original) = original {
                    record.set(ORIGINAL_MEMBER, self.evaluate(original)?);
                }
                return Ok(Value::from(record));
            }
            _ => {}
        }

        if let Some(evaluator) = self.registry.find_evaluator(expr) {
            return evaluator.evaluate(expr, self);
        }

        Err(ProxyError::UnsupportedOperation(format!(
            "No evaluator found for expression: {}",
            expr
        )))
    }

    /// Invoke a lambda with positional arguments in a child scope.
    pub fn invoke(&self, lambda: &Lambda, args: Vec<Value>) -> Result<Value> {
        if lambda.params.len() != args.len() {
            return Err(ProxyError::EvaluationError(format!(
                "Lambda '{}' expects {} argument(s), got {}",
                lambda,
                lambda.params.len(),
                args.len()
            )));
        }
        let mut bindings = self.bindings.clone();
        for (param, arg) in lambda.params.iter().zip(args) {
            bindings.insert(param.clone(), arg);
        }
        let child = EvaluationContext {
            registry: self.registry,
            bindings,
        };
        child.evaluate(&lambda.body)
    }
}

/// Registry of evaluators
pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn ExpressionEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    pub fn register(&mut self, evaluator: Box<dyn ExpressionEvaluator>) {
        event!(Level::TRACE, evaluator = evaluator.name(), "registered evaluator");
        self.evaluators.push(evaluator);
    }

    /// Registry with every built-in evaluator
    pub fn with_default_evaluators() -> Self {
        use plugins::*;

        let mut registry = Self::new();

        registry.register(Box::new(logical::LogicalEvaluator));
        registry.register(Box::new(comparison::ComparisonEvaluator));
        registry.register(Box::new(arithmetic::ArithmeticEvaluator));
        registry.register(Box::new(function::FunctionEvaluator));

        registry
    }

    /// Evaluate a closed lambda against positional arguments
    pub fn evaluate_lambda(&self, lambda: &Lambda, args: Vec<Value>) -> Result<Value> {
        EvaluationContext::new(self).invoke(lambda, args)
    }

    fn find_evaluator(&self, expr: &Expr) -> Option<&dyn ExpressionEvaluator> {
        self.evaluators
            .iter()
            .find(|ev| ev.can_evaluate(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_default_evaluators()
    }
}
