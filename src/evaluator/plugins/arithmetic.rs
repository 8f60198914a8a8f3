use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{ProxyError, Result, Value};
use crate::expression::{BinaryOp, Expr};

pub struct ArithmeticEvaluator;

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn name(&self) -> &'static str {
        "ARITHMETIC"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Binary { op, .. } if op.is_arithmetic())
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        let Expr::Binary { left, op, right } = expr else {
            unreachable!();
        };

        let left_val = context.evaluate(left)?;
        let right_val = context.evaluate(right)?;

        match (left_val, right_val) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),

            (Value::Integer(a), Value::Integer(b)) => {
                let result = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Subtract => a.checked_sub(b),
                    BinaryOp::Multiply => a.checked_mul(b),
                    BinaryOp::Divide => {
                        if b == 0 {
                            return Err(ProxyError::EvaluationError("Division by zero".into()));
                        }
                        a.checked_div(b)
                    }
                    BinaryOp::Modulo => {
                        if b == 0 {
                            return Err(ProxyError::EvaluationError("Modulo by zero".into()));
                        }
                        a.checked_rem(b)
                    }
                    _ => unreachable!(),
                };
                result.map(Value::Integer).ok_or_else(|| {
                    ProxyError::EvaluationError(format!("Integer overflow in {} {} {}", a, op, b))
                })
            }

            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(apply_float(*op, a, b))),

            // Mixed Integer/Float arithmetic - always returns Float
            (Value::Integer(a), Value::Float(b)) => Ok(Value::Float(apply_float(*op, a as f64, b))),
            (Value::Float(a), Value::Integer(b)) => Ok(Value::Float(apply_float(*op, a, b as f64))),

            (a, b) => Err(ProxyError::TypeMismatch(format!(
                "Arithmetic requires numeric types, got {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }
}

fn apply_float(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{Record, Value};
    use crate::evaluator::EvaluatorRegistry;
    use crate::expression::{BinaryOp, Expr, lambda};

    #[test]
    fn test_integer_and_mixed_arithmetic() {
        let registry = EvaluatorRegistry::default();
        let order = Value::from(Record::new("Order").with("Qty", 3i64).with("Price", 2.5));

        let total = lambda(
            ["o"],
            Expr::param("o")
                .member("Qty")
                .binary(BinaryOp::Multiply, Expr::param("o").member("Price")),
        );
        assert_eq!(
            registry.evaluate_lambda(&total, vec![order.clone()]).unwrap(),
            Value::Float(7.5)
        );

        let next = lambda(["o"], Expr::param("o").member("Qty").plus(Expr::constant(1i64)));
        assert_eq!(
            registry.evaluate_lambda(&next, vec![order]).unwrap(),
            Value::Integer(4)
        );
    }

    #[test]
    fn test_division_by_zero() {
        let registry = EvaluatorRegistry::default();
        let div = lambda(
            ["x"],
            Expr::param("x").binary(BinaryOp::Divide, Expr::constant(0i64)),
        );
        assert!(registry.evaluate_lambda(&div, vec![Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_null_operand_yields_null() {
        let registry = EvaluatorRegistry::default();
        let add = lambda(["x"], Expr::param("x").plus(Expr::constant(1i64)));
        assert_eq!(
            registry.evaluate_lambda(&add, vec![Value::Null]).unwrap(),
            Value::Null
        );
    }
}
