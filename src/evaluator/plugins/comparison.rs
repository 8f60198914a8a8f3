use std::cmp::Ordering;

use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{ProxyError, Result, Value};
use crate::expression::{BinaryOp, Expr};

pub struct ComparisonEvaluator;

impl ExpressionEvaluator for ComparisonEvaluator {
    fn name(&self) -> &'static str {
        "COMPARISON"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Binary { op, .. } if op.is_comparison())
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        let Expr::Binary { left, op, right } = expr else {
            unreachable!();
        };

        let left_val = context.evaluate(left)?;
        let right_val = context.evaluate(right)?;

        let result = self.compare(&left_val, &right_val, op)?;
        Ok(Value::Boolean(result))
    }
}

impl ComparisonEvaluator {
    pub fn compare(&self, left: &Value, right: &Value, op: &BinaryOp) -> Result<bool> {
        match (left, right) {
            // Equality against NULL is meaningful for entity navigation (p.Manager == null)
            (Value::Null, Value::Null) => Ok(matches!(op, BinaryOp::Eq | BinaryOp::LtEq | BinaryOp::GtEq)),
            (Value::Null, _) | (_, Value::Null) => Ok(matches!(op, BinaryOp::NotEq)),

            (Value::Record(_), _) | (Value::List(_), _) | (Value::Proxy(_), _) => match op {
                BinaryOp::Eq => Ok(left == right),
                BinaryOp::NotEq => Ok(left != right),
                _ => Err(ProxyError::TypeMismatch(format!(
                    "Cannot order values of type {}",
                    left.type_name()
                ))),
            },

            _ => {
                let ordering = left.compare(right)?;
                Ok(match op {
                    BinaryOp::Eq => ordering == Ordering::Equal,
                    BinaryOp::NotEq => ordering != Ordering::Equal,
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::LtEq => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    BinaryOp::GtEq => ordering != Ordering::Less,
                    _ => unreachable!(),
                })
            }
        }
    }
}
