use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{Result, Value};
use crate::expression::{BinaryOp, Expr};

pub struct LogicalEvaluator;

impl ExpressionEvaluator for LogicalEvaluator {
    fn name(&self) -> &'static str {
        "LOGICAL"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Binary { op, .. } if op.is_logical())
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        let Expr::Binary { left, op, right } = expr else {
            unreachable!();
        };

        match op {
            BinaryOp::And => {
                let left_val = context.evaluate(left)?;
                if !left_val.as_bool() {
                    return Ok(Value::Boolean(false));
                }
                let right_val = context.evaluate(right)?;
                Ok(Value::Boolean(right_val.as_bool()))
            }

            BinaryOp::Or => {
                let left_val = context.evaluate(left)?;
                if left_val.as_bool() {
                    return Ok(Value::Boolean(true));
                }
                let right_val = context.evaluate(right)?;
                Ok(Value::Boolean(right_val.as_bool()))
            }

            _ => unreachable!(),
        }
    }
}
