use crate::core::{ProxyError, Result, Value};
use crate::evaluator::{EvaluationContext, ExpressionEvaluator};
use crate::expression::Expr;

pub struct FunctionEvaluator;

impl ExpressionEvaluator for FunctionEvaluator {
    fn name(&self) -> &'static str {
        "FUNCTION"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Call { .. })
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        let Expr::Call { function, args } = expr else {
            unreachable!()
        };

        let name = function.to_uppercase();
        // MAP takes its projection unevaluated
        if name == "MAP" {
            return self.map(args, context);
        }

        let mut eval_args = Vec::with_capacity(args.len());
        for arg in args {
            eval_args.push(context.evaluate(arg)?);
        }

        match name.as_str() {
            "UPPER" => self.upper(&eval_args),
            "LOWER" => self.lower(&eval_args),
            "LENGTH" => self.length(&eval_args),
            "COALESCE" => self.coalesce(&eval_args),
            "CONCAT" => self.concat(&eval_args),
            "COUNT" => self.count(&eval_args),
            "SUM" => self.sum(&eval_args),
            _ => Err(ProxyError::UnsupportedOperation(format!(
                "Unknown function: {}",
                function
            ))),
        }
    }
}

impl FunctionEvaluator {
    fn upper(&self, args: &[Value]) -> Result<Value> {
        if args.len() != 1 {
            return Err(ProxyError::EvaluationError("UPPER expects 1 argument".into()));
        }
        match &args[0] {
            Value::Text(s) => Ok(Value::Text(s.to_uppercase())),
            Value::Null => Ok(Value::Null),
            v => Ok(Value::Text(v.to_string().to_uppercase())),
        }
    }

    fn lower(&self, args: &[Value]) -> Result<Value> {
        if args.len() != 1 {
            return Err(ProxyError::EvaluationError("LOWER expects 1 argument".into()));
        }
        match &args[0] {
            Value::Text(s) => Ok(Value::Text(s.to_lowercase())),
            Value::Null => Ok(Value::Null),
            v => Ok(Value::Text(v.to_string().to_lowercase())),
        }
    }

    fn length(&self, args: &[Value]) -> Result<Value> {
        if args.len() != 1 {
            return Err(ProxyError::EvaluationError("LENGTH expects 1 argument".into()));
        }
        match &args[0] {
            Value::Text(s) => Ok(Value::Integer(s.chars().count() as i64)),
            Value::Null => Ok(Value::Null),
            _ => Err(ProxyError::TypeMismatch("LENGTH expects Text".into())),
        }
    }

    fn coalesce(&self, args: &[Value]) -> Result<Value> {
        for arg in args {
            if !matches!(arg, Value::Null) {
                return Ok(arg.clone());
            }
        }
        Ok(Value::Null)
    }

    fn concat(&self, args: &[Value]) -> Result<Value> {
        let mut out = String::new();
        for arg in args {
            if !arg.is_null() {
                out.push_str(&arg.to_string());
            }
        }
        Ok(Value::Text(out))
    }

    fn count(&self, args: &[Value]) -> Result<Value> {
        match args {
            [Value::List(items)] => Ok(Value::Integer(items.len() as i64)),
            [Value::Null] => Ok(Value::Integer(0)),
            _ => Err(ProxyError::TypeMismatch("COUNT expects a single list".into())),
        }
    }

    fn sum(&self, args: &[Value]) -> Result<Value> {
        let [Value::List(items)] = args else {
            return Err(ProxyError::TypeMismatch("SUM expects a single list".into()));
        };
        let mut int_total: i64 = 0;
        let mut float_total: Option<f64> = None;
        for item in items {
            match item {
                Value::Null => {}
                Value::Integer(i) => match float_total.as_mut() {
                    Some(total) => *total += *i as f64,
                    None => {
                        int_total = int_total.checked_add(*i).ok_or_else(|| {
                            ProxyError::EvaluationError("Integer overflow in SUM".into())
                        })?
                    }
                },
                Value::Float(f) => {
                    *float_total.get_or_insert(int_total as f64) += *f;
                }
                other => {
                    return Err(ProxyError::TypeMismatch(format!(
                        "SUM expects numbers, got {}",
                        other.type_name()
                    )));
                }
            }
        }
        Ok(float_total.map_or(Value::Integer(int_total), Value::Float))
    }

    fn map(&self, args: &[Expr], context: &EvaluationContext<'_>) -> Result<Value> {
        let [source, Expr::Lambda(projection)] = args else {
            return Err(ProxyError::EvaluationError(
                "MAP expects a list and a single-parameter lambda".into(),
            ));
        };
        match context.evaluate(source)? {
            Value::Null => Ok(Value::Null),
            Value::List(items) => items
                .into_iter()
                .map(|item| context.invoke(projection, vec![item]))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(ProxyError::TypeMismatch(format!(
                "MAP expects a list, got {}",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{Record, Value};
    use crate::evaluator::EvaluatorRegistry;
    use crate::expression::{Expr, lambda};

    fn order(total: Value) -> Value {
        Value::from(Record::new("Order").with("Total", total))
    }

    #[test]
    fn test_string_functions() {
        let registry = EvaluatorRegistry::default();
        let p = Value::from(Record::new("Person").with("First", "Ann").with("Last", "Lee"));

        let full = lambda(
            ["p"],
            Expr::call(
                "UPPER",
                vec![Expr::call(
                    "CONCAT",
                    vec![
                        Expr::param("p").member("First"),
                        Expr::constant(" "),
                        Expr::param("p").member("Last"),
                    ],
                )],
            ),
        );
        assert_eq!(
            registry.evaluate_lambda(&full, vec![p]).unwrap(),
            Value::Text("ANN LEE".into())
        );
    }

    #[test]
    fn test_map_sum_count() {
        let registry = EvaluatorRegistry::default();
        let customer = Value::from(Record::new("Customer").with(
            "Orders",
            vec![order(Value::Integer(10)), order(Value::Integer(5)), order(Value::Null)],
        ));

        let totals = Expr::call(
            "MAP",
            vec![
                Expr::param("c").member("Orders"),
                lambda(["o"], Expr::param("o").member("Total")).into(),
            ],
        );
        let sum = lambda(["c"], Expr::call("SUM", vec![totals.clone()]));
        let count = lambda(["c"], Expr::call("count", vec![totals]));

        assert_eq!(
            registry.evaluate_lambda(&sum, vec![customer.clone()]).unwrap(),
            Value::Integer(15)
        );
        assert_eq!(
            registry.evaluate_lambda(&count, vec![customer]).unwrap(),
            Value::Integer(3)
        );
    }

    #[test]
    fn test_sum_promotes_to_float() {
        let registry = EvaluatorRegistry::default();
        let sum = lambda(["xs"], Expr::call("SUM", vec![Expr::param("xs")]));
        let xs = Value::List(vec![Value::Integer(1), Value::Float(0.5)]);
        assert_eq!(registry.evaluate_lambda(&sum, vec![xs]).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_unknown_function() {
        let registry = EvaluatorRegistry::default();
        let bad = lambda(["x"], Expr::call("NOPE", vec![Expr::param("x")]));
        assert!(registry.evaluate_lambda(&bad, vec![Value::Null]).is_err());
    }
}
