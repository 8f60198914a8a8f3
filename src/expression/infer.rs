use std::collections::HashMap;

use super::ast::{BinaryOp, Expr, Lambda, UnaryOp};
use crate::core::{DataType, ProxyError, Result};
use crate::schema::EntityCatalog;

/// Static result-type inference for lambdas over catalog entities.
///
/// Member access is resolved through the catalog; anything the catalog cannot
/// describe (context variables, unknown functions) narrows to `DataType::Any`.
pub struct TypeInference<'a> {
    catalog: &'a EntityCatalog,
}

impl<'a> TypeInference<'a> {
    pub fn new(catalog: &'a EntityCatalog) -> Self {
        Self { catalog }
    }

    pub fn infer_lambda(&self, lambda: &Lambda, param_types: &[DataType]) -> Result<DataType> {
        if lambda.params.len() != param_types.len() {
            return Err(ProxyError::TypeMismatch(format!(
                "Lambda '{}' has {} parameter(s), {} type(s) supplied",
                lambda,
                lambda.params.len(),
                param_types.len()
            )));
        }
        let scope: HashMap<String, DataType> = lambda
            .params
            .iter()
            .cloned()
            .zip(param_types.iter().cloned())
            .collect();
        self.infer(&lambda.body, &scope)
    }

    pub fn infer(&self, expr: &Expr, scope: &HashMap<String, DataType>) -> Result<DataType> {
        match expr {
            Expr::Parameter(name) => scope.get(name).cloned().ok_or_else(|| {
                ProxyError::EvaluationError(format!("Unbound parameter '{}'", name))
            }),
            Expr::Constant(value) => Ok(DataType::of_value(value)),
            Expr::Member { target, name } => {
                let target_type = self.infer(target, scope)?;
                self.member_type(&target_type, name)
            }
            Expr::Binary { left, op, right } => {
                let left = self.infer(left, scope)?;
                let right = self.infer(right, scope)?;
                Self::binary_type(&left, *op, &right)
            }
            Expr::Unary { op, expr } => {
                let operand = self.infer(expr, scope)?;
                match op {
                    UnaryOp::Not => Ok(DataType::Boolean),
                    UnaryOp::Minus if operand.is_numeric() || operand == DataType::Any => {
                        Ok(operand)
                    }
                    UnaryOp::Minus => Err(ProxyError::TypeMismatch(format!(
                        "Cannot negate a value of type {}",
                        operand
                    ))),
                }
            }
            Expr::Call { function, args } => self.call_type(function, args, scope),
            Expr::Conditional {
                if_true, if_false, ..
            } => {
                let if_true = self.infer(if_true, scope)?;
                let if_false = self.infer(if_false, scope)?;
                Ok(if if_true == if_false { if_true } else { DataType::Any })
            }
            Expr::Lambda(_) => Ok(DataType::Any),
            Expr::Construct { shape, .. } => Ok(DataType::Entity(shape.clone())),
        }
    }

    fn member_type(&self, target: &DataType, name: &str) -> Result<DataType> {
        match target {
            DataType::Entity(entity) => {
                let schema = self.catalog.get_entity(entity)?;
                schema
                    .get_member(name)
                    .map(|member| member.data_type.clone())
                    .ok_or_else(|| {
                        ProxyError::EvaluationError(format!(
                            "'{}' has no member '{}'",
                            entity, name
                        ))
                    })
            }
            DataType::Any => Ok(DataType::Any),
            other => Err(ProxyError::TypeMismatch(format!(
                "Member access '{}' on non-entity type {}",
                name, other
            ))),
        }
    }

    fn binary_type(left: &DataType, op: BinaryOp, right: &DataType) -> Result<DataType> {
        if op.is_comparison() || op.is_logical() {
            return Ok(DataType::Boolean);
        }
        match (left, right) {
            (DataType::Integer, DataType::Integer) => Ok(DataType::Integer),
            (DataType::Float, DataType::Float)
            | (DataType::Integer, DataType::Float)
            | (DataType::Float, DataType::Integer) => Ok(DataType::Float),
            (DataType::Any, _) | (_, DataType::Any) => Ok(DataType::Any),
            (a, b) => Err(ProxyError::TypeMismatch(format!(
                "Arithmetic requires numeric types, got {} and {}",
                a, b
            ))),
        }
    }

    fn call_type(
        &self,
        function: &str,
        args: &[Expr],
        scope: &HashMap<String, DataType>,
    ) -> Result<DataType> {
        match function.to_uppercase().as_str() {
            "UPPER" | "LOWER" | "CONCAT" => Ok(DataType::Text),
            "LENGTH" | "COUNT" => Ok(DataType::Integer),
            "COALESCE" => {
                for arg in args {
                    let ty = self.infer(arg, scope)?;
                    if ty != DataType::Any {
                        return Ok(ty);
                    }
                }
                Ok(DataType::Any)
            }
            "SUM" => match args.first().map(|a| self.infer(a, scope)).transpose()? {
                Some(DataType::List(item)) if item.is_numeric() => Ok(*item),
                _ => Ok(DataType::Any),
            },
            "MAP" => {
                let [source, Expr::Lambda(projection)] = args else {
                    return Ok(DataType::list_of(DataType::Any));
                };
                let item = match self.infer(source, scope)? {
                    DataType::List(item) => *item,
                    _ => DataType::Any,
                };
                let mut inner = scope.clone();
                if let Some(param) = projection.params.first() {
                    inner.insert(param.clone(), item);
                }
                Ok(DataType::list_of(self.infer(&projection.body, &inner)?))
            }
            _ => Ok(DataType::Any),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityMember, EntitySchema};
    use crate::expression::lambda;

    fn catalog() -> EntityCatalog {
        EntityCatalog::new()
            .with_entity(EntitySchema::new(
                "Person",
                vec![
                    EntityMember::new("Id", DataType::Integer),
                    EntityMember::new("FullName", DataType::Text),
                    EntityMember::new("ManagerId", DataType::Integer),
                    EntityMember::new("Manager", DataType::entity("Person")),
                    EntityMember::new("Salary", DataType::Float),
                    EntityMember::new("Reports", DataType::list_of(DataType::entity("Person"))),
                ],
            ))
            .unwrap()
    }

    #[test]
    fn test_member_navigation() {
        let catalog = catalog();
        let inference = TypeInference::new(&catalog);
        let manager_name = lambda(["p"], Expr::param("p").member("Manager").member("FullName"));

        let ty = inference
            .infer_lambda(&manager_name, &[DataType::entity("Person")])
            .unwrap();
        assert_eq!(ty, DataType::Text);
    }

    #[test]
    fn test_numeric_promotion_and_comparison() {
        let catalog = catalog();
        let inference = TypeInference::new(&catalog);
        let person = [DataType::entity("Person")];

        let mixed = lambda(["p"], Expr::param("p").member("Id").plus(Expr::param("p").member("Salary")));
        assert_eq!(inference.infer_lambda(&mixed, &person).unwrap(), DataType::Float);

        let cmp = lambda(["p"], Expr::param("p").member("Id").equals(Expr::constant(1i64)));
        assert_eq!(inference.infer_lambda(&cmp, &person).unwrap(), DataType::Boolean);

        let bad = lambda(["p"], Expr::param("p").member("FullName").plus(Expr::constant(1i64)));
        assert!(inference.infer_lambda(&bad, &person).is_err());
    }

    #[test]
    fn test_map_over_list_member() {
        let catalog = catalog();
        let inference = TypeInference::new(&catalog);
        let report_ids = lambda(
            ["p"],
            Expr::call(
                "MAP",
                vec![
                    Expr::param("p").member("Reports"),
                    lambda(["r"], Expr::param("r").member("Id")).into(),
                ],
            ),
        );
        assert_eq!(
            inference
                .infer_lambda(&report_ids, &[DataType::entity("Person")])
                .unwrap(),
            DataType::list_of(DataType::Integer)
        );
    }

    #[test]
    fn test_context_members_are_untyped() {
        let catalog = catalog();
        let inference = TypeInference::new(&catalog);
        let owner = lambda(["ctx", "p"], Expr::param("ctx").member("UserId"));
        assert_eq!(
            inference
                .infer_lambda(&owner, &[DataType::Any, DataType::entity("Person")])
                .unwrap(),
            DataType::Any
        );
    }

    #[test]
    fn test_unknown_member_is_reported() {
        let catalog = catalog();
        let inference = TypeInference::new(&catalog);
        let missing = lambda(["p"], Expr::param("p").member("Nope"));
        assert!(inference
            .infer_lambda(&missing, &[DataType::entity("Person")])
            .is_err());
    }
}
