use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ast::{Expr, Lambda, MemberInit};
use crate::core::{ProxyError, Result};

impl Lambda {
    /// Alpha-normalized copy: every bound parameter is renamed to `$0`, `$1`, ...
    /// in binding order. Two lambdas that differ only by parameter names have
    /// equal canonical forms.
    pub fn canonical(&self) -> Lambda {
        let mut next = 0usize;
        canonicalize_lambda(self, &HashMap::new(), &mut next)
    }

    /// Replaces every free occurrence of the lambda's parameters in its body with
    /// the matching argument expression.
    pub fn apply(&self, args: &[Expr]) -> Result<Expr> {
        if args.len() != self.params.len() {
            return Err(ProxyError::EvaluationError(format!(
                "Lambda '{}' expects {} argument(s), got {}",
                self,
                self.params.len(),
                args.len()
            )));
        }
        let bindings: HashMap<&str, &Expr> = self
            .params
            .iter()
            .map(String::as_str)
            .zip(args.iter())
            .collect();
        Ok(self.body.replace_parameters(&bindings))
    }
}

impl Expr {
    /// Substitutes free parameters by name. Parameters shadowed by a nested
    /// lambda are left alone inside that lambda.
    pub fn replace_parameters(&self, bindings: &HashMap<&str, &Expr>) -> Expr {
        match self {
            Expr::Parameter(name) => bindings
                .get(name.as_str())
                .map(|replacement| (*replacement).clone())
                .unwrap_or_else(|| self.clone()),
            Expr::Constant(_) => self.clone(),
            Expr::Member { target, name } => Expr::Member {
                target: Box::new(target.replace_parameters(bindings)),
                name: name.clone(),
            },
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(left.replace_parameters(bindings)),
                op: *op,
                right: Box::new(right.replace_parameters(bindings)),
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(expr.replace_parameters(bindings)),
            },
            Expr::Call { function, args } => Expr::Call {
                function: function.clone(),
                args: args.iter().map(|a| a.replace_parameters(bindings)).collect(),
            },
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => Expr::Conditional {
                test: Box::new(test.replace_parameters(bindings)),
                if_true: Box::new(if_true.replace_parameters(bindings)),
                if_false: Box::new(if_false.replace_parameters(bindings)),
            },
            Expr::Lambda(inner) => {
                let visible: HashMap<&str, &Expr> = bindings
                    .iter()
                    .filter(|(name, _)| !inner.params.iter().any(|p| p == *name))
                    .map(|(name, expr)| (*name, *expr))
                    .collect();
                Expr::Lambda(Box::new(Lambda {
                    params: inner.params.clone(),
                    body: inner.body.replace_parameters(&visible),
                }))
            }
            Expr::Construct {
                shape,
                members,
                original,
            } => Expr::Construct {
                shape: shape.clone(),
                members: members
                    .iter()
                    .map(|init| MemberInit {
                        member: init.member.clone(),
                        value: init.value.replace_parameters(bindings),
                    })
                    .collect(),
                original: original
                    .as_ref()
                    .map(|o| Box::new(o.replace_parameters(bindings))),
            },
        }
    }

    /// Names of parameters referenced but not bound inside this expression.
    pub fn free_parameters(&self) -> Vec<String> {
        let mut free = Vec::new();
        collect_free(self, &mut Vec::new(), &mut free);
        free
    }
}

fn canonicalize_lambda(
    lambda: &Lambda,
    outer: &HashMap<String, String>,
    next: &mut usize,
) -> Lambda {
    let mut scope = outer.clone();
    let mut params = Vec::with_capacity(lambda.params.len());
    for param in &lambda.params {
        let renamed = format!("${}", *next);
        *next += 1;
        scope.insert(param.clone(), renamed.clone());
        params.push(renamed);
    }
    Lambda {
        params,
        body: canonicalize(&lambda.body, &scope, next),
    }
}

fn canonicalize(expr: &Expr, scope: &HashMap<String, String>, next: &mut usize) -> Expr {
    match expr {
        Expr::Parameter(name) => {
            Expr::Parameter(scope.get(name).cloned().unwrap_or_else(|| name.clone()))
        }
        Expr::Constant(_) => expr.clone(),
        Expr::Member { target, name } => Expr::Member {
            target: Box::new(canonicalize(target, scope, next)),
            name: name.clone(),
        },
        Expr::Binary { left, op, right } => {
            let left = canonicalize(left, scope, next);
            let right = canonicalize(right, scope, next);
            Expr::Binary {
                left: Box::new(left),
                op: *op,
                right: Box::new(right),
            }
        }
        Expr::Unary { op, expr } => Expr::Unary {
            op: *op,
            expr: Box::new(canonicalize(expr, scope, next)),
        },
        Expr::Call { function, args } => Expr::Call {
            function: function.clone(),
            args: args.iter().map(|a| canonicalize(a, scope, next)).collect(),
        },
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => {
            let test = canonicalize(test, scope, next);
            let if_true = canonicalize(if_true, scope, next);
            let if_false = canonicalize(if_false, scope, next);
            Expr::conditional(test, if_true, if_false)
        }
        Expr::Lambda(inner) => Expr::Lambda(Box::new(canonicalize_lambda(inner, scope, next))),
        Expr::Construct {
            shape,
            members,
            original,
        } => Expr::Construct {
            shape: shape.clone(),
            members: members
                .iter()
                .map(|init| MemberInit {
                    member: init.member.clone(),
                    value: canonicalize(&init.value, scope, next),
                })
                .collect(),
            original: original
                .as_ref()
                .map(|o| Box::new(canonicalize(o, scope, next))),
        },
    }
}

fn collect_free(expr: &Expr, bound: &mut Vec<String>, free: &mut Vec<String>) {
    match expr {
        Expr::Parameter(name) => {
            if !bound.contains(name) && !free.contains(name) {
                free.push(name.clone());
            }
        }
        Expr::Lambda(inner) => {
            let depth = bound.len();
            bound.extend(inner.params.iter().cloned());
            collect_free(&inner.body, bound, free);
            bound.truncate(depth);
        }
        Expr::Constant(_) => {}
        Expr::Member { target, .. } => collect_free(target, bound, free),
        Expr::Binary { left, right, .. } => {
            collect_free(left, bound, free);
            collect_free(right, bound, free);
        }
        Expr::Unary { expr, .. } => collect_free(expr, bound, free),
        Expr::Call { args, .. } => args.iter().for_each(|a| collect_free(a, bound, free)),
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => {
            collect_free(test, bound, free);
            collect_free(if_true, bound, free);
            collect_free(if_false, bound, free);
        }
        Expr::Construct {
            members, original, ..
        } => {
            members
                .iter()
                .for_each(|init| collect_free(&init.value, bound, free));
            if let Some(original) = original {
                collect_free(original, bound, free);
            }
        }
    }
}

/// Structural identity of a dependency expression.
///
/// Wraps the canonical form of an entity lambda, so `p => p.ManagerId` and
/// `x => x.ManagerId` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExprKey(Lambda);

impl ExprKey {
    pub fn new(lambda: &Lambda) -> Self {
        Self(lambda.canonical())
    }

    pub fn lambda(&self) -> &Lambda {
        &self.0
    }
}

impl From<&Lambda> for ExprKey {
    fn from(lambda: &Lambda) -> Self {
        Self::new(lambda)
    }
}

impl fmt::Display for ExprKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
