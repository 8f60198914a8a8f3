use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::Value;

/// Expression types
///
/// Field computations, dependencies and hook extractions are all lambdas over
/// this tree. Equality is structural; use [`Lambda::canonical`] to compare
/// lambdas modulo parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a lambda parameter
    Parameter(String),

    /// Member access (p.Manager)
    Member { target: Box<Expr>, name: String },

    /// Constant value
    Constant(Value),

    /// Binary operation (a + b, a = b, etc.)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation (NOT x, -x)
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// Function call (UPPER, COALESCE, MAP, ...)
    Call { function: String, args: Vec<Expr> },

    /// test ? if_true : if_false
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },

    /// Nested lambda, e.g. the projection passed to MAP
    Lambda(Box<Lambda>),

    /// Member-init of a generated shape
    Construct {
        shape: String,
        members: Vec<MemberInit>,
        original: Option<Box<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberInit {
    pub member: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Expr,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
}

impl Expr {
    pub fn param(name: impl Into<String>) -> Self {
        Self::Parameter(name.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            function: function.into(),
            args,
        }
    }

    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Self {
        Self::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn member(self, name: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    pub fn binary(self, op: BinaryOp, right: Expr) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn plus(self, right: Expr) -> Self {
        self.binary(BinaryOp::Add, right)
    }

    pub fn equals(self, right: Expr) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn and(self, right: Expr) -> Self {
        self.binary(BinaryOp::And, right)
    }

    pub fn negate(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            expr: Box::new(self),
        }
    }

    /// Walks the tree depth-first, parents before children.
    pub fn visit<'a>(&'a self, visitor: &mut impl FnMut(&'a Expr)) {
        visitor(self);
        match self {
            Expr::Parameter(_) | Expr::Constant(_) => {}
            Expr::Member { target, .. } => target.visit(visitor),
            Expr::Binary { left, right, .. } => {
                left.visit(visitor);
                right.visit(visitor);
            }
            Expr::Unary { expr, .. } => expr.visit(visitor),
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.visit(visitor)),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                test.visit(visitor);
                if_true.visit(visitor);
                if_false.visit(visitor);
            }
            Expr::Lambda(lambda) => lambda.body.visit(visitor),
            Expr::Construct {
                members, original, ..
            } => {
                members.iter().for_each(|init| init.value.visit(visitor));
                if let Some(original) = original {
                    original.visit(visitor);
                }
            }
        }
    }
}

impl Lambda {
    pub fn new<I, S>(params: I, body: Expr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            body,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl From<Lambda> for Expr {
    fn from(lambda: Lambda) -> Self {
        Expr::Lambda(Box::new(lambda))
    }
}

/// `lambda(["p"], Expr::param("p").member("Id"))` reads as `p => p.Id`.
pub fn lambda<I, S>(params: I, body: Expr) -> Lambda
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Lambda::new(params, body)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(name) => write!(f, "{}", name),
            Expr::Member { target, name } => write!(f, "{}.{}", target, name),
            Expr::Constant(Value::Text(s)) => write!(f, "'{}'", s),
            Expr::Constant(val) => write!(f, "{}", val),
            Expr::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Unary { op, expr } => write!(f, "{}{}", op, expr),
            Expr::Call { function, args } => {
                let args_str: Vec<String> = args.iter().map(|e| e.to_string()).collect();
                write!(f, "{}({})", function, args_str.join(", "))
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "({} ? {} : {})", test, if_true, if_false),
            Expr::Lambda(lambda) => write!(f, "{}", lambda),
            Expr::Construct {
                shape,
                members,
                original,
            } => {
                let mut parts: Vec<String> = members
                    .iter()
                    .map(|init| format!("{} = {}", init.member, init.value))
                    .collect();
                if let Some(original) = original {
                    parts.push(format!("<original> = {}", original));
                }
                write!(f, "new {} {{ {} }}", shape, parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params.as_slice() {
            [single] => write!(f, "{} => {}", single, self.body),
            params => write!(f, "({}) => {}", params.join(", "), self.body),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Subtract => write!(f, "-"),
            BinaryOp::Multiply => write!(f, "*"),
            BinaryOp::Divide => write!(f, "/"),
            BinaryOp::Modulo => write!(f, "%"),
            BinaryOp::Eq => write!(f, "=="),
            BinaryOp::NotEq => write!(f, "!="),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::LtEq => write!(f, "<="),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::GtEq => write!(f, ">="),
            BinaryOp::And => write!(f, "&&"),
            BinaryOp::Or => write!(f, "||"),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Minus => write!(f, "-"),
        }
    }
}
