pub mod ast;
pub mod infer;
pub mod rewrite;

pub use ast::{lambda, BinaryOp, Expr, Lambda, MemberInit, UnaryOp};
pub use infer::TypeInference;
pub use rewrite::ExprKey;
