pub mod arithmetic;
pub mod comparison;
pub mod function;
pub mod logical;
