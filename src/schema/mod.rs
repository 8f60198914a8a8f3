pub mod catalog;
pub mod field;

pub use catalog::EntityCatalog;
pub use field::{Field, is_valid_field_name};
