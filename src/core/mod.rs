pub mod error;
pub mod types;
pub mod value;

pub use error::{ProxyError, Result};
pub use types::{DataType, EntityMember, EntitySchema};
pub use value::{Record, Value};
