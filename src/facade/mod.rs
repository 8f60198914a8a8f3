pub mod pipeline;
pub mod registry;

pub use pipeline::{EntitySource, InMemorySource, ProjectionPipeline};
pub use registry::ProxyRegistry;
