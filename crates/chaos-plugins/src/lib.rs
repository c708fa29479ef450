pub mod builtin;
pub mod error;
pub mod plan;
pub mod registry;
pub mod schema;
pub mod step;

pub use builtin::*;
pub use error::*;
pub use plan::*;
pub use registry::*;
pub use schema::*;
pub use step::*;
