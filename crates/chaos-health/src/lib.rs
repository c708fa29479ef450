pub mod alerts;
pub mod cerberus;
pub mod error;
pub mod status;

pub use alerts::*;
pub use cerberus::*;
pub use error::*;
pub use status::*;
