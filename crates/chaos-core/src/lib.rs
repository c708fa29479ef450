pub mod config;
pub mod scenario;
pub mod state;
pub mod validation;

pub use config::*;
pub use scenario::*;
pub use state::*;
pub use validation::*;
