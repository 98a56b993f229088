pub mod benchmark;
pub mod confidence;
pub mod config;
pub mod error;
pub mod execution;
pub mod io;
pub mod learning;
pub mod paths;
pub mod services;
pub mod signals;
pub mod types;

pub use error::{AutonomyError, Result};
pub use services::Services;
