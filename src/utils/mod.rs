//! Utility modules

pub mod memory_gateway;
pub mod validation;

pub use memory_gateway::*;
pub use validation::*;
