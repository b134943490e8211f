//! Disposition session: per-line decision state and commit readiness

pub mod disposition;
pub mod tracker;

pub use disposition::*;
pub use tracker::*;
