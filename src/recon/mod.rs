//! Reconciliation engine: sequencing, matching, commit, orchestration

pub mod commit;
pub mod core;
pub mod matching;
pub mod sequence;

pub use self::core::*;
pub use commit::*;
pub use matching::*;
pub use sequence::*;
