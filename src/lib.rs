//! # Recon Core
//!
//! A bank statement reconciliation engine: match statement lines to
//! unreconciled ledger entries, review the proposed match set, and
//! commit the approved selection atomically.
//!
//! ## Features
//!
//! - **Sequence validation**: a statement is only processed when its
//!   declared opening balance follows the account's last reconciled
//!   balance; gaps and already-absorbed statements are named outcomes
//! - **Transaction matching**: deterministic greedy one-to-one pairing
//!   by amount, date, reference, and description signals, partitioned
//!   into auto, suggested, and unmatched tiers
//! - **Disposition tracking**: per-line selection and manual override
//!   state with a single derived commit-readiness predicate
//! - **Atomic commit**: the selected set posts under one statement
//!   number through a single gateway call, or not at all
//! - **Storage abstraction**: ledger access behind trait-based
//!   gateway and directory contracts
//!
//! ## Quick Start
//!
//! ```rust
//! use recon_core::{MemoryGateway, Reconciler};
//!
//! // The engine is storage-agnostic: bring your own LedgerGateway and
//! // AccountDirectory, or use MemoryGateway for tests.
//! let gateway = MemoryGateway::new();
//! let reconciler = Reconciler::new(gateway.clone(), gateway);
//! assert!(!reconciler.has_session());
//! ```

pub mod recon;
pub mod session;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use recon::*;
pub use session::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_gateway::MemoryGateway;
