//! Consensus Module
//!
//! Implements proof-of-work consensus:
//! - Numeric-target nonce search on parallel workers
//! - Difficulty retargeting every `retarget_interval` blocks
//! - Chain state with snapshot readers and a single writer

pub mod chain;
pub mod difficulty;
pub mod pow;

pub use chain::{Blockchain, ChainSnapshot};
pub use difficulty::retarget;
pub use pow::{CancelToken, MiningObserver, NonceSearch, Target, TracingObserver};
