//! Data Structures for ByteChan
//!
//! Provides:
//! - Block with its canonical hash template
//! - Transaction, TransactionBuilder, PrivacyLevel
//! - Common types (Hash256, Timestamp, Amount)
//!
//! All structures use serde for JSON and bincode for binary serialization.

pub mod block;
pub mod transaction;
pub mod types;

pub use block::{Block, HashTemplate};
pub use transaction::{AmountNote, MaskedAmount, PrivacyLevel, Transaction, TransactionBuilder};
pub use types::{Amount, Hash256, Height, Timestamp};
