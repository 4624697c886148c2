//!
//! Utility module for the ledger monitor.
//!
//! Re-exports address decoding and formatting helpers used throughout the codebase.
/// Neo address decoding
pub mod address;
/// Utility functions for formatting and display
pub mod index;

pub use address::{AddressError, NeoAddress};
pub use index::format_token_amount;
