// Thin re-export module: implementation is in `ledger/core.rs` to keep
// chain management, account state, and validation in separate files.

pub mod core;
pub use core::*;
