//! GAP-level identities of the two relayed peers

pub mod types;

pub use types::*;
