//! Firewall engine
//!
//! The engine sits between the master-facing and the slave-facing
//! connections. For every PDU it translates attribute handles between the
//! real and the virtual handle space, removes hidden attributes from
//! discovery responses, and applies the BLE_TABLES rules.

pub mod engine;
pub mod reply;


pub use engine::{FirewallEngine, Verdict};
pub use reply::ErrorReply;
