//! RustyWall - A rule-driven GATT/ATT firewall for Bluetooth LE man-in-the-middle relays
//!
//! The relay holds two connections: one to the real device (the slave) and
//! one to the peer that believes it is talking to that device (the master).
//! This library decides, for every ATT PDU crossing the relay, whether it is
//! forwarded, rewritten or dropped:
//!
//! - [`rules`] parses the BLE_TABLES / GATT_FILTER rule language,
//! - [`translator`] maps attribute handles between the real database and
//!   the virtual one shown to the master, with filtered attributes removed,
//! - [`firewall`] applies both to each PDU,
//! - [`relay`] drives a session over a caller-provided transport.

pub mod att;
pub mod discovery;
pub mod error;
pub mod firewall;
pub mod gap;
pub mod relay;
pub mod rules;
pub mod translator;

// Re-export common types for convenience
pub use att::{AttError, AttPdu, HandleField, HasAttributeList, HasHandleFields, PacketKind};
pub use discovery::{DiscoveryAdapter, DiscoveryError, DiscoverySnapshot};
pub use error::{FirewallError, RelayError, RuleError};
pub use firewall::{ErrorReply, FirewallEngine, Verdict};
pub use gap::BdAddr;
pub use relay::{Inbound, RelayConfig, RelayScenario, RelayStats, Transport};
pub use rules::{Action, Direction, Rule, RuleFile, RuleSet, UuidFilter};
pub use translator::{HandleRange, HandleTranslator};
