//! Firewall rule language
//!
//! A rule file has up to two contexts:
//!
//! ```text
//! BLE_TABLES
//! action deny type ReadRequest handle 0x0021   // first match wins
//! action allow type WriteRequest handle 0x0025 value 0x01 direction slave
//! default allow
//! END BLE_TABLES
//!
//! GATT_FILTER
//! uuid 0x180d
//! END GATT_FILTER
//! ```
//!
//! Parsing produces plain data: a [`RuleSet`] evaluated in declaration order
//! per packet kind, and a [`UuidFilter`] naming the attribute types hidden
//! from the master.

pub mod parser;
pub mod rule;
pub mod set;

#[cfg(test)]
mod tests;

pub use parser::RuleFile;
pub use rule::{Rule, RuleFields, RuleValue};
pub use set::{RuleSet, UuidFilter};

use crate::error::RuleError;
use std::fmt;
use std::str::FromStr;

/// Verdict of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    Deny,
}

impl FromStr for Action {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Action::Allow),
            "deny" => Ok(Action::Deny),
            other => Err(RuleError::InvalidVerdict(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => f.write_str("allow"),
            Action::Deny => f.write_str("deny"),
        }
    }
}

/// Role a PDU is travelling to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `direction master`: sent by the slave
    ToMaster,
    /// `direction slave`: sent by the master
    ToSlave,
}

impl FromStr for Direction {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(Direction::ToMaster),
            "slave" => Ok(Direction::ToSlave),
            other => Err(RuleError::InvalidValue {
                key: "direction",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToMaster => f.write_str("master"),
            Direction::ToSlave => f.write_str("slave"),
        }
    }
}

/// Parse an integer literal, hexadecimal with a `0x` prefix or decimal otherwise
pub fn parse_integer(text: &str) -> Option<u128> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => u128::from_str_radix(digits, 16).ok(),
        None => text.parse().ok(),
    }
}
