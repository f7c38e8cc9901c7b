//! Error types for the rustywall library
//!
//! Rule files are validated completely before any traffic flows, so every
//! `RuleError` is fatal to relay construction. Per-PDU outcomes at runtime
//! are verdicts, not errors.

use crate::discovery::DiscoveryError;
use thiserror::Error;

/// Errors found while parsing or validating a rule file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(String),

    #[error("Unknown attribute name: {0}")]
    UnknownAttribute(String),

    #[error("Attribute \"{attribute}\" requires \"{requires}\"")]
    IncompatibleAttribute {
        attribute: &'static str,
        requires: &'static str,
    },

    #[error("Invalid verdict: {0} (expected allow or deny)")]
    InvalidVerdict(String),

    #[error("Invalid value for \"{key}\": {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl RuleError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        RuleError::Syntax(message.into())
    }
}

/// Errors raised while bringing up the firewall engine
#[derive(Error, Debug)]
pub enum FirewallError {
    #[error("Handle translator already installed")]
    TranslatorAlreadyInstalled,

    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Invalid rule file: {0}")]
    Rules(#[from] RuleError),
}

/// Errors raised by the relay driver
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Firewall(#[from] FirewallError),
}
