//! ATT error codes and PDU decoding errors
use super::constants::*;
use std::fmt;
use thiserror::Error;

/// Error code of an Error Response PDU.
///
/// Only the codes the relay emits or reasons about get a variant; anything
/// else the slave reports is carried through as [`AttErrorCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttErrorCode {
    InvalidHandle,
    ReadNotPermitted,
    WriteNotPermitted,
    RequestNotSupported,
    AttributeNotFound,
    Other(u8),
}

const NAMED_CODES: [(u8, AttErrorCode); 5] = [
    (ATT_ERROR_INVALID_HANDLE, AttErrorCode::InvalidHandle),
    (ATT_ERROR_READ_NOT_PERMITTED, AttErrorCode::ReadNotPermitted),
    (ATT_ERROR_WRITE_NOT_PERMITTED, AttErrorCode::WriteNotPermitted),
    (ATT_ERROR_REQUEST_NOT_SUPPORTED, AttErrorCode::RequestNotSupported),
    (ATT_ERROR_ATTRIBUTE_NOT_FOUND, AttErrorCode::AttributeNotFound),
];

impl From<u8> for AttErrorCode {
    fn from(code: u8) -> Self {
        NAMED_CODES
            .iter()
            .find(|(value, _)| *value == code)
            .map_or(AttErrorCode::Other(code), |(_, named)| *named)
    }
}

impl From<AttErrorCode> for u8 {
    fn from(code: AttErrorCode) -> Self {
        match code {
            AttErrorCode::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            AttErrorCode::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            AttErrorCode::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            AttErrorCode::RequestNotSupported => ATT_ERROR_REQUEST_NOT_SUPPORTED,
            AttErrorCode::AttributeNotFound => ATT_ERROR_ATTRIBUTE_NOT_FOUND,
            AttErrorCode::Other(value) => value,
        }
    }
}

impl fmt::Display for AttErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttErrorCode::InvalidHandle => f.write_str("invalid handle"),
            AttErrorCode::ReadNotPermitted => f.write_str("read not permitted"),
            AttErrorCode::WriteNotPermitted => f.write_str("write not permitted"),
            AttErrorCode::RequestNotSupported => f.write_str("request not supported"),
            AttErrorCode::AttributeNotFound => f.write_str("attribute not found"),
            AttErrorCode::Other(code) => write!(f, "error 0x{:02X}", code),
        }
    }
}

/// Errors raised while decoding an ATT PDU
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttError {
    #[error("Empty PDU")]
    Empty,

    #[error("Truncated PDU for opcode 0x{0:02X}")]
    Truncated(u8),

    #[error("Invalid PDU for opcode 0x{opcode:02X}: {reason}")]
    Malformed { opcode: u8, reason: &'static str },
}

/// ATT Result type
pub type AttResult<T> = Result<T, AttError>;
