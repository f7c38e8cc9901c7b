//! Attribute Protocol (ATT) layer of the relay
//!
//! This module holds the decoded view of ATT PDUs the firewall works on:
//! the PDU codec, the error codes used in replies, and the capability traits
//! that expose handle-bearing fields for translation.

pub mod constants;
pub mod error;
pub mod fields;
pub mod pdu;

// Re-export the public API
pub use self::constants::*;
pub use self::error::{AttError, AttErrorCode, AttResult};
pub use self::fields::{uuid_value, HandleField, HandleMapper, HasAttributeList, HasHandleFields};
pub use self::pdu::{
    AttPdu, FindByTypeValueResponse, FindInformationResponse, GroupAttributeData, HandleValue,
    HandlesInformation, InformationData, MultipleHandleValueNotification, PacketKind,
    ReadByGroupTypeResponse, ReadByTypeResponse,
};
