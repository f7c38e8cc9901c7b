//! Error replies sent to the master when one of its requests is denied

use crate::att::{AttErrorCode, AttPdu};
use std::fmt;

/// What to answer the master instead of forwarding a denied request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReply {
    /// Opcode of the denied request
    pub request_opcode: u8,
    /// Handle echoed back, in the master's (virtual) handle space
    pub handle: u16,
    /// Reason given to the master
    pub error_code: AttErrorCode,
}

impl ErrorReply {
    /// Reply for a denied request, `None` for kinds that are dropped silently.
    ///
    /// Range requests echo their start handle, single-attribute requests
    /// their handle.
    pub fn for_request(pdu: &AttPdu) -> Option<Self> {
        let (handle, error_code) = match pdu {
            AttPdu::ReadByTypeRequest { start_handle, .. } => {
                (*start_handle, AttErrorCode::ReadNotPermitted)
            }
            AttPdu::FindInformationRequest { start_handle, .. }
            | AttPdu::FindByTypeValueRequest { start_handle, .. }
            | AttPdu::ReadByGroupTypeRequest { start_handle, .. } => {
                (*start_handle, AttErrorCode::AttributeNotFound)
            }
            AttPdu::ReadRequest { handle } | AttPdu::ReadBlobRequest { handle, .. } => {
                (*handle, AttErrorCode::ReadNotPermitted)
            }
            AttPdu::WriteRequest { handle, .. } | AttPdu::PrepareWriteRequest { handle, .. } => {
                (*handle, AttErrorCode::WriteNotPermitted)
            }
            _ => return None,
        };

        Some(Self {
            request_opcode: pdu.opcode(),
            handle,
            error_code,
        })
    }

    /// The Error Response PDU carrying this reply
    pub fn to_pdu(&self) -> AttPdu {
        AttPdu::ErrorResponse {
            request_opcode: self.request_opcode,
            handle: self.handle,
            error_code: self.error_code,
        }
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error 0x{:02X} ({}) for opcode 0x{:02X} on handle 0x{:04X}",
            u8::from(self.error_code),
            self.error_code,
            self.request_opcode,
            self.handle
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::constants::*;

    #[test]
    fn test_reply_table() {
        let cases = [
            (
                AttPdu::ReadByTypeRequest {
                    start_handle: 0x0001,
                    end_handle: 0xFFFF,
                    attribute_type: vec![0x03, 0x28],
                },
                ATT_READ_BY_TYPE_REQ,
                0x0001,
                AttErrorCode::ReadNotPermitted,
            ),
            (
                AttPdu::FindInformationRequest {
                    start_handle: 0x0004,
                    end_handle: 0x0010,
                },
                ATT_FIND_INFO_REQ,
                0x0004,
                AttErrorCode::AttributeNotFound,
            ),
            (
                AttPdu::ReadByGroupTypeRequest {
                    start_handle: 0x0001,
                    end_handle: 0xFFFF,
                    group_type: vec![0x00, 0x28],
                },
                ATT_READ_BY_GROUP_TYPE_REQ,
                0x0001,
                AttErrorCode::AttributeNotFound,
            ),
            (
                AttPdu::ReadRequest { handle: 0x0021 },
                ATT_READ_REQ,
                0x0021,
                AttErrorCode::ReadNotPermitted,
            ),
            (
                AttPdu::ReadBlobRequest {
                    handle: 0x0021,
                    offset: 22,
                },
                ATT_READ_BLOB_REQ,
                0x0021,
                AttErrorCode::ReadNotPermitted,
            ),
            (
                AttPdu::WriteRequest {
                    handle: 0x0025,
                    value: vec![0x01],
                },
                ATT_WRITE_REQ,
                0x0025,
                AttErrorCode::WriteNotPermitted,
            ),
        ];

        for (pdu, opcode, handle, error_code) in cases {
            let reply = ErrorReply::for_request(&pdu).unwrap();
            assert_eq!(reply.request_opcode, opcode);
            assert_eq!(reply.handle, handle);
            assert_eq!(reply.error_code, error_code);
        }
    }

    #[test]
    fn test_commands_get_no_reply() {
        let command = AttPdu::WriteCommand {
            handle: 0x0025,
            value: vec![0x01],
        };
        assert_eq!(ErrorReply::for_request(&command), None);
        assert_eq!(
            ErrorReply::for_request(&AttPdu::ExchangeMtuRequest { mtu: 247 }),
            None
        );
    }

    #[test]
    fn test_reply_pdu_encoding() {
        let reply = ErrorReply::for_request(&AttPdu::ReadRequest { handle: 0x0021 }).unwrap();
        assert_eq!(
            reply.to_pdu().encode(),
            vec![ATT_ERROR_RSP, ATT_READ_REQ, 0x21, 0x00, ATT_ERROR_READ_NOT_PERMITTED]
        );
    }
}
