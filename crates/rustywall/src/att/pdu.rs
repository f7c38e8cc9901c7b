//! Decoded ATT protocol data units
//!
//! `AttPdu` is the unit the firewall inspects and rewrites. Decoding is
//! deliberately lenient about trailing bytes (a partial trailing record in a
//! list response is ignored), but every fixed field must be present.

use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Attribute data in Read By Group Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAttributeData {
    /// Attribute handle
    pub handle: u16,
    /// Group end handle
    pub end_group_handle: u16,
    /// Attribute value (the group UUID for service discovery)
    pub value: Vec<u8>,
}

/// Read By Group Type Response packet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadByGroupTypeResponse {
    /// List of attribute data
    pub data: Vec<GroupAttributeData>,
}

/// Handle and value in Read By Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValue {
    /// Attribute handle
    pub handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

/// Read By Type Response packet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadByTypeResponse {
    /// List of handle-value pairs
    pub data: Vec<HandleValue>,
}

/// Handle-UUID pair in Find Information Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationData {
    /// Attribute handle
    pub handle: u16,
    /// Attribute type, little-endian, 2 or 16 bytes
    pub uuid: Vec<u8>,
}

/// Find Information Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindInformationResponse {
    /// Format of information data
    pub format: u8,
    /// List of handle-UUID pairs
    pub data: Vec<InformationData>,
}

/// Handle range in Find By Type Value Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlesInformation {
    /// Found handle
    pub found_handle: u16,
    /// Group end handle
    pub group_end_handle: u16,
}

/// Find By Type Value Response packet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FindByTypeValueResponse {
    /// List of handle ranges
    pub handles: Vec<HandlesInformation>,
}

/// Multiple Handle Value Notification packet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultipleHandleValueNotification {
    /// Notified values, each with its own length on the wire
    pub data: Vec<HandleValue>,
}

/// One decoded ATT PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttPdu {
    ErrorResponse {
        request_opcode: u8,
        handle: u16,
        error_code: AttErrorCode,
    },
    ExchangeMtuRequest {
        mtu: u16,
    },
    ExchangeMtuResponse {
        mtu: u16,
    },
    FindInformationRequest {
        start_handle: u16,
        end_handle: u16,
    },
    FindInformationResponse(FindInformationResponse),
    FindByTypeValueRequest {
        start_handle: u16,
        end_handle: u16,
        attribute_type: u16,
        value: Vec<u8>,
    },
    FindByTypeValueResponse(FindByTypeValueResponse),
    ReadByTypeRequest {
        start_handle: u16,
        end_handle: u16,
        attribute_type: Vec<u8>,
    },
    ReadByTypeResponse(ReadByTypeResponse),
    ReadRequest {
        handle: u16,
    },
    ReadResponse {
        value: Vec<u8>,
    },
    ReadBlobRequest {
        handle: u16,
        offset: u16,
    },
    ReadBlobResponse {
        value: Vec<u8>,
    },
    ReadMultipleRequest {
        handles: Vec<u16>,
    },
    ReadMultipleResponse {
        values: Vec<u8>,
    },
    ReadByGroupTypeRequest {
        start_handle: u16,
        end_handle: u16,
        group_type: Vec<u8>,
    },
    ReadByGroupTypeResponse(ReadByGroupTypeResponse),
    WriteRequest {
        handle: u16,
        value: Vec<u8>,
    },
    WriteResponse,
    WriteCommand {
        handle: u16,
        value: Vec<u8>,
    },
    PrepareWriteRequest {
        handle: u16,
        offset: u16,
        value: Vec<u8>,
    },
    PrepareWriteResponse {
        handle: u16,
        offset: u16,
        value: Vec<u8>,
    },
    ExecuteWriteRequest {
        flags: u8,
    },
    ExecuteWriteResponse,
    HandleValueNotification {
        handle: u16,
        value: Vec<u8>,
    },
    HandleValueIndication {
        handle: u16,
        value: Vec<u8>,
    },
    HandleValueConfirmation,
    ReadMultipleVariableRequest {
        handles: Vec<u16>,
    },
    ReadMultipleVariableResponse {
        values: Vec<u8>,
    },
    MultipleHandleValueNotification(MultipleHandleValueNotification),
    /// The signature covers the handle, so a rewritten command no longer
    /// verifies at the slave.
    SignedWriteCommand {
        handle: u16,
        value: Vec<u8>,
        signature: [u8; ATT_SIGNATURE_LEN],
    },
    /// Any opcode the relay does not interpret; forwarded untouched
    Unknown {
        opcode: u8,
        parameters: Vec<u8>,
    },
}

/// The closed set of PDU kinds a rule may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketKind {
    ErrorResponse,
    ExchangeMtuRequest,
    ExchangeMtuResponse,
    FindInformationRequest,
    FindInformationResponse,
    FindByTypeValueRequest,
    FindByTypeValueResponse,
    ReadByTypeRequest,
    ReadByTypeResponse,
    ReadRequest,
    ReadResponse,
    ReadBlobRequest,
    ReadBlobResponse,
    ReadMultipleRequest,
    ReadMultipleResponse,
    ReadByGroupTypeRequest,
    ReadByGroupTypeResponse,
    WriteRequest,
    WriteResponse,
    WriteCommand,
    PrepareWriteRequest,
    PrepareWriteResponse,
    ExecuteWriteRequest,
    ExecuteWriteResponse,
    HandleValueNotification,
    HandleValueIndication,
    HandleValueConfirmation,
    ReadMultipleVariableRequest,
    ReadMultipleVariableResponse,
    MultipleHandleValueNotification,
    SignedWriteCommand,
}

impl PacketKind {
    pub const ALL: [PacketKind; 31] = [
        PacketKind::ErrorResponse,
        PacketKind::ExchangeMtuRequest,
        PacketKind::ExchangeMtuResponse,
        PacketKind::FindInformationRequest,
        PacketKind::FindInformationResponse,
        PacketKind::FindByTypeValueRequest,
        PacketKind::FindByTypeValueResponse,
        PacketKind::ReadByTypeRequest,
        PacketKind::ReadByTypeResponse,
        PacketKind::ReadRequest,
        PacketKind::ReadResponse,
        PacketKind::ReadBlobRequest,
        PacketKind::ReadBlobResponse,
        PacketKind::ReadMultipleRequest,
        PacketKind::ReadMultipleResponse,
        PacketKind::ReadByGroupTypeRequest,
        PacketKind::ReadByGroupTypeResponse,
        PacketKind::WriteRequest,
        PacketKind::WriteResponse,
        PacketKind::WriteCommand,
        PacketKind::PrepareWriteRequest,
        PacketKind::PrepareWriteResponse,
        PacketKind::ExecuteWriteRequest,
        PacketKind::ExecuteWriteResponse,
        PacketKind::HandleValueNotification,
        PacketKind::HandleValueIndication,
        PacketKind::HandleValueConfirmation,
        PacketKind::ReadMultipleVariableRequest,
        PacketKind::ReadMultipleVariableResponse,
        PacketKind::MultipleHandleValueNotification,
        PacketKind::SignedWriteCommand,
    ];

    /// Name used for this kind in rule files
    pub fn name(&self) -> &'static str {
        match self {
            PacketKind::ErrorResponse => "ErrorResponse",
            PacketKind::ExchangeMtuRequest => "ExchangeMTURequest",
            PacketKind::ExchangeMtuResponse => "ExchangeMTUResponse",
            PacketKind::FindInformationRequest => "FindInformationRequest",
            PacketKind::FindInformationResponse => "FindInformationResponse",
            PacketKind::FindByTypeValueRequest => "FindByTypeValueRequest",
            PacketKind::FindByTypeValueResponse => "FindByTypeValueResponse",
            PacketKind::ReadByTypeRequest => "ReadByTypeRequest",
            PacketKind::ReadByTypeResponse => "ReadByTypeResponse",
            PacketKind::ReadRequest => "ReadRequest",
            PacketKind::ReadResponse => "ReadResponse",
            PacketKind::ReadBlobRequest => "ReadBlobRequest",
            PacketKind::ReadBlobResponse => "ReadBlobResponse",
            PacketKind::ReadMultipleRequest => "ReadMultipleRequest",
            PacketKind::ReadMultipleResponse => "ReadMultipleResponse",
            PacketKind::ReadByGroupTypeRequest => "ReadByGroupTypeRequest",
            PacketKind::ReadByGroupTypeResponse => "ReadByGroupTypeResponse",
            PacketKind::WriteRequest => "WriteRequest",
            PacketKind::WriteResponse => "WriteResponse",
            PacketKind::WriteCommand => "WriteCommand",
            PacketKind::PrepareWriteRequest => "PrepareWriteRequest",
            PacketKind::PrepareWriteResponse => "PrepareWriteResponse",
            PacketKind::ExecuteWriteRequest => "ExecuteWriteRequest",
            PacketKind::ExecuteWriteResponse => "ExecuteWriteResponse",
            PacketKind::HandleValueNotification => "HandleValueNotification",
            PacketKind::HandleValueIndication => "HandleValueIndication",
            PacketKind::HandleValueConfirmation => "HandleValueConfirmation",
            PacketKind::ReadMultipleVariableRequest => "ReadMultipleVariableRequest",
            PacketKind::ReadMultipleVariableResponse => "ReadMultipleVariableResponse",
            PacketKind::MultipleHandleValueNotification => "MultipleHandleValueNotification",
            PacketKind::SignedWriteCommand => "SignedWriteCommand",
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PacketKind {
    type Err = ();

    /// Accepts `ReadRequest` as well as the prefixed `BLEReadRequest`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = match s.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("BLE") => &s[3..],
            _ => s,
        };
        PacketKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(bare))
            .ok_or(())
    }
}

fn read_u8(cursor: &mut Cursor<&[u8]>, opcode: u8) -> AttResult<u8> {
    cursor.read_u8().map_err(|_| AttError::Truncated(opcode))
}

fn read_u16(cursor: &mut Cursor<&[u8]>, opcode: u8) -> AttResult<u16> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| AttError::Truncated(opcode))
}

fn rest(cursor: &Cursor<&[u8]>) -> Vec<u8> {
    let data = *cursor.get_ref();
    let pos = (cursor.position() as usize).min(data.len());
    data[pos..].to_vec()
}

impl FindInformationResponse {
    fn parse(data: &[u8]) -> AttResult<Self> {
        let (&format, pairs) = data
            .split_first()
            .ok_or(AttError::Truncated(ATT_FIND_INFO_RSP))?;
        let uuid_len = match format {
            ATT_FIND_INFO_RSP_FORMAT_16BIT => 2,
            ATT_FIND_INFO_RSP_FORMAT_128BIT => 16,
            _ => {
                return Err(AttError::Malformed {
                    opcode: ATT_FIND_INFO_RSP,
                    reason: "unknown information data format",
                })
            }
        };

        let data = pairs
            .chunks_exact(2 + uuid_len)
            .map(|pair| InformationData {
                handle: u16::from_le_bytes([pair[0], pair[1]]),
                uuid: pair[2..].to_vec(),
            })
            .collect();

        Ok(Self { format, data })
    }

    fn serialize_into(&self, packet: &mut Vec<u8>) {
        packet.push(self.format);
        for pair in &self.data {
            packet.extend_from_slice(&pair.handle.to_le_bytes());
            packet.extend_from_slice(&pair.uuid);
        }
    }
}

impl FindByTypeValueResponse {
    fn parse(data: &[u8]) -> AttResult<Self> {
        let handles = data
            .chunks_exact(4)
            .map(|chunk| HandlesInformation {
                found_handle: u16::from_le_bytes([chunk[0], chunk[1]]),
                group_end_handle: u16::from_le_bytes([chunk[2], chunk[3]]),
            })
            .collect();
        Ok(Self { handles })
    }

    fn serialize_into(&self, packet: &mut Vec<u8>) {
        for range in &self.handles {
            packet.extend_from_slice(&range.found_handle.to_le_bytes());
            packet.extend_from_slice(&range.group_end_handle.to_le_bytes());
        }
    }
}

impl ReadByTypeResponse {
    fn parse(data: &[u8]) -> AttResult<Self> {
        let (&length, records) = data
            .split_first()
            .ok_or(AttError::Truncated(ATT_READ_BY_TYPE_RSP))?;
        if length < 2 {
            return Err(AttError::Malformed {
                opcode: ATT_READ_BY_TYPE_RSP,
                reason: "record length below 2",
            });
        }

        let data = records
            .chunks_exact(length as usize)
            .map(|record| HandleValue {
                handle: u16::from_le_bytes([record[0], record[1]]),
                value: record[2..].to_vec(),
            })
            .collect();

        Ok(Self { data })
    }

    fn serialize_into(&self, packet: &mut Vec<u8>) {
        let length = self.data.first().map_or(2, |first| 2 + first.value.len());
        packet.push(length as u8);
        for item in &self.data {
            packet.extend_from_slice(&item.handle.to_le_bytes());
            packet.extend_from_slice(&item.value);
        }
    }
}

impl ReadByGroupTypeResponse {
    fn parse(data: &[u8]) -> AttResult<Self> {
        let (&length, records) = data
            .split_first()
            .ok_or(AttError::Truncated(ATT_READ_BY_GROUP_TYPE_RSP))?;
        if length < 4 {
            return Err(AttError::Malformed {
                opcode: ATT_READ_BY_GROUP_TYPE_RSP,
                reason: "record length below 4",
            });
        }

        let data = records
            .chunks_exact(length as usize)
            .map(|record| GroupAttributeData {
                handle: u16::from_le_bytes([record[0], record[1]]),
                end_group_handle: u16::from_le_bytes([record[2], record[3]]),
                value: record[4..].to_vec(),
            })
            .collect();

        Ok(Self { data })
    }

    fn serialize_into(&self, packet: &mut Vec<u8>) {
        let length = self.data.first().map_or(4, |first| 4 + first.value.len());
        packet.push(length as u8);
        for item in &self.data {
            packet.extend_from_slice(&item.handle.to_le_bytes());
            packet.extend_from_slice(&item.end_group_handle.to_le_bytes());
            packet.extend_from_slice(&item.value);
        }
    }
}

impl MultipleHandleValueNotification {
    fn parse(data: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(data);
        let mut values = Vec::new();

        while let (Ok(handle), Ok(length)) = (
            cursor.read_u16::<LittleEndian>(),
            cursor.read_u16::<LittleEndian>(),
        ) {
            let start = cursor.position() as usize;
            let Some(value) = data.get(start..start + length as usize) else {
                break;
            };
            values.push(HandleValue {
                handle,
                value: value.to_vec(),
            });
            cursor.set_position((start + value.len()) as u64);
        }

        if values.is_empty() {
            return Err(AttError::Truncated(ATT_MULTIPLE_HANDLE_VALUE_NTF));
        }
        Ok(Self { data: values })
    }

    fn serialize_into(&self, packet: &mut Vec<u8>) {
        for item in &self.data {
            packet.extend_from_slice(&item.handle.to_le_bytes());
            packet.extend_from_slice(&(item.value.len() as u16).to_le_bytes());
            packet.extend_from_slice(&item.value);
        }
    }
}

fn read_handle_list(params: &[u8], opcode: u8) -> AttResult<Vec<u16>> {
    if params.len() < 4 {
        return Err(AttError::Truncated(opcode));
    }
    Ok(params
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

impl AttPdu {
    /// Decode a PDU from its opcode-prefixed wire form
    pub fn decode(data: &[u8]) -> AttResult<Self> {
        let (&opcode, params) = data.split_first().ok_or(AttError::Empty)?;
        let mut cursor = Cursor::new(params);
        let cursor = &mut cursor;

        let pdu = match opcode {
            ATT_ERROR_RSP => AttPdu::ErrorResponse {
                request_opcode: read_u8(cursor, opcode)?,
                handle: read_u16(cursor, opcode)?,
                error_code: read_u8(cursor, opcode)?.into(),
            },
            ATT_EXCHANGE_MTU_REQ => AttPdu::ExchangeMtuRequest {
                mtu: read_u16(cursor, opcode)?,
            },
            ATT_EXCHANGE_MTU_RSP => AttPdu::ExchangeMtuResponse {
                mtu: read_u16(cursor, opcode)?,
            },
            ATT_FIND_INFO_REQ => AttPdu::FindInformationRequest {
                start_handle: read_u16(cursor, opcode)?,
                end_handle: read_u16(cursor, opcode)?,
            },
            ATT_FIND_INFO_RSP => {
                AttPdu::FindInformationResponse(FindInformationResponse::parse(params)?)
            }
            ATT_FIND_BY_TYPE_VALUE_REQ => AttPdu::FindByTypeValueRequest {
                start_handle: read_u16(cursor, opcode)?,
                end_handle: read_u16(cursor, opcode)?,
                attribute_type: read_u16(cursor, opcode)?,
                value: rest(cursor),
            },
            ATT_FIND_BY_TYPE_VALUE_RSP => {
                AttPdu::FindByTypeValueResponse(FindByTypeValueResponse::parse(params)?)
            }
            ATT_READ_BY_TYPE_REQ => {
                let start_handle = read_u16(cursor, opcode)?;
                let end_handle = read_u16(cursor, opcode)?;
                let attribute_type = rest(cursor);
                if attribute_type.len() != 2 && attribute_type.len() != 16 {
                    return Err(AttError::Malformed {
                        opcode,
                        reason: "attribute type must be 2 or 16 bytes",
                    });
                }
                AttPdu::ReadByTypeRequest {
                    start_handle,
                    end_handle,
                    attribute_type,
                }
            }
            ATT_READ_BY_TYPE_RSP => AttPdu::ReadByTypeResponse(ReadByTypeResponse::parse(params)?),
            ATT_READ_REQ => AttPdu::ReadRequest {
                handle: read_u16(cursor, opcode)?,
            },
            ATT_READ_RSP => AttPdu::ReadResponse {
                value: params.to_vec(),
            },
            ATT_READ_BLOB_REQ => AttPdu::ReadBlobRequest {
                handle: read_u16(cursor, opcode)?,
                offset: read_u16(cursor, opcode)?,
            },
            ATT_READ_BLOB_RSP => AttPdu::ReadBlobResponse {
                value: params.to_vec(),
            },
            ATT_READ_MULTIPLE_REQ => AttPdu::ReadMultipleRequest {
                handles: read_handle_list(params, opcode)?,
            },
            ATT_READ_MULTIPLE_RSP => AttPdu::ReadMultipleResponse {
                values: params.to_vec(),
            },
            ATT_READ_BY_GROUP_TYPE_REQ => {
                let start_handle = read_u16(cursor, opcode)?;
                let end_handle = read_u16(cursor, opcode)?;
                let group_type = rest(cursor);
                if group_type.len() != 2 && group_type.len() != 16 {
                    return Err(AttError::Malformed {
                        opcode,
                        reason: "group type must be 2 or 16 bytes",
                    });
                }
                AttPdu::ReadByGroupTypeRequest {
                    start_handle,
                    end_handle,
                    group_type,
                }
            }
            ATT_READ_BY_GROUP_TYPE_RSP => {
                AttPdu::ReadByGroupTypeResponse(ReadByGroupTypeResponse::parse(params)?)
            }
            ATT_WRITE_REQ => AttPdu::WriteRequest {
                handle: read_u16(cursor, opcode)?,
                value: rest(cursor),
            },
            ATT_WRITE_RSP => AttPdu::WriteResponse,
            ATT_WRITE_CMD => AttPdu::WriteCommand {
                handle: read_u16(cursor, opcode)?,
                value: rest(cursor),
            },
            ATT_PREPARE_WRITE_REQ => AttPdu::PrepareWriteRequest {
                handle: read_u16(cursor, opcode)?,
                offset: read_u16(cursor, opcode)?,
                value: rest(cursor),
            },
            ATT_PREPARE_WRITE_RSP => AttPdu::PrepareWriteResponse {
                handle: read_u16(cursor, opcode)?,
                offset: read_u16(cursor, opcode)?,
                value: rest(cursor),
            },
            ATT_EXECUTE_WRITE_REQ => AttPdu::ExecuteWriteRequest {
                flags: read_u8(cursor, opcode)?,
            },
            ATT_EXECUTE_WRITE_RSP => AttPdu::ExecuteWriteResponse,
            ATT_HANDLE_VALUE_NTF => AttPdu::HandleValueNotification {
                handle: read_u16(cursor, opcode)?,
                value: rest(cursor),
            },
            ATT_HANDLE_VALUE_IND => AttPdu::HandleValueIndication {
                handle: read_u16(cursor, opcode)?,
                value: rest(cursor),
            },
            ATT_HANDLE_VALUE_CONF => AttPdu::HandleValueConfirmation,
            ATT_READ_MULTIPLE_VARIABLE_REQ => AttPdu::ReadMultipleVariableRequest {
                handles: read_handle_list(params, opcode)?,
            },
            ATT_READ_MULTIPLE_VARIABLE_RSP => AttPdu::ReadMultipleVariableResponse {
                values: params.to_vec(),
            },
            ATT_MULTIPLE_HANDLE_VALUE_NTF => AttPdu::MultipleHandleValueNotification(
                MultipleHandleValueNotification::parse(params)?,
            ),
            ATT_SIGNED_WRITE_CMD => {
                let handle = read_u16(cursor, opcode)?;
                let tail = rest(cursor);
                let Some(split) = tail.len().checked_sub(ATT_SIGNATURE_LEN) else {
                    return Err(AttError::Truncated(opcode));
                };
                let mut signature = [0u8; ATT_SIGNATURE_LEN];
                signature.copy_from_slice(&tail[split..]);
                AttPdu::SignedWriteCommand {
                    handle,
                    value: tail[..split].to_vec(),
                    signature,
                }
            }
            _ => AttPdu::Unknown {
                opcode,
                parameters: params.to_vec(),
            },
        };

        Ok(pdu)
    }

    /// Serialize the PDU to its wire form
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = vec![self.opcode()];

        match self {
            AttPdu::ErrorResponse {
                request_opcode,
                handle,
                error_code,
            } => {
                packet.push(*request_opcode);
                packet.extend_from_slice(&handle.to_le_bytes());
                packet.push((*error_code).into());
            }
            AttPdu::ExchangeMtuRequest { mtu } | AttPdu::ExchangeMtuResponse { mtu } => {
                packet.extend_from_slice(&mtu.to_le_bytes());
            }
            AttPdu::FindInformationRequest {
                start_handle,
                end_handle,
            } => {
                packet.extend_from_slice(&start_handle.to_le_bytes());
                packet.extend_from_slice(&end_handle.to_le_bytes());
            }
            AttPdu::FindInformationResponse(rsp) => rsp.serialize_into(&mut packet),
            AttPdu::FindByTypeValueRequest {
                start_handle,
                end_handle,
                attribute_type,
                value,
            } => {
                packet.extend_from_slice(&start_handle.to_le_bytes());
                packet.extend_from_slice(&end_handle.to_le_bytes());
                packet.extend_from_slice(&attribute_type.to_le_bytes());
                packet.extend_from_slice(value);
            }
            AttPdu::FindByTypeValueResponse(rsp) => rsp.serialize_into(&mut packet),
            AttPdu::ReadByTypeRequest {
                start_handle,
                end_handle,
                attribute_type: uuid,
            }
            | AttPdu::ReadByGroupTypeRequest {
                start_handle,
                end_handle,
                group_type: uuid,
            } => {
                packet.extend_from_slice(&start_handle.to_le_bytes());
                packet.extend_from_slice(&end_handle.to_le_bytes());
                packet.extend_from_slice(uuid);
            }
            AttPdu::ReadByTypeResponse(rsp) => rsp.serialize_into(&mut packet),
            AttPdu::ReadRequest { handle } => {
                packet.extend_from_slice(&handle.to_le_bytes());
            }
            AttPdu::ReadResponse { value } | AttPdu::ReadBlobResponse { value } => {
                packet.extend_from_slice(value);
            }
            AttPdu::ReadBlobRequest { handle, offset } => {
                packet.extend_from_slice(&handle.to_le_bytes());
                packet.extend_from_slice(&offset.to_le_bytes());
            }
            AttPdu::ReadMultipleRequest { handles }
            | AttPdu::ReadMultipleVariableRequest { handles } => {
                for handle in handles {
                    packet.extend_from_slice(&handle.to_le_bytes());
                }
            }
            AttPdu::ReadMultipleResponse { values }
            | AttPdu::ReadMultipleVariableResponse { values } => packet.extend_from_slice(values),
            AttPdu::MultipleHandleValueNotification(ntf) => ntf.serialize_into(&mut packet),
            AttPdu::SignedWriteCommand {
                handle,
                value,
                signature,
            } => {
                packet.extend_from_slice(&handle.to_le_bytes());
                packet.extend_from_slice(value);
                packet.extend_from_slice(signature);
            }
            AttPdu::ReadByGroupTypeResponse(rsp) => rsp.serialize_into(&mut packet),
            AttPdu::WriteRequest { handle, value }
            | AttPdu::WriteCommand { handle, value }
            | AttPdu::HandleValueNotification { handle, value }
            | AttPdu::HandleValueIndication { handle, value } => {
                packet.extend_from_slice(&handle.to_le_bytes());
                packet.extend_from_slice(value);
            }
            AttPdu::PrepareWriteRequest {
                handle,
                offset,
                value,
            }
            | AttPdu::PrepareWriteResponse {
                handle,
                offset,
                value,
            } => {
                packet.extend_from_slice(&handle.to_le_bytes());
                packet.extend_from_slice(&offset.to_le_bytes());
                packet.extend_from_slice(value);
            }
            AttPdu::ExecuteWriteRequest { flags } => packet.push(*flags),
            AttPdu::WriteResponse
            | AttPdu::ExecuteWriteResponse
            | AttPdu::HandleValueConfirmation => {}
            AttPdu::Unknown { parameters, .. } => packet.extend_from_slice(parameters),
        }

        packet
    }

    /// Wire opcode of this PDU
    pub fn opcode(&self) -> u8 {
        match self {
            AttPdu::ErrorResponse { .. } => ATT_ERROR_RSP,
            AttPdu::ExchangeMtuRequest { .. } => ATT_EXCHANGE_MTU_REQ,
            AttPdu::ExchangeMtuResponse { .. } => ATT_EXCHANGE_MTU_RSP,
            AttPdu::FindInformationRequest { .. } => ATT_FIND_INFO_REQ,
            AttPdu::FindInformationResponse(_) => ATT_FIND_INFO_RSP,
            AttPdu::FindByTypeValueRequest { .. } => ATT_FIND_BY_TYPE_VALUE_REQ,
            AttPdu::FindByTypeValueResponse(_) => ATT_FIND_BY_TYPE_VALUE_RSP,
            AttPdu::ReadByTypeRequest { .. } => ATT_READ_BY_TYPE_REQ,
            AttPdu::ReadByTypeResponse(_) => ATT_READ_BY_TYPE_RSP,
            AttPdu::ReadRequest { .. } => ATT_READ_REQ,
            AttPdu::ReadResponse { .. } => ATT_READ_RSP,
            AttPdu::ReadBlobRequest { .. } => ATT_READ_BLOB_REQ,
            AttPdu::ReadBlobResponse { .. } => ATT_READ_BLOB_RSP,
            AttPdu::ReadMultipleRequest { .. } => ATT_READ_MULTIPLE_REQ,
            AttPdu::ReadMultipleResponse { .. } => ATT_READ_MULTIPLE_RSP,
            AttPdu::ReadByGroupTypeRequest { .. } => ATT_READ_BY_GROUP_TYPE_REQ,
            AttPdu::ReadByGroupTypeResponse(_) => ATT_READ_BY_GROUP_TYPE_RSP,
            AttPdu::WriteRequest { .. } => ATT_WRITE_REQ,
            AttPdu::WriteResponse => ATT_WRITE_RSP,
            AttPdu::WriteCommand { .. } => ATT_WRITE_CMD,
            AttPdu::PrepareWriteRequest { .. } => ATT_PREPARE_WRITE_REQ,
            AttPdu::PrepareWriteResponse { .. } => ATT_PREPARE_WRITE_RSP,
            AttPdu::ExecuteWriteRequest { .. } => ATT_EXECUTE_WRITE_REQ,
            AttPdu::ExecuteWriteResponse => ATT_EXECUTE_WRITE_RSP,
            AttPdu::HandleValueNotification { .. } => ATT_HANDLE_VALUE_NTF,
            AttPdu::HandleValueIndication { .. } => ATT_HANDLE_VALUE_IND,
            AttPdu::HandleValueConfirmation => ATT_HANDLE_VALUE_CONF,
            AttPdu::ReadMultipleVariableRequest { .. } => ATT_READ_MULTIPLE_VARIABLE_REQ,
            AttPdu::ReadMultipleVariableResponse { .. } => ATT_READ_MULTIPLE_VARIABLE_RSP,
            AttPdu::MultipleHandleValueNotification(_) => ATT_MULTIPLE_HANDLE_VALUE_NTF,
            AttPdu::SignedWriteCommand { .. } => ATT_SIGNED_WRITE_CMD,
            AttPdu::Unknown { opcode, .. } => *opcode,
        }
    }

    /// Kind of this PDU, `None` for opcodes the relay does not interpret
    pub fn kind(&self) -> Option<PacketKind> {
        let kind = match self {
            AttPdu::ErrorResponse { .. } => PacketKind::ErrorResponse,
            AttPdu::ExchangeMtuRequest { .. } => PacketKind::ExchangeMtuRequest,
            AttPdu::ExchangeMtuResponse { .. } => PacketKind::ExchangeMtuResponse,
            AttPdu::FindInformationRequest { .. } => PacketKind::FindInformationRequest,
            AttPdu::FindInformationResponse(_) => PacketKind::FindInformationResponse,
            AttPdu::FindByTypeValueRequest { .. } => PacketKind::FindByTypeValueRequest,
            AttPdu::FindByTypeValueResponse(_) => PacketKind::FindByTypeValueResponse,
            AttPdu::ReadByTypeRequest { .. } => PacketKind::ReadByTypeRequest,
            AttPdu::ReadByTypeResponse(_) => PacketKind::ReadByTypeResponse,
            AttPdu::ReadRequest { .. } => PacketKind::ReadRequest,
            AttPdu::ReadResponse { .. } => PacketKind::ReadResponse,
            AttPdu::ReadBlobRequest { .. } => PacketKind::ReadBlobRequest,
            AttPdu::ReadBlobResponse { .. } => PacketKind::ReadBlobResponse,
            AttPdu::ReadMultipleRequest { .. } => PacketKind::ReadMultipleRequest,
            AttPdu::ReadMultipleResponse { .. } => PacketKind::ReadMultipleResponse,
            AttPdu::ReadByGroupTypeRequest { .. } => PacketKind::ReadByGroupTypeRequest,
            AttPdu::ReadByGroupTypeResponse(_) => PacketKind::ReadByGroupTypeResponse,
            AttPdu::WriteRequest { .. } => PacketKind::WriteRequest,
            AttPdu::WriteResponse => PacketKind::WriteResponse,
            AttPdu::WriteCommand { .. } => PacketKind::WriteCommand,
            AttPdu::PrepareWriteRequest { .. } => PacketKind::PrepareWriteRequest,
            AttPdu::PrepareWriteResponse { .. } => PacketKind::PrepareWriteResponse,
            AttPdu::ExecuteWriteRequest { .. } => PacketKind::ExecuteWriteRequest,
            AttPdu::ExecuteWriteResponse => PacketKind::ExecuteWriteResponse,
            AttPdu::HandleValueNotification { .. } => PacketKind::HandleValueNotification,
            AttPdu::HandleValueIndication { .. } => PacketKind::HandleValueIndication,
            AttPdu::HandleValueConfirmation => PacketKind::HandleValueConfirmation,
            AttPdu::ReadMultipleVariableRequest { .. } => PacketKind::ReadMultipleVariableRequest,
            AttPdu::ReadMultipleVariableResponse { .. } => {
                PacketKind::ReadMultipleVariableResponse
            }
            AttPdu::MultipleHandleValueNotification(_) => {
                PacketKind::MultipleHandleValueNotification
            }
            AttPdu::SignedWriteCommand { .. } => PacketKind::SignedWriteCommand,
            AttPdu::Unknown { .. } => return None,
        };
        Some(kind)
    }

    /// The attribute value carried alongside a single handle, if any
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            AttPdu::WriteRequest { value, .. }
            | AttPdu::WriteCommand { value, .. }
            | AttPdu::SignedWriteCommand { value, .. }
            | AttPdu::PrepareWriteRequest { value, .. }
            | AttPdu::PrepareWriteResponse { value, .. }
            | AttPdu::HandleValueNotification { value, .. }
            | AttPdu::HandleValueIndication { value, .. }
            | AttPdu::ReadResponse { value }
            | AttPdu::ReadBlobResponse { value } => Some(value),
            _ => None,
        }
    }
}
