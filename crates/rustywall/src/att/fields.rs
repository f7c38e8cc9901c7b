//! Handle-bearing fields of decoded PDUs
//!
//! Every PDU variant declares which of its fields are attribute handles.
//! Plain PDUs expose them through [`HasHandleFields`]; the responses that
//! enumerate several attributes implement [`HasAttributeList`] instead, so
//! that individual records can be rewritten or removed.

use super::constants::*;
use super::pdu::{
    AttPdu, FindByTypeValueResponse, FindInformationResponse, MultipleHandleValueNotification,
    ReadByGroupTypeResponse, ReadByTypeResponse,
};
use log::trace;
use std::fmt;

/// Name of a handle-typed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleField {
    /// The single attribute handle addressed by the PDU
    Handle,
    /// Lower bound of a handle range
    StartHandle,
    /// Upper bound of a handle range
    EndHandle,
    /// Position in a handle list (Read Multiple)
    Listed(usize),
}

impl fmt::Display for HandleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleField::Handle => f.write_str("handle"),
            HandleField::StartHandle => f.write_str("start_handle"),
            HandleField::EndHandle => f.write_str("end_handle"),
            HandleField::Listed(index) => write!(f, "handles[{}]", index),
        }
    }
}

/// PDUs whose handle fields can be read and rewritten in place
pub trait HasHandleFields {
    /// (field, value) for every handle-typed field present
    fn handle_fields(&self) -> Vec<(HandleField, u16)>;

    /// Mutable access to every handle-typed field present
    fn handle_fields_mut(&mut self) -> Vec<(HandleField, &mut u16)>;

    /// Value of the single `handle` field, if the PDU has one
    fn handle(&self) -> Option<u16> {
        self.handle_fields()
            .into_iter()
            .find(|(field, _)| *field == HandleField::Handle)
            .map(|(_, value)| value)
    }
}

impl HasHandleFields for AttPdu {
    fn handle_fields(&self) -> Vec<(HandleField, u16)> {
        match self {
            AttPdu::ErrorResponse { handle, .. }
            | AttPdu::ReadRequest { handle }
            | AttPdu::ReadBlobRequest { handle, .. }
            | AttPdu::WriteRequest { handle, .. }
            | AttPdu::WriteCommand { handle, .. }
            | AttPdu::SignedWriteCommand { handle, .. }
            | AttPdu::PrepareWriteRequest { handle, .. }
            | AttPdu::PrepareWriteResponse { handle, .. }
            | AttPdu::HandleValueNotification { handle, .. }
            | AttPdu::HandleValueIndication { handle, .. } => vec![(HandleField::Handle, *handle)],
            AttPdu::FindInformationRequest {
                start_handle,
                end_handle,
            }
            | AttPdu::FindByTypeValueRequest {
                start_handle,
                end_handle,
                ..
            }
            | AttPdu::ReadByTypeRequest {
                start_handle,
                end_handle,
                ..
            }
            | AttPdu::ReadByGroupTypeRequest {
                start_handle,
                end_handle,
                ..
            } => vec![
                (HandleField::StartHandle, *start_handle),
                (HandleField::EndHandle, *end_handle),
            ],
            AttPdu::ReadMultipleRequest { handles }
            | AttPdu::ReadMultipleVariableRequest { handles } => handles
                .iter()
                .enumerate()
                .map(|(index, handle)| (HandleField::Listed(index), *handle))
                .collect(),
            AttPdu::ExchangeMtuRequest { .. }
            | AttPdu::ExchangeMtuResponse { .. }
            | AttPdu::FindInformationResponse(_)
            | AttPdu::FindByTypeValueResponse(_)
            | AttPdu::ReadByTypeResponse(_)
            | AttPdu::ReadResponse { .. }
            | AttPdu::ReadBlobResponse { .. }
            | AttPdu::ReadMultipleResponse { .. }
            | AttPdu::ReadMultipleVariableResponse { .. }
            | AttPdu::MultipleHandleValueNotification(_)
            | AttPdu::ReadByGroupTypeResponse(_)
            | AttPdu::WriteResponse
            | AttPdu::ExecuteWriteRequest { .. }
            | AttPdu::ExecuteWriteResponse
            | AttPdu::HandleValueConfirmation
            | AttPdu::Unknown { .. } => Vec::new(),
        }
    }

    fn handle_fields_mut(&mut self) -> Vec<(HandleField, &mut u16)> {
        match self {
            AttPdu::ErrorResponse { handle, .. }
            | AttPdu::ReadRequest { handle }
            | AttPdu::ReadBlobRequest { handle, .. }
            | AttPdu::WriteRequest { handle, .. }
            | AttPdu::WriteCommand { handle, .. }
            | AttPdu::SignedWriteCommand { handle, .. }
            | AttPdu::PrepareWriteRequest { handle, .. }
            | AttPdu::PrepareWriteResponse { handle, .. }
            | AttPdu::HandleValueNotification { handle, .. }
            | AttPdu::HandleValueIndication { handle, .. } => vec![(HandleField::Handle, handle)],
            AttPdu::FindInformationRequest {
                start_handle,
                end_handle,
            }
            | AttPdu::FindByTypeValueRequest {
                start_handle,
                end_handle,
                ..
            }
            | AttPdu::ReadByTypeRequest {
                start_handle,
                end_handle,
                ..
            }
            | AttPdu::ReadByGroupTypeRequest {
                start_handle,
                end_handle,
                ..
            } => vec![
                (HandleField::StartHandle, start_handle),
                (HandleField::EndHandle, end_handle),
            ],
            AttPdu::ReadMultipleRequest { handles }
            | AttPdu::ReadMultipleVariableRequest { handles } => handles
                .iter_mut()
                .enumerate()
                .map(|(index, handle)| (HandleField::Listed(index), handle))
                .collect(),
            AttPdu::ExchangeMtuRequest { .. }
            | AttPdu::ExchangeMtuResponse { .. }
            | AttPdu::FindInformationResponse(_)
            | AttPdu::FindByTypeValueResponse(_)
            | AttPdu::ReadByTypeResponse(_)
            | AttPdu::ReadResponse { .. }
            | AttPdu::ReadBlobResponse { .. }
            | AttPdu::ReadMultipleResponse { .. }
            | AttPdu::ReadMultipleVariableResponse { .. }
            | AttPdu::MultipleHandleValueNotification(_)
            | AttPdu::ReadByGroupTypeResponse(_)
            | AttPdu::WriteResponse
            | AttPdu::ExecuteWriteRequest { .. }
            | AttPdu::ExecuteWriteResponse
            | AttPdu::HandleValueConfirmation
            | AttPdu::Unknown { .. } => Vec::new(),
        }
    }
}

/// Real-to-virtual view used when rewriting attribute lists
pub trait HandleMapper {
    /// Virtual handle of a real attribute handle, `None` if the attribute is hidden
    fn map_handle(&self, handle: u16) -> Option<u16>;

    /// Virtual value of a range bound; hidden bounds clamp to the nearest visible handle below
    fn map_range_end(&self, handle: u16) -> u16;

    /// Whether attributes of this type must not be shown
    fn is_hidden_type(&self, type_id: u128) -> bool;
}

/// Responses that enumerate several attributes
pub trait HasAttributeList {
    /// Number of attribute records
    fn attribute_count(&self) -> usize;

    /// Rewrite every record through `mapper`, removing hidden records.
    /// Returns the number of records left.
    fn remap_attributes(&mut self, mapper: &dyn HandleMapper) -> usize;
}

/// Little-endian integer value of a UUID field
pub fn uuid_value(bytes: &[u8]) -> Option<u128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }
    let mut le = [0u8; 16];
    le[..bytes.len()].copy_from_slice(bytes);
    Some(u128::from_le_bytes(le))
}

fn type_hidden(mapper: &dyn HandleMapper, uuid: &[u8]) -> bool {
    uuid_value(uuid).is_some_and(|value| mapper.is_hidden_type(value))
}

impl HasAttributeList for ReadByGroupTypeResponse {
    fn attribute_count(&self) -> usize {
        self.data.len()
    }

    fn remap_attributes(&mut self, mapper: &dyn HandleMapper) -> usize {
        self.data.retain_mut(|attr| {
            if type_hidden(mapper, &attr.value) {
                trace!(
                    "Group 0x{:04X} removed (type {})",
                    attr.handle,
                    hex::encode(&attr.value)
                );
                return false;
            }
            let Some(handle) = mapper.map_handle(attr.handle) else {
                trace!("Group 0x{:04X} removed (handle hidden)", attr.handle);
                return false;
            };
            attr.handle = handle;
            attr.end_group_handle = mapper.map_range_end(attr.end_group_handle);
            true
        });
        self.data.len()
    }
}

/// A record is read as a characteristic declaration when its value has the
/// declaration length and a non-zero properties byte. Read By Type responses
/// do not carry the requested type, so a plain 5- or 19-byte value with a
/// non-zero first byte is still taken for a declaration.
impl HasAttributeList for ReadByTypeResponse {
    fn attribute_count(&self) -> usize {
        self.data.len()
    }

    fn remap_attributes(&mut self, mapper: &dyn HandleMapper) -> usize {
        self.data.retain_mut(|attr| {
            let Some(handle) = mapper.map_handle(attr.handle) else {
                trace!("Attribute 0x{:04X} removed (handle hidden)", attr.handle);
                return false;
            };

            // Characteristic declarations embed the value handle and the characteristic UUID
            let len = attr.value.len();
            let declaration = (len == CHAR_DECL_LEN_UUID16 || len == CHAR_DECL_LEN_UUID128)
                && attr.value[0] != 0;
            if declaration {
                if type_hidden(mapper, &attr.value[3..]) {
                    trace!("Characteristic 0x{:04X} removed (type hidden)", attr.handle);
                    return false;
                }
                let value_handle = u16::from_le_bytes([attr.value[1], attr.value[2]]);
                let Some(mapped) = mapper.map_handle(value_handle) else {
                    trace!("Characteristic 0x{:04X} removed (value handle hidden)", attr.handle);
                    return false;
                };
                attr.value[1..3].copy_from_slice(&mapped.to_le_bytes());
            }

            attr.handle = handle;
            true
        });
        self.data.len()
    }
}

impl HasAttributeList for FindInformationResponse {
    fn attribute_count(&self) -> usize {
        self.data.len()
    }

    fn remap_attributes(&mut self, mapper: &dyn HandleMapper) -> usize {
        self.data.retain_mut(|info| {
            if type_hidden(mapper, &info.uuid) {
                return false;
            }
            match mapper.map_handle(info.handle) {
                Some(handle) => {
                    info.handle = handle;
                    true
                }
                None => false,
            }
        });
        self.data.len()
    }
}

impl HasAttributeList for FindByTypeValueResponse {
    fn attribute_count(&self) -> usize {
        self.handles.len()
    }

    fn remap_attributes(&mut self, mapper: &dyn HandleMapper) -> usize {
        self.handles.retain_mut(|range| match mapper.map_handle(range.found_handle) {
            Some(handle) => {
                range.found_handle = handle;
                range.group_end_handle = mapper.map_range_end(range.group_end_handle);
                true
            }
            None => false,
        });
        self.handles.len()
    }
}

impl HasAttributeList for MultipleHandleValueNotification {
    fn attribute_count(&self) -> usize {
        self.data.len()
    }

    fn remap_attributes(&mut self, mapper: &dyn HandleMapper) -> usize {
        self.data.retain_mut(|item| match mapper.map_handle(item.handle) {
            Some(handle) => {
                item.handle = handle;
                true
            }
            None => {
                trace!("Notified value 0x{:04X} removed (handle hidden)", item.handle);
                false
            }
        });
        self.data.len()
    }
}

impl AttPdu {
    /// The attribute list of the multi-attribute response shapes
    pub fn attribute_list_mut(&mut self) -> Option<&mut dyn HasAttributeList> {
        match self {
            AttPdu::ReadByGroupTypeResponse(rsp) => Some(rsp),
            AttPdu::ReadByTypeResponse(rsp) => Some(rsp),
            AttPdu::FindInformationResponse(rsp) => Some(rsp),
            AttPdu::FindByTypeValueResponse(rsp) => Some(rsp),
            AttPdu::MultipleHandleValueNotification(ntf) => Some(ntf),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::pdu::{GroupAttributeData, HandleValue};

    /// Hides 0x0003 and type 0xABCD, shifts everything above 0x0003 down by one
    struct HideThree;

    impl HandleMapper for HideThree {
        fn map_handle(&self, handle: u16) -> Option<u16> {
            match handle {
                3 => None,
                ATT_HANDLE_MAX => Some(ATT_HANDLE_MAX),
                h if h > 3 => Some(h - 1),
                h => Some(h),
            }
        }

        fn map_range_end(&self, handle: u16) -> u16 {
            match handle {
                ATT_HANDLE_MAX => ATT_HANDLE_MAX,
                h if h >= 3 => h - 1,
                h => h,
            }
        }

        fn is_hidden_type(&self, type_id: u128) -> bool {
            type_id == 0xABCD
        }
    }

    #[test]
    fn test_handle_fields_of_range_request() {
        let mut pdu = AttPdu::ReadByTypeRequest {
            start_handle: 0x0001,
            end_handle: 0xFFFF,
            attribute_type: vec![0x03, 0x28],
        };
        assert_eq!(
            pdu.handle_fields(),
            vec![(HandleField::StartHandle, 0x0001), (HandleField::EndHandle, 0xFFFF)]
        );
        assert_eq!(pdu.handle(), None);

        for (field, value) in pdu.handle_fields_mut() {
            if field == HandleField::StartHandle {
                *value = 0x0005;
            }
        }
        assert_eq!(pdu.handle_fields()[0], (HandleField::StartHandle, 0x0005));
    }

    #[test]
    fn test_handle_fields_of_read_multiple() {
        let pdu = AttPdu::ReadMultipleRequest {
            handles: vec![0x0003, 0x0007],
        };
        assert_eq!(
            pdu.handle_fields(),
            vec![(HandleField::Listed(0), 0x0003), (HandleField::Listed(1), 0x0007)]
        );
        assert_eq!(HandleField::Listed(1).to_string(), "handles[1]");
    }

    #[test]
    fn test_group_response_remap() {
        let mut rsp = ReadByGroupTypeResponse {
            data: vec![
                GroupAttributeData {
                    handle: 0x0001,
                    end_group_handle: 0x0003,
                    value: vec![0x00, 0x18],
                },
                GroupAttributeData {
                    handle: 0x0003,
                    end_group_handle: 0x0004,
                    value: vec![0x01, 0x18],
                },
                GroupAttributeData {
                    handle: 0x0005,
                    end_group_handle: 0xFFFF,
                    value: vec![0xCD, 0xAB],
                },
                GroupAttributeData {
                    handle: 0x0006,
                    end_group_handle: 0xFFFF,
                    value: vec![0x0D, 0x18],
                },
            ],
        };

        assert_eq!(rsp.remap_attributes(&HideThree), 2);
        assert_eq!(rsp.data[0].handle, 0x0001);
        assert_eq!(rsp.data[0].end_group_handle, 0x0002);
        assert_eq!(rsp.data[1].handle, 0x0005);
        assert_eq!(rsp.data[1].end_group_handle, 0xFFFF);
    }

    #[test]
    fn test_characteristic_declaration_remap() {
        let mut rsp = ReadByTypeResponse {
            data: vec![
                HandleValue {
                    handle: 0x0002,
                    value: vec![0x02, 0x03, 0x00, 0x00, 0x2A],
                },
                HandleValue {
                    handle: 0x0004,
                    value: vec![0x0A, 0x05, 0x00, 0x01, 0x2A],
                },
            ],
        };

        assert_eq!(rsp.remap_attributes(&HideThree), 1);
        assert_eq!(rsp.data[0].handle, 0x0003);
        assert_eq!(rsp.data[0].value, vec![0x0A, 0x04, 0x00, 0x01, 0x2A]);
    }

    #[test]
    fn test_plain_value_with_declaration_length() {
        // 5-byte value whose bytes 1..3 happen to name the hidden handle
        let mut rsp = ReadByTypeResponse {
            data: vec![HandleValue {
                handle: 0x0004,
                value: vec![0x00, 0x03, 0x00, 0x11, 0x22],
            }],
        };

        assert_eq!(rsp.remap_attributes(&HideThree), 1);
        assert_eq!(rsp.data[0].handle, 0x0003);
        assert_eq!(rsp.data[0].value, vec![0x00, 0x03, 0x00, 0x11, 0x22]);
    }

    #[test]
    fn test_handle_fields_of_signed_write() {
        let pdu = AttPdu::SignedWriteCommand {
            handle: 0x0010,
            value: vec![0x01],
            signature: [0; ATT_SIGNATURE_LEN],
        };
        assert_eq!(pdu.handle(), Some(0x0010));
    }

    #[test]
    fn test_uuid_value() {
        assert_eq!(uuid_value(&[0x0D, 0x18]), Some(0x180D));
        assert_eq!(uuid_value(&[]), None);
        assert_eq!(uuid_value(&[0u8; 17]), None);
    }
}
