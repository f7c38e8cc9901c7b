//! A single BLE_TABLES rule: one match predicate plus a verdict

use super::{parse_integer, Action, Direction};
use crate::att::{AttPdu, HasHandleFields, PacketKind};
use crate::error::RuleError;
use crate::gap::BdAddr;
use std::collections::HashSet;
use std::fmt;

/// Attribute value a rule compares against, kept as minimal little-endian bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleValue {
    le_bytes: Vec<u8>,
}

impl RuleValue {
    pub fn from_u128(value: u128) -> Self {
        Self::from_le_bytes(value.to_le_bytes().to_vec())
    }

    fn from_le_bytes(mut le_bytes: Vec<u8>) -> Self {
        while le_bytes.last() == Some(&0) {
            le_bytes.pop();
        }
        Self { le_bytes }
    }

    /// Parse a hex (`0x..`, any length) or decimal literal
    pub fn parse(text: &str) -> Option<Self> {
        let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"));
        match digits {
            Some(digits) => {
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return None;
                }
                let padded = if digits.len() % 2 == 1 {
                    format!("0{}", digits)
                } else {
                    digits.to_string()
                };
                let mut bytes = hex::decode(padded).ok()?;
                bytes.reverse();
                Some(Self::from_le_bytes(bytes))
            }
            None => text.parse::<u128>().ok().map(Self::from_u128),
        }
    }

    /// Whether `field`, read as a little-endian integer, equals this value.
    /// A value wider than the field never matches.
    pub fn matches(&self, field: &[u8]) -> bool {
        let n = self.le_bytes.len();
        if n > field.len() {
            return false;
        }
        field[..n] == self.le_bytes[..] && field[n..].iter().all(|b| *b == 0)
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut be = self.le_bytes.clone();
        be.reverse();
        if be.is_empty() {
            f.write_str("0x0")
        } else {
            write!(f, "0x{}", hex::encode(be))
        }
    }
}

/// Optional match criteria of a rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFields {
    pub handle: Option<u16>,
    pub value: Option<RuleValue>,
    pub direction: Option<Direction>,
    pub src: Option<BdAddr>,
    pub dst: Option<BdAddr>,
}

impl RuleFields {
    fn validate(&self) -> Result<(), RuleError> {
        if self.value.is_some() && self.handle.is_none() {
            return Err(RuleError::IncompatibleAttribute {
                attribute: "value",
                requires: "handle",
            });
        }
        Ok(())
    }
}

/// Firewall rule in the BLE_TABLES context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    action: Action,
    kind: PacketKind,
    fields: RuleFields,
}

impl Rule {
    /// Create a rule, rejecting a `value` without a `handle`
    pub fn new(action: Action, kind: PacketKind, fields: RuleFields) -> Result<Self, RuleError> {
        fields.validate()?;
        Ok(Self {
            action,
            kind,
            fields,
        })
    }

    /// Build a rule from the `key value` pairs of a rule line
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self, RuleError> {
        let mut action = None;
        let mut kind = None;
        let mut fields = RuleFields::default();
        let mut seen = HashSet::new();

        for &(key, value) in pairs {
            if !seen.insert(key) {
                return Err(RuleError::syntax(format!("Duplicate attribute \"{}\"", key)));
            }
            match key {
                "action" => action = Some(value.parse::<Action>()?),
                "type" => {
                    kind = Some(
                        value
                            .parse::<PacketKind>()
                            .map_err(|_| RuleError::UnknownPacketType(value.to_string()))?,
                    )
                }
                "handle" => {
                    let handle = parse_integer(value)
                        .and_then(|h| u16::try_from(h).ok())
                        .ok_or_else(|| invalid("handle", value))?;
                    fields.handle = Some(handle);
                }
                "value" => {
                    let parsed = RuleValue::parse(value).ok_or_else(|| invalid("value", value))?;
                    fields.value = Some(parsed);
                }
                "direction" => fields.direction = Some(value.parse()?),
                "src" => fields.src = Some(value.parse().map_err(|_| invalid("src", value))?),
                "dst" => fields.dst = Some(value.parse().map_err(|_| invalid("dst", value))?),
                other => return Err(RuleError::UnknownAttribute(other.to_string())),
            }
        }

        let kind = kind.ok_or_else(|| RuleError::syntax("Invalid rule: missing \"type\""))?;
        fields.validate()?;
        let action = action.ok_or_else(|| RuleError::syntax("Invalid rule: missing \"action\""))?;

        Rule::new(action, kind, fields)
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn fields(&self) -> &RuleFields {
        &self.fields
    }

    /// Check a PDU against this rule.
    ///
    /// `src`/`dst` are the addresses of the sending and receiving peers as the
    /// relay sees them; a criterion on an unknown address never matches.
    pub fn matches(
        &self,
        pdu: &AttPdu,
        from_master: bool,
        src: Option<&BdAddr>,
        dst: Option<&BdAddr>,
    ) -> bool {
        if pdu.kind() != Some(self.kind) {
            return false;
        }

        if let Some(handle) = self.fields.handle {
            if pdu.handle() != Some(handle) {
                return false;
            }
            if let Some(expected) = &self.fields.value {
                match pdu.value() {
                    Some(value) if expected.matches(value) => {}
                    _ => return false,
                }
            }
        }

        if let Some(expected) = &self.fields.src {
            if src != Some(expected) {
                return false;
            }
        }

        if let Some(expected) = &self.fields.dst {
            if dst != Some(expected) {
                return false;
            }
        }

        if let Some(direction) = self.fields.direction {
            // A PDU from the master travels toward the slave
            if from_master != (direction == Direction::ToSlave) {
                return false;
            }
        }

        true
    }
}

fn invalid(key: &'static str, value: &str) -> RuleError {
    RuleError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action {} type {}", self.action, self.kind)?;
        if let Some(handle) = self.fields.handle {
            write!(f, " handle 0x{:04x}", handle)?;
        }
        if let Some(value) = &self.fields.value {
            write!(f, " value {}", value)?;
        }
        if let Some(direction) = self.fields.direction {
            write!(f, " direction {}", direction)?;
        }
        if let Some(src) = &self.fields.src {
            write!(f, " src {}", src)?;
        }
        if let Some(dst) = &self.fields.dst {
            write!(f, " dst {}", dst)?;
        }
        Ok(())
    }
}
