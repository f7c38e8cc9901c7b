//! Discovery results consumed by the handle translator
//!
//! Discovery itself (connecting to the slave and walking its services) is
//! done by an external collaborator implementing [`DiscoveryAdapter`]. What
//! the relay needs from it is which UUIDs each attribute handle belongs to:
//! a handle carries its own type plus the UUID of every service range that
//! contains it.

use crate::rules::parse_integer;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors reported by a discovery source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Malformed discovery dump at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Unknown attribute kind in discovery dump: {0}")]
    UnknownKind(String),

    #[error("Discovery failed: {0}")]
    Failed(String),
}

/// Source of the slave's attribute layout, queried once before relaying starts
pub trait DiscoveryAdapter {
    fn discover(&mut self) -> Result<DiscoverySnapshot, DiscoveryError>;
}

/// Handle to UUID-set mapping of the slave's attribute database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySnapshot {
    handles: BTreeMap<u16, BTreeSet<u128>>,
    services: Vec<(u16, u16, u128)>,
}

impl DiscoverySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `uuid` with one handle
    pub fn insert(&mut self, handle: u16, uuid: u128) {
        self.handles.entry(handle).or_default().insert(uuid);
    }

    /// A service: its UUID applies to every handle from `start` to `end`
    pub fn add_service(&mut self, start: u16, end: u16, uuid: u128) {
        self.insert(start, uuid);
        self.services.push((start, end.max(start), uuid));
    }

    /// A characteristic: its UUID applies to the declaration and the value handle
    pub fn add_characteristic(&mut self, declaration_handle: u16, value_handle: u16, uuid: u128) {
        self.insert(declaration_handle, uuid);
        self.insert(value_handle, uuid);
    }

    pub fn add_descriptor(&mut self, handle: u16, uuid: u128) {
        self.insert(handle, uuid);
    }

    /// Highest handle reported by discovery
    pub fn max_handle(&self) -> Option<u16> {
        self.handles.keys().next_back().copied()
    }

    /// Number of discovered handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// UUIDs of every handle, service membership included, in ascending handle order.
    ///
    /// Service ranges are cut at the highest discovered handle, so a last
    /// service ending at `0xFFFF` does not expand into the whole handle space.
    pub fn handle_uuids(&self) -> BTreeMap<u16, BTreeSet<u128>> {
        let mut handles = self.handles.clone();
        let Some(max_handle) = self.max_handle() else {
            return handles;
        };

        for &(start, end, uuid) in &self.services {
            for handle in start..=end.min(max_handle) {
                handles.entry(handle).or_default().insert(uuid);
            }
        }
        handles
    }

    /// `(handle, uuids)` pairs, ascending
    pub fn iter(&self) -> impl Iterator<Item = (u16, BTreeSet<u128>)> {
        self.handle_uuids().into_iter()
    }

    /// Parse the INI-like dump written by a GATT discovery run:
    ///
    /// ```text
    /// [0x0001]
    /// type = service
    /// uuid = 0x1800
    /// endhandle = 0x0007
    ///
    /// [0x0002]
    /// type = characteristic
    /// uuid = 0x2a00
    /// valuehandle = 0x0003
    /// ```
    ///
    /// Keys are case-insensitive, `:` may replace `=`, unknown keys are ignored.
    pub fn parse_gatt_dump(text: &str) -> Result<Self, DiscoveryError> {
        let mut snapshot = Self::new();
        let mut current: Option<DumpEntry> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                if let Some(entry) = current.take() {
                    entry.apply(&mut snapshot)?;
                }
                let handle = parse_handle(header.trim()).ok_or_else(|| DiscoveryError::Malformed {
                    line: line_no,
                    reason: format!("invalid handle header \"{}\"", line),
                })?;
                current = Some(DumpEntry::new(handle, line_no));
                continue;
            }

            let entry = current.as_mut().ok_or_else(|| DiscoveryError::Malformed {
                line: line_no,
                reason: "field outside of an attribute section".to_string(),
            })?;
            let (key, value) = line
                .split_once(['=', ':'])
                .ok_or_else(|| DiscoveryError::Malformed {
                    line: line_no,
                    reason: format!("expected \"key = value\", got \"{}\"", line),
                })?;
            entry
                .fields
                .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if let Some(entry) = current.take() {
            entry.apply(&mut snapshot)?;
        }

        debug!(
            "Discovery dump: {} handles, max handle {:?}",
            snapshot.len(),
            snapshot.max_handle()
        );
        Ok(snapshot)
    }
}

impl DiscoveryAdapter for DiscoverySnapshot {
    /// A snapshot is its own, already completed, discovery
    fn discover(&mut self) -> Result<DiscoverySnapshot, DiscoveryError> {
        Ok(self.clone())
    }
}

/// Attribute handles start at 0x0001
fn parse_handle(text: &str) -> Option<u16> {
    parse_integer(text)
        .and_then(|h| u16::try_from(h).ok())
        .filter(|h| *h != 0)
}

/// UUIDs may be written as integers or in the dashed 128-bit form
fn parse_uuid(text: &str) -> Option<u128> {
    if text.contains('-') {
        let digits: String = text.chars().filter(|c| *c != '-').collect();
        return u128::from_str_radix(&digits, 16).ok();
    }
    parse_integer(text)
}

struct DumpEntry {
    handle: u16,
    line: usize,
    fields: BTreeMap<String, String>,
}

impl DumpEntry {
    fn new(handle: u16, line: usize) -> Self {
        Self {
            handle,
            line,
            fields: BTreeMap::new(),
        }
    }

    fn field(&self, key: &str) -> Result<&str, DiscoveryError> {
        self.fields
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| DiscoveryError::Malformed {
                line: self.line,
                reason: format!("attribute 0x{:04X} has no \"{}\"", self.handle, key),
            })
    }

    fn handle_field(&self, key: &str) -> Result<u16, DiscoveryError> {
        let value = self.field(key)?;
        parse_handle(value).ok_or_else(|| DiscoveryError::Malformed {
            line: self.line,
            reason: format!("invalid {} \"{}\"", key, value),
        })
    }

    fn apply(self, snapshot: &mut DiscoverySnapshot) -> Result<(), DiscoveryError> {
        let uuid_text = self.field("uuid")?;
        let uuid = parse_uuid(uuid_text).ok_or_else(|| DiscoveryError::Malformed {
            line: self.line,
            reason: format!("invalid uuid \"{}\"", uuid_text),
        })?;

        match self.field("type")? {
            "service" => {
                let end = self.handle_field("endhandle")?;
                snapshot.add_service(self.handle, end, uuid);
            }
            "characteristic" => {
                let value_handle = self.handle_field("valuehandle")?;
                snapshot.add_characteristic(self.handle, value_handle, uuid);
            }
            "descriptor" => snapshot.add_descriptor(self.handle, uuid),
            other => {
                warn!("Unknown attribute kind \"{}\" at 0x{:04X}", other, self.handle);
                return Err(DiscoveryError::UnknownKind(other.to_string()));
            }
        }
        Ok(())
    }
}
