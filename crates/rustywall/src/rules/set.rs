//! Rule set and UUID filter produced by the parser

use super::{Action, Rule};
use crate::att::{AttPdu, PacketKind};
use crate::gap::BdAddr;
use log::trace;
use std::collections::{BTreeSet, HashMap};

/// Rules grouped by packet kind, in declaration order, plus the default verdict
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: HashMap<PacketKind, Vec<Rule>>,
    default_action: Action,
}

impl Default for RuleSet {
    /// No rules, everything allowed
    fn default() -> Self {
        Self::new(Action::Allow)
    }
}

impl RuleSet {
    pub fn new(default_action: Action) -> Self {
        Self {
            rules: HashMap::new(),
            default_action,
        }
    }

    /// Append a rule after every rule already declared for its kind
    pub fn push(&mut self, rule: Rule) {
        self.rules.entry(rule.kind()).or_default().push(rule);
    }

    pub fn default_action(&self) -> Action {
        self.default_action
    }

    /// Rules declared for `kind`, in declaration order
    pub fn rules_for(&self, kind: PacketKind) -> &[Rule] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of rules
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verdict of the first matching rule, or the default verdict
    pub fn evaluate(
        &self,
        pdu: &AttPdu,
        from_master: bool,
        src: Option<&BdAddr>,
        dst: Option<&BdAddr>,
    ) -> Action {
        let Some(kind) = pdu.kind() else {
            return self.default_action;
        };

        match self
            .rules_for(kind)
            .iter()
            .find(|rule| rule.matches(pdu, from_master, src, dst))
        {
            Some(rule) => {
                trace!("{} matched rule \"{}\"", kind, rule);
                rule.action()
            }
            None => self.default_action,
        }
    }
}

/// Attribute type identifiers hidden from the master
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UuidFilter {
    uuids: BTreeSet<u128>,
}

impl UuidFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uuid: u128) -> bool {
        self.uuids.insert(uuid)
    }

    pub fn contains(&self, uuid: u128) -> bool {
        self.uuids.contains(&uuid)
    }

    /// Whether any of `uuids` is filtered
    pub fn intersects<'a>(&self, uuids: impl IntoIterator<Item = &'a u128>) -> bool {
        uuids.into_iter().any(|uuid| self.uuids.contains(uuid))
    }

    pub fn iter(&self) -> impl Iterator<Item = u128> + '_ {
        self.uuids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.uuids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uuids.is_empty()
    }
}

impl FromIterator<u128> for UuidFilter {
    fn from_iter<I: IntoIterator<Item = u128>>(iter: I) -> Self {
        Self {
            uuids: iter.into_iter().collect(),
        }
    }
}
