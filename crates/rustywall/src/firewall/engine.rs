//! Per-direction processing of intercepted ATT PDUs

use super::reply::ErrorReply;
use crate::att::{AttPdu, HandleField, HasHandleFields};
use crate::discovery::DiscoverySnapshot;
use crate::error::FirewallError;
use crate::gap::BdAddr;
use crate::rules::{Action, RuleFile, RuleSet, UuidFilter};
use crate::translator::HandleTranslator;
use log::{debug, info, trace};
use std::sync::OnceLock;

/// Outcome of processing one PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Send the (possibly rewritten) PDU on to the other side
    Forward(AttPdu),
    /// Discard the PDU
    Drop,
    /// Discard the PDU and answer the master with an error
    DropWithErrorReply(ErrorReply),
}

/// Rule evaluation and handle translation shared by both relay directions.
///
/// Rules and filter are fixed at construction. The translator is installed
/// once, when discovery completes; after that every method takes `&self`
/// and the engine can be shared between the two direction loops.
#[derive(Debug)]
pub struct FirewallEngine {
    rules: RuleSet,
    uuid_filter: UuidFilter,
    translator: OnceLock<HandleTranslator>,
    /// Address of the slave the relay impersonates
    target: Option<BdAddr>,
    /// Address the relay uses toward the slave
    initiator: Option<BdAddr>,
}

impl FirewallEngine {
    pub fn new(rules: RuleSet, uuid_filter: UuidFilter) -> Self {
        Self {
            rules,
            uuid_filter,
            translator: OnceLock::new(),
            target: None,
            initiator: None,
        }
    }

    /// Engine for the contents of a parsed rule file
    pub fn from_rule_file(file: RuleFile) -> Self {
        Self::new(file.rules, file.uuid_filter)
    }

    pub fn with_target(mut self, target: BdAddr) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_initiator(mut self, initiator: BdAddr) -> Self {
        self.initiator = Some(initiator);
        self
    }

    /// Record the address assigned to the slave-facing connection
    pub fn set_initiator(&mut self, initiator: Option<BdAddr>) {
        self.initiator = initiator;
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn uuid_filter(&self) -> &UuidFilter {
        &self.uuid_filter
    }

    pub fn translator(&self) -> Option<&HandleTranslator> {
        self.translator.get()
    }

    /// Whether discovery has completed and handles are being rewritten
    pub fn is_active(&self) -> bool {
        self.translator.get().is_some()
    }

    /// Build the translator from the discovery results. Allowed once.
    pub fn install_translator(&self, snapshot: &DiscoverySnapshot) -> Result<(), FirewallError> {
        let translator = HandleTranslator::from_discovery(snapshot, self.uuid_filter.clone());
        let hidden = translator.hidden_count();
        self.translator
            .set(translator)
            .map_err(|_| FirewallError::TranslatorAlreadyInstalled)?;

        info!("Firewall active, {} handles hidden from the master", hidden);
        Ok(())
    }

    /// Addresses as seen by a PDU travelling in the given direction
    fn addresses(&self, from_master: bool) -> (Option<&BdAddr>, Option<&BdAddr>) {
        if from_master {
            (self.initiator.as_ref(), self.target.as_ref())
        } else {
            (self.target.as_ref(), self.initiator.as_ref())
        }
    }

    fn evaluate(&self, pdu: &AttPdu, from_master: bool) -> Action {
        let (src, dst) = self.addresses(from_master);
        self.rules.evaluate(pdu, from_master, src, dst)
    }

    /// Opcodes the engine cannot look inside. Their handles cannot be
    /// translated, so once handles are rewritten they get the default verdict.
    fn on_unknown(&self, pdu: AttPdu) -> Verdict {
        if !self.is_active() {
            trace!("Opcode 0x{:02X} passed through", pdu.opcode());
            return Verdict::Forward(pdu);
        }
        match self.rules.default_action() {
            Action::Allow => {
                debug!("Opcode 0x{:02X} forwarded by default", pdu.opcode());
                Verdict::Forward(pdu)
            }
            Action::Deny => {
                info!("Opcode 0x{:02X} dropped by default", pdu.opcode());
                Verdict::Drop
            }
        }
    }

    /// Process a PDU sent by the master toward the slave
    pub fn on_from_master(&self, mut pdu: AttPdu) -> Verdict {
        // Replies echo the handle the master sent
        let reply = ErrorReply::for_request(&pdu);

        if let Some(translator) = self.translator.get() {
            for (field, handle) in pdu.handle_fields_mut() {
                let real = translator.virtual_to_real(*handle);
                if real != *handle {
                    trace!("{}: 0x{:04X} -> 0x{:04X}", field, *handle, real);
                    *handle = real;
                }
            }
        }

        let Some(kind) = pdu.kind() else {
            return self.on_unknown(pdu);
        };

        match self.evaluate(&pdu, true) {
            Action::Allow => Verdict::Forward(pdu),
            Action::Deny => match reply {
                Some(reply) => {
                    info!("{} from master denied, replying {}", kind, reply);
                    Verdict::DropWithErrorReply(reply)
                }
                None => {
                    info!("{} from master denied", kind);
                    Verdict::Drop
                }
            },
        }
    }

    /// Process a PDU sent by the slave toward the master
    pub fn on_from_slave(&self, mut pdu: AttPdu) -> Verdict {
        let Some(translator) = self.translator.get() else {
            return Verdict::Forward(pdu);
        };
        let kind = pdu.kind();

        let visible = match pdu.attribute_list_mut() {
            Some(list) => {
                let before = list.attribute_count();
                let left = list.remap_attributes(translator);
                if left < before {
                    debug!("{} attributes of {} hidden", before - left, before);
                }
                left > 0
            }
            None => translate_to_virtual(translator, &mut pdu),
        };
        if !visible {
            info!("Dropping {:?} from slave: nothing left to show", kind);
            return Verdict::Drop;
        }

        let Some(kind) = kind else {
            return self.on_unknown(pdu);
        };

        match self.evaluate(&pdu, false) {
            Action::Allow => Verdict::Forward(pdu),
            Action::Deny => {
                info!("{} from slave denied", kind);
                Verdict::Drop
            }
        }
    }
}

/// Rewrite the handle fields of a plain PDU to the virtual space.
/// Returns false when an attribute it names is hidden.
fn translate_to_virtual(translator: &HandleTranslator, pdu: &mut AttPdu) -> bool {
    for (field, handle) in pdu.handle_fields_mut() {
        let mapped = match field {
            HandleField::StartHandle => Some(translator.real_to_virtual_ceil(*handle)),
            HandleField::EndHandle => Some(translator.real_to_virtual_floor(*handle)),
            HandleField::Handle | HandleField::Listed(_) => translator.real_to_virtual(*handle),
        };
        match mapped {
            Some(virt) => {
                if virt != *handle {
                    trace!("{}: 0x{:04X} -> 0x{:04X}", field, *handle, virt);
                }
                *handle = virt;
            }
            None => {
                debug!("{} 0x{:04X} is hidden", field, *handle);
                return false;
            }
        }
    }
    true
}
