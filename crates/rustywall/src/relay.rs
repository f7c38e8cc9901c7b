//! Relay scenario driver
//!
//! Glues the pieces together: discovery first, then one firewall decision per
//! frame received from either side. Connection handling and the actual
//! radio I/O belong to the [`Transport`] implementation.

use crate::att::AttPdu;
use crate::discovery::DiscoveryAdapter;
use crate::error::{FirewallError, RelayError};
use crate::firewall::{ErrorReply, FirewallEngine, Verdict};
use crate::gap::BdAddr;
use crate::rules::RuleFile;
use log::{debug, info, warn};

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address of the slave being impersonated
    pub target: Option<BdAddr>,
    /// Address used by the relay toward the slave
    pub initiator: Option<BdAddr>,
    /// Answer denied master requests with an ATT error instead of silence
    pub send_error_replies: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target: None,
            initiator: None,
            send_error_replies: true,
        }
    }
}

/// Link primitives provided by the surrounding relay
pub trait Transport {
    /// Send a raw ATT PDU to the slave
    fn send_to_slave(&mut self, pdu: &[u8]) -> Result<(), RelayError>;

    /// Send a raw ATT PDU to the master
    fn send_to_master(&mut self, pdu: &[u8]) -> Result<(), RelayError>;

    /// Notify the master that one of its requests was denied
    fn send_error_reply(&mut self, reply: &ErrorReply) -> Result<(), RelayError> {
        self.send_to_master(&reply.to_pdu().encode())
    }
}

/// A frame received by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    FromMaster(Vec<u8>),
    FromSlave(Vec<u8>),
}

/// Counters kept by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded_to_slave: u64,
    pub forwarded_to_master: u64,
    /// Dropped by filtering or by a deny without reply
    pub dropped: u64,
    /// Error replies sent to the master
    pub error_replies: u64,
    /// Frames the ATT codec rejected
    pub undecodable: u64,
}

/// Drives one man-in-the-middle session
pub struct RelayScenario<D, T> {
    config: RelayConfig,
    engine: FirewallEngine,
    discovery: D,
    transport: T,
    stats: RelayStats,
}

impl<D: DiscoveryAdapter, T: Transport> RelayScenario<D, T> {
    pub fn new(config: RelayConfig, rules: RuleFile, discovery: D, transport: T) -> Self {
        let mut engine = FirewallEngine::from_rule_file(rules);
        if let Some(target) = config.target {
            engine = engine.with_target(target);
        }
        engine.set_initiator(config.initiator);

        Self {
            config,
            engine,
            discovery,
            transport,
            stats: RelayStats::default(),
        }
    }

    /// Parse the rule file text and build the scenario; nothing runs on a bad file
    pub fn from_rule_text(
        config: RelayConfig,
        rules: &str,
        discovery: D,
        transport: T,
    ) -> Result<Self, FirewallError> {
        let rules = RuleFile::parse(rules)?;
        Ok(Self::new(config, rules, discovery, transport))
    }

    pub fn engine(&self) -> &FirewallEngine {
        &self.engine
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The master connected through a new initiator address
    pub fn set_initiator(&mut self, initiator: Option<BdAddr>) {
        self.config.initiator = initiator;
        self.engine.set_initiator(initiator);
    }

    /// Run discovery against the slave and start rewriting handles
    pub fn start(&mut self) -> Result<(), RelayError> {
        info!("Discovering slave attributes...");
        let snapshot = self
            .discovery
            .discover()
            .map_err(FirewallError::from)?;
        self.engine.install_translator(&snapshot)?;
        Ok(())
    }

    /// Process one frame received from the master
    pub fn handle_from_master(&mut self, frame: &[u8]) -> Result<(), RelayError> {
        let pdu = match AttPdu::decode(frame) {
            Ok(pdu) => pdu,
            Err(e) => {
                warn!("Dropping undecodable frame from master: {} ({})", e, hex::encode(frame));
                self.stats.undecodable += 1;
                return Ok(());
            }
        };

        match self.engine.on_from_master(pdu) {
            Verdict::Forward(pdu) => {
                self.transport.send_to_slave(&pdu.encode())?;
                self.stats.forwarded_to_slave += 1;
            }
            Verdict::DropWithErrorReply(reply) if self.config.send_error_replies => {
                debug!("Replying {}", reply);
                self.transport.send_error_reply(&reply)?;
                self.stats.error_replies += 1;
            }
            Verdict::Drop | Verdict::DropWithErrorReply(_) => self.stats.dropped += 1,
        }
        Ok(())
    }

    /// Process one frame received from the slave
    pub fn handle_from_slave(&mut self, frame: &[u8]) -> Result<(), RelayError> {
        let pdu = match AttPdu::decode(frame) {
            Ok(pdu) => pdu,
            Err(_) if !self.engine.is_active() => {
                self.transport.send_to_master(frame)?;
                self.stats.forwarded_to_master += 1;
                return Ok(());
            }
            Err(e) => {
                warn!("Dropping undecodable frame from slave: {} ({})", e, hex::encode(frame));
                self.stats.undecodable += 1;
                return Ok(());
            }
        };

        match self.engine.on_from_slave(pdu) {
            Verdict::Forward(pdu) => {
                self.transport.send_to_master(&pdu.encode())?;
                self.stats.forwarded_to_master += 1;
            }
            Verdict::Drop | Verdict::DropWithErrorReply(_) => self.stats.dropped += 1,
        }
        Ok(())
    }

    /// Feed frames until the source runs dry or the transport fails
    pub fn run<I>(&mut self, frames: I) -> Result<RelayStats, RelayError>
    where
        I: IntoIterator<Item = Inbound>,
    {
        for frame in frames {
            match frame {
                Inbound::FromMaster(data) => self.handle_from_master(&data)?,
                Inbound::FromSlave(data) => self.handle_from_slave(&data)?,
            }
        }

        info!(
            "Relay stopped: {} to slave, {} to master, {} dropped, {} error replies",
            self.stats.forwarded_to_slave,
            self.stats.forwarded_to_master,
            self.stats.dropped,
            self.stats.error_replies
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::constants::*;
    use crate::discovery::{DiscoveryError, DiscoverySnapshot};

    /// Records everything sent through it
    #[derive(Default)]
    struct MockTransport {
        to_slave: Vec<Vec<u8>>,
        to_master: Vec<Vec<u8>>,
        fail: bool,
    }

    impl Transport for MockTransport {
        fn send_to_slave(&mut self, pdu: &[u8]) -> Result<(), RelayError> {
            if self.fail {
                return Err(RelayError::Transport("link lost".to_string()));
            }
            self.to_slave.push(pdu.to_vec());
            Ok(())
        }

        fn send_to_master(&mut self, pdu: &[u8]) -> Result<(), RelayError> {
            if self.fail {
                return Err(RelayError::Transport("link lost".to_string()));
            }
            self.to_master.push(pdu.to_vec());
            Ok(())
        }
    }

    struct FailingDiscovery;

    impl DiscoveryAdapter for FailingDiscovery {
        fn discover(&mut self) -> Result<DiscoverySnapshot, DiscoveryError> {
            Err(DiscoveryError::Failed("connection timeout".to_string()))
        }
    }

    const RULES: &str = "
BLE_TABLES
action deny type ReadRequest handle 0x0021
default allow
END BLE_TABLES

GATT_FILTER
uuid 0x180d
END GATT_FILTER
";

    /// Heart rate service at 0x0010-0x0013 hidden, Battery service at 0x0020 onward visible
    fn snapshot() -> DiscoverySnapshot {
        let mut snapshot = DiscoverySnapshot::new();
        snapshot.add_service(0x0001, 0x000F, 0x1800);
        snapshot.add_service(0x0010, 0x0013, 0x180d);
        snapshot.add_characteristic(0x0011, 0x0012, 0x2a37);
        snapshot.add_descriptor(0x0013, 0x2902);
        snapshot.add_service(0x0020, 0xFFFF, 0x180f);
        snapshot.add_characteristic(0x0021, 0x0022, 0x2a19);
        snapshot
    }

    fn scenario() -> RelayScenario<DiscoverySnapshot, MockTransport> {
        RelayScenario::from_rule_text(
            RelayConfig::default(),
            RULES,
            snapshot(),
            MockTransport::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_relay_session() {
        let mut relay = scenario();
        relay.start().unwrap();

        let stats = relay
            .run(vec![
                // Read of virtual 0x001E, real 0x0022
                Inbound::FromMaster(vec![ATT_READ_REQ, 0x1E, 0x00]),
                Inbound::FromSlave(vec![ATT_READ_RSP, 0x64]),
                // Read of virtual 0x001D, real 0x0021: denied
                Inbound::FromMaster(vec![ATT_READ_REQ, 0x1D, 0x00]),
                // Notification from the hidden heart rate characteristic
                Inbound::FromSlave(vec![ATT_HANDLE_VALUE_NTF, 0x12, 0x00, 0x00, 0x48]),
            ])
            .unwrap();

        assert_eq!(
            stats,
            RelayStats {
                forwarded_to_slave: 1,
                forwarded_to_master: 1,
                dropped: 1,
                error_replies: 1,
                undecodable: 0,
            }
        );

        let transport = relay.transport();
        assert_eq!(transport.to_slave, vec![vec![ATT_READ_REQ, 0x22, 0x00]]);
        assert_eq!(
            transport.to_master,
            vec![
                vec![ATT_READ_RSP, 0x64],
                vec![
                    ATT_ERROR_RSP,
                    ATT_READ_REQ,
                    0x1D,
                    0x00,
                    ATT_ERROR_READ_NOT_PERMITTED
                ],
            ]
        );
    }

    #[test]
    fn test_service_discovery_hides_filtered_service() {
        let mut relay = scenario();
        relay.start().unwrap();

        // Primary services 0x0001-0x000F (0x1800), 0x0010-0x0013 (0x180D), 0x0020-0xFFFF (0x180F)
        let response = vec![
            ATT_READ_BY_GROUP_TYPE_RSP,
            0x06,
            0x01, 0x00, 0x0F, 0x00, 0x00, 0x18,
            0x10, 0x00, 0x13, 0x00, 0x0D, 0x18,
            0x20, 0x00, 0xFF, 0xFF, 0x0F, 0x18,
        ];
        relay.handle_from_slave(&response).unwrap();

        assert_eq!(
            relay.transport().to_master,
            vec![vec![
                ATT_READ_BY_GROUP_TYPE_RSP,
                0x06,
                0x01, 0x00, 0x0F, 0x00, 0x00, 0x18,
                0x1C, 0x00, 0xFF, 0xFF, 0x0F, 0x18,
            ]]
        );
    }

    #[test]
    fn test_error_replies_can_be_disabled() {
        let config = RelayConfig {
            send_error_replies: false,
            ..RelayConfig::default()
        };
        let mut relay =
            RelayScenario::from_rule_text(config, RULES, snapshot(), MockTransport::default())
                .unwrap();

        relay.handle_from_master(&[ATT_READ_REQ, 0x21, 0x00]).unwrap();
        assert!(relay.transport().to_master.is_empty());
        assert_eq!(relay.stats().dropped, 1);
    }

    #[test]
    fn test_undecodable_frames() {
        let mut relay = scenario();

        // Before discovery the slave side is passed through untouched
        relay.handle_from_slave(&[ATT_READ_BY_TYPE_RSP]).unwrap();
        assert_eq!(relay.transport().to_master, vec![vec![ATT_READ_BY_TYPE_RSP]]);

        relay.start().unwrap();
        relay.handle_from_slave(&[ATT_READ_BY_TYPE_RSP]).unwrap();
        relay.handle_from_master(&[]).unwrap();
        assert_eq!(relay.transport().to_master.len(), 1);
        assert_eq!(relay.stats().undecodable, 2);
    }

    #[test]
    fn test_start_fails_when_discovery_fails() {
        let mut relay = RelayScenario::from_rule_text(
            RelayConfig::default(),
            RULES,
            FailingDiscovery,
            MockTransport::default(),
        )
        .unwrap();

        assert!(matches!(
            relay.start(),
            Err(RelayError::Firewall(FirewallError::Discovery(DiscoveryError::Failed(_))))
        ));
        assert!(!relay.engine().is_active());
    }

    #[test]
    fn test_bad_rule_file_prevents_construction() {
        let result = RelayScenario::from_rule_text(
            RelayConfig::default(),
            "BLE_TABLES\naction deny type ReadRequest\nEND BLE_TABLES",
            snapshot(),
            MockTransport::default(),
        );
        assert!(matches!(result, Err(FirewallError::Rules(_))));
    }

    #[test]
    fn test_transport_failure_stops_run() {
        let mut relay = RelayScenario::from_rule_text(
            RelayConfig::default(),
            RULES,
            snapshot(),
            MockTransport {
                fail: true,
                ..MockTransport::default()
            },
        )
        .unwrap();

        let result = relay.run(vec![Inbound::FromMaster(vec![ATT_READ_REQ, 0x01, 0x00])]);
        assert!(matches!(result, Err(RelayError::Transport(_))));
    }
}
