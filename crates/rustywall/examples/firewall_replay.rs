use rustywall::{DiscoverySnapshot, Inbound, RelayConfig, RelayError, RelayScenario, Transport};
use std::io::BufRead;

/// Prints what the relay would put on the air
struct PrintTransport;

impl Transport for PrintTransport {
    fn send_to_slave(&mut self, pdu: &[u8]) -> Result<(), RelayError> {
        println!("  -> slave  {}", hex::encode(pdu));
        Ok(())
    }

    fn send_to_master(&mut self, pdu: &[u8]) -> Result<(), RelayError> {
        println!("  -> master {}", hex::encode(pdu));
        Ok(())
    }
}

/// Replays a captured ATT exchange through the firewall.
///
/// Usage: firewall_replay <rules file> <gatt dump> < frames
///
/// Each input line is `M <hex>` (from the master) or `S <hex>` (from the slave).
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        return Err("usage: firewall_replay <rules file> <gatt dump>".into());
    }

    println!("Loading rules from {}...", args[1]);
    let rules = std::fs::read_to_string(&args[1])?;

    println!("Loading discovery dump from {}...", args[2]);
    let snapshot = DiscoverySnapshot::parse_gatt_dump(&std::fs::read_to_string(&args[2])?)?;

    let mut relay =
        RelayScenario::from_rule_text(RelayConfig::default(), &rules, snapshot, PrintTransport)?;
    relay.start()?;

    let mut frames = Vec::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let Some((side, data)) = line.trim().split_once(' ') else {
            continue;
        };
        let data = hex::decode(data.trim())?;
        match side {
            "M" | "m" => frames.push(Inbound::FromMaster(data)),
            "S" | "s" => frames.push(Inbound::FromSlave(data)),
            other => return Err(format!("unknown side {:?}", other).into()),
        }
    }

    let stats = relay.run(frames)?;
    println!("\n{:#?}", stats);

    Ok(())
}
