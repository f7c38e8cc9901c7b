//! Unit tests for the rule language

use super::*;
use crate::att::{AttPdu, PacketKind};
use crate::gap::BdAddr;

fn parse_tables(body: &str) -> Result<RuleFile, RuleError> {
    RuleFile::parse(&format!("BLE_TABLES\n{}\nEND BLE_TABLES\n", body))
}

fn write(handle: u16, value: &[u8]) -> AttPdu {
    AttPdu::WriteRequest {
        handle,
        value: value.to_vec(),
    }
}

#[test]
fn test_parse_rule_file() {
    let file = RuleFile::parse(
        "// Block reads of the key characteristic
BLE_TABLES
    action deny   type ReadRequest handle 0x0021   // first
    action allow  type BLEWriteRequest handle 0x0025 value 0x01 direction slave
    action deny type writerequest
    default allow
END BLE_TABLES

GATT_FILTER
uuid 0x180d
uuid = 6159
END GATT_FILTER
",
    )
    .unwrap();

    assert_eq!(file.rules.default_action(), Action::Allow);
    assert_eq!(file.rules.len(), 3);

    let reads = file.rules.rules_for(PacketKind::ReadRequest);
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].action(), Action::Deny);
    assert_eq!(reads[0].fields().handle, Some(0x0021));

    let writes = file.rules.rules_for(PacketKind::WriteRequest);
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].action(), Action::Allow);
    assert_eq!(writes[0].fields().direction, Some(Direction::ToSlave));
    assert_eq!(writes[1].action(), Action::Deny);
    assert!(file.rules.rules_for(PacketKind::ReadBlobRequest).is_empty());

    assert!(file.uuid_filter.contains(0x180d));
    assert!(file.uuid_filter.contains(0x180f));
    assert_eq!(file.uuid_filter.len(), 2);
}

#[test]
fn test_empty_file_allows_everything() {
    let file = RuleFile::parse("// nothing here\n\n").unwrap();
    assert!(file.rules.is_empty());
    assert_eq!(file.rules.default_action(), Action::Allow);
    assert!(file.uuid_filter.is_empty());
}

#[test]
fn test_value_requires_handle() {
    let expected = Err(RuleError::IncompatibleAttribute {
        attribute: "value",
        requires: "handle",
    });
    assert_eq!(
        parse_tables("type = ReadRequest value = 5\ndefault allow").map(|_| ()),
        expected
    );
    assert_eq!(
        parse_tables("action deny type WriteRequest value 0x01\ndefault allow").map(|_| ()),
        expected
    );
}

#[test]
fn test_default_line_errors() {
    assert!(matches!(
        parse_tables("action deny type ReadRequest"),
        Err(RuleError::Syntax(_))
    ));
    assert!(matches!(
        parse_tables("default allow\ndefault deny"),
        Err(RuleError::Syntax(_))
    ));
    assert!(matches!(
        parse_tables("default maybe"),
        Err(RuleError::InvalidVerdict(v)) if v == "maybe"
    ));
    assert!(matches!(
        parse_tables("default allow please"),
        Err(RuleError::Syntax(_))
    ));
}

#[test]
fn test_missing_end() {
    assert!(matches!(
        RuleFile::parse("BLE_TABLES\ndefault allow\n"),
        Err(RuleError::Syntax(_))
    ));
    assert!(matches!(
        RuleFile::parse("GATT_FILTER\nuuid 0x180d\n"),
        Err(RuleError::Syntax(_))
    ));
}

#[test]
fn test_context_errors() {
    assert!(matches!(
        RuleFile::parse("action deny type ReadRequest"),
        Err(RuleError::Syntax(_))
    ));
    assert!(matches!(
        RuleFile::parse(
            "BLE_TABLES\ndefault allow\nEND BLE_TABLES\nBLE_TABLES\ndefault deny\nEND BLE_TABLES"
        ),
        Err(RuleError::Syntax(_))
    ));
    assert!(matches!(
        RuleFile::parse("GATT_FILTER\nEND GATT_FILTER\nGATT_FILTER\nEND GATT_FILTER"),
        Err(RuleError::Syntax(_))
    ));
}

#[test]
fn test_rule_line_errors() {
    let check = |line: &str| parse_tables(&format!("{}\ndefault allow", line)).map(|_| ());

    assert_eq!(
        check("action deny type ReadRequest color red"),
        Err(RuleError::UnknownAttribute("color".to_string()))
    );
    assert_eq!(
        check("action deny type ReadSomething"),
        Err(RuleError::UnknownPacketType("ReadSomething".to_string()))
    );
    assert_eq!(
        check("action reject type ReadRequest"),
        Err(RuleError::InvalidVerdict("reject".to_string()))
    );
    assert_eq!(
        check("action deny type ReadRequest handle 0x10000"),
        Err(RuleError::InvalidValue {
            key: "handle",
            value: "0x10000".to_string()
        })
    );
    assert_eq!(
        check("action deny type ReadRequest direction sideways"),
        Err(RuleError::InvalidValue {
            key: "direction",
            value: "sideways".to_string()
        })
    );
    assert_eq!(
        check("action deny type ReadRequest src 00:11:22"),
        Err(RuleError::InvalidValue {
            key: "src",
            value: "00:11:22".to_string()
        })
    );
    assert!(matches!(check("type ReadRequest"), Err(RuleError::Syntax(_))));
    assert!(matches!(check("action deny handle 0x0003"), Err(RuleError::Syntax(_))));
    assert!(matches!(
        check("action deny type ReadRequest handle"),
        Err(RuleError::Syntax(_))
    ));
    assert!(matches!(
        check("action deny type ReadRequest type WriteRequest"),
        Err(RuleError::Syntax(_))
    ));
}

#[test]
fn test_filter_errors() {
    assert!(matches!(
        RuleFile::parse("GATT_FILTER\nhandle 0x0003\nEND GATT_FILTER"),
        Err(RuleError::Syntax(_))
    ));
    assert!(matches!(
        RuleFile::parse("GATT_FILTER\nuuid\nEND GATT_FILTER"),
        Err(RuleError::Syntax(_))
    ));
    assert_eq!(
        RuleFile::parse("GATT_FILTER\nuuid 0xZZ\nEND GATT_FILTER").map(|_| ()),
        Err(RuleError::InvalidValue {
            key: "uuid",
            value: "0xZZ".to_string()
        })
    );
}

#[test]
fn test_rule_without_criteria_matches_its_kind() {
    let rule = Rule::new(Action::Deny, PacketKind::WriteRequest, RuleFields::default()).unwrap();
    assert!(rule.matches(&write(0x0001, &[]), true, None, None));
    assert!(rule.matches(&write(0x0100, &[0xFF]), false, None, None));
    assert!(!rule.matches(&AttPdu::ReadRequest { handle: 0x0001 }, true, None, None));
}

#[test]
fn test_value_matching() {
    let rule = Rule::from_pairs(&[
        ("action", "deny"),
        ("type", "WriteRequest"),
        ("handle", "0x0025"),
        ("value", "0x0100"),
    ])
    .unwrap();

    assert!(rule.matches(&write(0x0025, &[0x00, 0x01]), true, None, None));
    // Zero-extended comparison
    assert!(rule.matches(&write(0x0025, &[0x00, 0x01, 0x00, 0x00]), true, None, None));
    assert!(!rule.matches(&write(0x0025, &[0x01, 0x00]), true, None, None));
    assert!(!rule.matches(&write(0x0026, &[0x00, 0x01]), true, None, None));
    // Value wider than the field: no match, no error
    assert!(!rule.matches(&write(0x0025, &[0x00]), true, None, None));

    // Same value written in decimal
    let decimal = RuleValue::parse("256").unwrap();
    assert!(decimal.matches(&[0x00, 0x01]));
    assert_eq!(decimal.to_string(), "0x0100");
}

#[test]
fn test_long_hex_value() {
    let value = RuleValue::parse("0x0102030405060708090a0b0c0d0e0f101112").unwrap();
    let field: Vec<u8> = (1..=0x12).rev().collect();
    assert!(value.matches(&field));
    assert!(!value.matches(&field[..17]));
    assert!(RuleValue::parse("0x").is_none());
    assert!(RuleValue::parse("0x12g4").is_none());
}

#[test]
fn test_address_matching() {
    let rule = Rule::from_pairs(&[
        ("action", "deny"),
        ("type", "ReadRequest"),
        ("src", "aa:bb:cc:dd:ee:ff"),
        ("dst", "00:11:22:33:44:55"),
    ])
    .unwrap();
    let src: BdAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
    let dst: BdAddr = "00:11:22:33:44:55".parse().unwrap();
    let pdu = AttPdu::ReadRequest { handle: 0x0003 };

    assert!(rule.matches(&pdu, true, Some(&src), Some(&dst)));
    assert!(!rule.matches(&pdu, true, Some(&dst), Some(&dst)));
    // An address criterion never matches an unknown peer
    assert!(!rule.matches(&pdu, true, Some(&src), None));
}

#[test]
fn test_direction_matching() {
    let to_master = Rule::from_pairs(&[
        ("action", "deny"),
        ("type", "HandleValueNotification"),
        ("direction", "master"),
    ])
    .unwrap();
    let notification = AttPdu::HandleValueNotification {
        handle: 0x0003,
        value: vec![0x01],
    };

    assert!(to_master.matches(&notification, false, None, None));
    assert!(!to_master.matches(&notification, true, None, None));
}

#[test]
fn test_rule_set_evaluation_order() {
    let file = parse_tables(
        "action deny type ReadRequest handle 0x0010
         action allow type ReadRequest
         default deny",
    )
    .unwrap();

    let evaluate = |pdu: &AttPdu| file.rules.evaluate(pdu, true, None, None);
    assert_eq!(evaluate(&AttPdu::ReadRequest { handle: 0x0010 }), Action::Deny);
    assert_eq!(evaluate(&AttPdu::ReadRequest { handle: 0x0020 }), Action::Allow);
    assert_eq!(evaluate(&write(0x0010, &[0x01])), Action::Deny);
}

#[test]
fn test_rule_display() {
    let rule = Rule::from_pairs(&[
        ("type", "BLEWriteRequest"),
        ("handle", "37"),
        ("value", "0x01"),
        ("direction", "slave"),
        ("action", "allow"),
    ])
    .unwrap();
    assert_eq!(
        rule.to_string(),
        "action allow type WriteRequest handle 0x0025 value 0x01 direction slave"
    );
}
