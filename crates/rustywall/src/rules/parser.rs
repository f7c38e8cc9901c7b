//! Rule file parser
//!
//! Line oriented: `//` starts a comment, blank lines are ignored, runs of
//! whitespace separate tokens and `=` may be used between a key and its value.

use super::{parse_integer, Action, Rule, RuleSet, UuidFilter};
use crate::error::RuleError;
use log::{debug, info};
use std::str::FromStr;

const BLE_TABLES: &str = "BLE_TABLES";
const END_BLE_TABLES: &str = "END BLE_TABLES";
const GATT_FILTER: &str = "GATT_FILTER";
const END_GATT_FILTER: &str = "END GATT_FILTER";

/// Validated content of a rule file
#[derive(Debug, Clone, Default)]
pub struct RuleFile {
    /// BLE_TABLES rules; allow-everything when the context is absent
    pub rules: RuleSet,
    /// GATT_FILTER identifiers; empty when the context is absent
    pub uuid_filter: UuidFilter,
}

impl RuleFile {
    /// Parse and validate the text of a rule file
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let mut lines = text.lines().filter_map(clean_line);
        let mut rules = None;
        let mut uuid_filter = None;

        while let Some(line) = lines.next() {
            match line {
                BLE_TABLES => {
                    if rules.is_some() {
                        return Err(RuleError::syntax("Several BLE_TABLES contexts in rule file"));
                    }
                    rules = Some(parse_ble_tables(&mut lines)?);
                }
                GATT_FILTER => {
                    if uuid_filter.is_some() {
                        return Err(RuleError::syntax("Several GATT_FILTER contexts in rule file"));
                    }
                    uuid_filter = Some(parse_gatt_filter(&mut lines)?);
                }
                other => {
                    return Err(RuleError::syntax(format!(
                        "Non-empty line outside of contexts: \"{}\" (use // for comments)",
                        other
                    )))
                }
            }
        }

        let rules = rules.unwrap_or_default();
        let uuid_filter = uuid_filter.unwrap_or_default();
        info!(
            "Loaded {} firewall rules (default {}), {} filtered UUIDs",
            rules.len(),
            rules.default_action(),
            uuid_filter.len()
        );

        Ok(Self { rules, uuid_filter })
    }
}

impl FromStr for RuleFile {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleFile::parse(s)
    }
}

/// Strip the comment and surrounding whitespace, dropping lines left empty
fn clean_line(line: &str) -> Option<&str> {
    let line = match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    };
    let line = line.trim();
    (!line.is_empty()).then_some(line)
}

fn tokenize(line: &str) -> Vec<&str> {
    line.split(|c: char| c.is_whitespace() || c == '=')
        .filter(|token| !token.is_empty())
        .collect()
}

fn parse_ble_tables<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<RuleSet, RuleError> {
    debug!("Parsing BLE_TABLES...");

    let mut default_action = None;
    let mut rules = Vec::new();

    loop {
        let line = lines
            .next()
            .ok_or_else(|| RuleError::syntax("Syntax error in BLE_TABLES: no END"))?;
        if line == END_BLE_TABLES {
            break;
        }

        let tokens = tokenize(line);
        match tokens.as_slice() {
            ["default", verdict] => {
                let action = verdict.parse::<Action>()?;
                if default_action.replace(action).is_some() {
                    return Err(RuleError::syntax("Several default rules in BLE_TABLES context"));
                }
            }
            ["default", ..] => {
                return Err(RuleError::syntax(format!("Invalid default rule: \"{}\"", line)))
            }
            _ => rules.push(parse_rule(line, &tokens)?),
        }
    }

    let default_action =
        default_action.ok_or_else(|| RuleError::syntax("No default rule in BLE_TABLES"))?;

    let mut set = RuleSet::new(default_action);
    for rule in rules {
        debug!("Rule: {}", rule);
        set.push(rule);
    }
    Ok(set)
}

fn parse_rule(line: &str, tokens: &[&str]) -> Result<Rule, RuleError> {
    let pairs = tokens
        .chunks(2)
        .map(|pair| match pair {
            [key, value] => Ok((*key, *value)),
            _ => Err(RuleError::syntax(format!(
                "Malformed rule \"{}\": missing \"{}\" value",
                line, pair[0]
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Rule::from_pairs(&pairs)
}

fn parse_gatt_filter<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
) -> Result<UuidFilter, RuleError> {
    debug!("Parsing GATT_FILTER...");

    let mut filter = UuidFilter::new();

    loop {
        let line = lines
            .next()
            .ok_or_else(|| RuleError::syntax("Syntax error in GATT_FILTER: no END"))?;
        if line == END_GATT_FILTER {
            break;
        }

        let tokens = tokenize(line);
        let position = tokens
            .iter()
            .position(|token| *token == "uuid")
            .ok_or_else(|| {
                RuleError::syntax(format!("Invalid filter \"{}\": missing \"uuid\"", line))
            })?;
        let value = tokens.get(position + 1).ok_or_else(|| {
            RuleError::syntax(format!("Malformed filter \"{}\": missing \"uuid\" value", line))
        })?;
        let uuid = parse_integer(value).ok_or_else(|| RuleError::InvalidValue {
            key: "uuid",
            value: value.to_string(),
        })?;

        debug!("Filtered UUID: 0x{:x}", uuid);
        filter.insert(uuid);
    }

    Ok(filter)
}
