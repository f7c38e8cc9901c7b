use std::fmt;
use std::str::FromStr;

/// Bluetooth device address, stored little-endian as on the air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// Error returned when an address string is not `XX:XX:XX:XX:XX:XX`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid device address: {0}")]
pub struct AddressParseError(pub String);

impl FromStr for BdAddr {
    type Err = AddressParseError;

    /// Parses the usual most-significant-first notation; hex digits in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AddressParseError(s.to_string());

        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for slot in bytes.iter_mut().rev() {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(err());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: BdAddr = "fc:58:fa:a1:26:6b".parse().unwrap();
        assert_eq!(addr.bytes, [0x6B, 0x26, 0xA1, 0xFA, 0x58, 0xFC]);
        assert_eq!(addr.to_string(), "FC:58:FA:A1:26:6B");
        assert_eq!(addr, "FC:58:FA:A1:26:6B".parse().unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("FC:58:FA:A1:26".parse::<BdAddr>().is_err());
        assert!("FC:58:FA:A1:26:6B:00".parse::<BdAddr>().is_err());
        assert!("FC:58:FA:A1:26:6G".parse::<BdAddr>().is_err());
        assert!("FC-58-FA-A1-26-6B".parse::<BdAddr>().is_err());
        assert!("F:58:FA:A1:26:6B0".parse::<BdAddr>().is_err());
    }
}
