use bytes::Bytes;

use crate::error::{BridgeError, Result};

/// Source of the station identity reported in the `{WA_detection}` reply.
pub trait NetworkIdentity: Send + Sync {
    /// SSID of the associated access point, if any.
    fn station_ssid(&self) -> Option<String>;

    /// Station MAC address.
    fn station_mac(&self) -> [u8; 6];
}

/// Fixed identity supplied at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    ssid: Option<String>,
    mac: [u8; 6],
}

impl StaticIdentity {
    pub fn new(ssid: Option<String>, mac: [u8; 6]) -> Self {
        Self {
            ssid: ssid.filter(|s| !s.is_empty()),
            mac,
        }
    }

    /// Parse `AA:BB:CC:DD:EE:FF`, `AA-BB-..`, or 12 bare hex digits.
    pub fn parse_mac(text: &str) -> Result<[u8; 6]> {
        let digits: String = text
            .chars()
            .filter(|c| !matches!(c, ':' | '-'))
            .collect();
        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BridgeError::InvalidMac(text.to_string()));
        }

        let mut mac = [0u8; 6];
        for (i, byte) in mac.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| BridgeError::InvalidMac(text.to_string()))?;
        }
        Ok(mac)
    }
}

impl NetworkIdentity for StaticIdentity {
    fn station_ssid(&self) -> Option<String> {
        self.ssid.clone()
    }

    fn station_mac(&self) -> [u8; 6] {
        self.mac
    }
}

/// Compose the `{WA_detection}` reply: `{<ssid>}` when associated,
/// otherwise `{RobotSetup-<MAC>}` with the MAC as 12 uppercase hex digits.
pub fn wa_reply(identity: &dyn NetworkIdentity) -> Bytes {
    let text = match identity.station_ssid() {
        Some(ssid) if !ssid.is_empty() => format!("{{{ssid}}}"),
        _ => {
            let hex: String = identity
                .station_mac()
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect();
            format!("{{RobotSetup-{hex}}}")
        }
    };
    Bytes::from(text)
}
