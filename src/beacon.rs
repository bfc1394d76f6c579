use std::collections::HashMap;
use std::fmt;

use mac_address::MacAddress;
use serde_derive::{Deserialize, Serialize};
use uuid::Uuid;

/// https://bitbucket.org/bluetooth-SIG/public/src/main/assigned_numbers/company_identifiers/company_identifiers.yaml
pub const APPLE_COMPANY_ID: u16 = 0x004C;

const IBEACON_TYPE: u8 = 0x02;
const IBEACON_LENGTH: u8 = 0x15;
const IBEACON_PAYLOAD_LEN: usize = 23;

/// A beacon as reported by the ranging service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Beacon {
    pub address: MacAddress,
    pub name: Option<String>,
    pub proximity_uuid: Uuid,
    pub major: u16,
    pub minor: u16,
    /// Calibrated RSSI at one metre, as advertised.
    pub measured_power: i8,
    pub rssi: Option<i16>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    Unknown,
    Immediate,
    Near,
    Far,
}

impl Beacon {
    /// Decode an iBeacon frame from the manufacturer data of an advertisement.
    pub fn from_advertisement(
        address: MacAddress,
        name: Option<String>,
        manufacturer_data: &HashMap<u16, Vec<u8>>,
        rssi: Option<i16>,
    ) -> Option<Self> {
        let data = manufacturer_data.get(&APPLE_COMPANY_ID)?;
        if data.len() < IBEACON_PAYLOAD_LEN || data[0] != IBEACON_TYPE || data[1] != IBEACON_LENGTH
        {
            return None;
        }

        let proximity_uuid = Uuid::from_slice(&data[2..18]).ok()?;
        Some(Beacon {
            address,
            name,
            proximity_uuid,
            major: u16::from_be_bytes([data[18], data[19]]),
            minor: u16::from_be_bytes([data[20], data[21]]),
            measured_power: data[22] as i8,
            rssi,
        })
    }

    /// Estimated distance in metres, or `None` without a usable signal reading.
    pub fn accuracy(&self) -> Option<f64> {
        let rssi = self.rssi?;
        if rssi == 0 || self.measured_power == 0 {
            return None;
        }

        let ratio = f64::from(rssi) / f64::from(self.measured_power);
        let correction = 0.96 + (f64::from(rssi).abs().powi(3) % 10.0) / 150.0;
        let distance = if ratio <= 1.0 {
            ratio.powf(9.98) * correction
        } else {
            (0.103 + 0.89978 * ratio.powf(7.71)) * correction
        };
        Some(distance)
    }

    pub fn proximity(&self) -> Proximity {
        match self.accuracy() {
            None => Proximity::Unknown,
            Some(d) if d < 0.0 => Proximity::Unknown,
            Some(d) if d < 0.5 => Proximity::Immediate,
            Some(d) if d <= 3.0 => Proximity::Near,
            Some(_) => Proximity::Far,
        }
    }
}

impl fmt::Display for Beacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} major={} minor={} power={}",
            self.address, self.proximity_uuid, self.major, self.minor, self.measured_power
        )?;
        if let Some(rssi) = self.rssi {
            write!(f, " rssi={rssi}")?;
        }
        if let Some(distance) = self.accuracy() {
            write!(f, " ({distance:.2}m {:?})", self.proximity())?;
        }
        if let Some(name) = &self.name {
            write!(f, " [{name}]")?;
        }
        Ok(())
    }
}

/// Scopes which beacons are reported. `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub identifier: String,
    pub proximity_uuid: Option<Uuid>,
    pub major: Option<u16>,
    pub minor: Option<u16>,
}

impl Default for Region {
    fn default() -> Self {
        Region {
            identifier: "rid".to_string(),
            proximity_uuid: None,
            major: None,
            minor: None,
        }
    }
}

impl Region {
    pub fn matches(&self, beacon: &Beacon) -> bool {
        self.proximity_uuid.is_none_or(|u| u == beacon.proximity_uuid)
            && self.major.is_none_or(|m| m == beacon.major)
            && self.minor.is_none_or(|m| m == beacon.minor)
    }
}
