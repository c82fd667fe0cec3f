use num_derive::FromPrimitive;
use serde_json::Value;

/// `devType` code reported for each pcu row of the device status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[num_traits = "num"]
pub enum PcuDeviceType {
    Unknown = 0,
    Microinverter = 1,
    Relay = 12,
}

impl PcuDeviceType {
    pub fn from_value(value: &Value) -> PcuDeviceType {
        value
            .as_u64()
            .and_then(num::FromPrimitive::from_u64)
            .unwrap_or(PcuDeviceType::Unknown)
    }

    pub fn is_relay(self) -> bool {
        self == PcuDeviceType::Relay
    }
}
