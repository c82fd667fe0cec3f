use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

type Volts = f64;
type Amps = f64;
type Watts = f64;

pub type Serial = String;

const ENLIGHTEN_URL: &str = "https://enlighten.enphaseenergy.com";

/// Cloud account used to obtain a device token for a gateway.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Serial number of the gateway the token is scoped to.
    pub serial: String,
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Previously obtained long-lived token, if the caller kept one.
    pub token: Option<String>,
    /// Tokens are renewed this long before their `exp` claim.
    pub token_refresh_buffer: Duration,
    pub enlighten_url: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            token: None,
            token_refresh_buffer: Duration::from_secs(0),
            enlighten_url: ENLIGHTEN_URL.to_string(),
        }
    }
}

/// Device variant as determined by `detect_model`. Only the state where
/// metering is meaningful carries the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Undetected,
    ProductionOnly,
    ProductionAndConsumption { metering_enabled: bool },
}

impl Capability {
    pub fn has_consumption(&self) -> bool {
        matches!(self, Capability::ProductionAndConsumption { .. })
    }

    pub fn metering_enabled(&self) -> bool {
        matches!(
            self,
            Capability::ProductionAndConsumption {
                metering_enabled: true
            }
        )
    }

    /// Whether the production-only endpoint backs the energy totals.
    pub fn uses_production_v1(&self) -> bool {
        matches!(
            self,
            Capability::ProductionOnly
                | Capability::ProductionAndConsumption {
                    metering_enabled: false
                }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::L1, Phase::L2, Phase::L3];

    /// Position of the phase in the gateway's `lines` array.
    pub fn index(self) -> usize {
        match self {
            Phase::L1 => 0,
            Phase::L2 => 1,
            Phase::L3 => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::L1 => "l1",
            Phase::L2 => "l2",
            Phase::L3 => "l3",
        }
    }
}

/// A metric value, or the reason it does not apply to this gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    Available(T),
    NotAvailable(&'static str),
}

impl<T> Reading<T> {
    pub fn available(self) -> Option<T> {
        match self {
            Reading::Available(v) => Some(v),
            Reading::NotAvailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InverterProduction {
    pub watts: i64,
    pub report_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InverterStatus {
    pub communicating: Option<bool>,
    pub producing: Option<bool>,
    pub report_date: Option<DateTime<Utc>>,
    pub temperature: Option<i64>,
    pub dc_voltage: Option<Volts>,
    pub dc_current: Option<Amps>,
    pub ac_voltage: Option<Volts>,
    pub ac_power: Option<Watts>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayStatus {
    pub communicating: Option<bool>,
    pub report_date: Option<DateTime<Utc>>,
    /// `"closed"` or `"open"`.
    pub relay: Option<String>,
    pub forced: Option<bool>,
    pub reason_code: Option<i64>,
    pub reason: Option<String>,
}

impl RelayStatus {
    pub fn is_closed(&self) -> Option<bool> {
        self.relay.as_deref().map(|r| r == "closed")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatteryStorage {
    /// AC batteries reported inline in the production document.
    Storage(Map<String, Value>),
    /// Batteries listed by the ensemble inventory.
    Ensemble(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Firmware {
    pub update_status: String,
    pub software_build_epoch: i64,
}

impl Firmware {
    pub fn update_pending(&self) -> bool {
        self.update_status != "satisfied"
    }
}

pub type Inverters = BTreeMap<Serial, InverterProduction>;
pub type InverterStatuses = BTreeMap<Serial, InverterStatus>;
pub type Relays = BTreeMap<Serial, RelayStatus>;
