use crate::api::cache::EndpointCache;
use crate::api::endpoint::Endpoint;
use crate::api::response::device_type::PcuDeviceType;
use crate::api::response::table::{DevStatus, Row};
use crate::api::response::{truthy, Home, Inverter};
use crate::api::Error;
use crate::model::*;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

pub const BATTERY_NOT_AVAILABLE: &str = "Battery storage data not available for your Envoy device.";
pub const CONSUMPTION_NOT_AVAILABLE: &str = "Consumption data not available for your Envoy device.";
pub const GRID_STATUS_NOT_AVAILABLE: &str = "Grid status not available for your Envoy device.";
pub const PRODUCTION_POWER_NOT_AVAILABLE: &str =
    "Production power status not available for your Envoy device.";

/// Detected capability plus the payloads of the last cycle. Everything the
/// extractors report is derived from this snapshot without further I/O.
#[derive(Debug, Clone)]
pub struct Readings {
    pub capability: Capability,
    pub cache: EndpointCache,
}

impl Default for Readings {
    fn default() -> Self {
        Readings {
            capability: Capability::Undetected,
            cache: EndpointCache::new(),
        }
    }
}

/// Gateway milli-units (mV, mA, mW) to base units.
pub fn from_milli(raw: i64) -> f64 {
    raw as f64 / 1000.0
}

fn milli(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .map(|raw| from_milli(raw as i64))
}

fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

fn integer(json: &Value, pointer: &str) -> Option<i64> {
    json.pointer(pointer)
        .and_then(Value::as_f64)
        .map(|value| value as i64)
}

fn is_relay(row: &Row) -> bool {
    row.get("devType")
        .map_or(false, |dev_type| PcuDeviceType::from_value(dev_type).is_relay())
}

impl Readings {
    pub fn new(capability: Capability, cache: EndpointCache) -> Readings {
        Readings { capability, cache }
    }

    fn document(&self, endpoint: Endpoint) -> Result<Value, Error> {
        self.cache
            .json(endpoint)
            .ok_or_else(|| Error::MissingData(format!("no {} document", endpoint)))
    }

    fn required(&self, endpoint: Endpoint, pointer: &str) -> Result<i64, Error> {
        integer(&self.document(endpoint)?, pointer)
            .ok_or_else(|| Error::MissingData(format!("{} has no {}", endpoint, pointer)))
    }

    fn undetected() -> Error {
        Error::MissingData(String::from("gateway model not detected"))
    }

    /// Index of the production entry that reports power: the meter when
    /// metering is set up, the inverters otherwise.
    fn production_index(metering_enabled: bool) -> usize {
        if metering_enabled {
            1
        } else {
            0
        }
    }

    /// Current production in W.
    pub fn production(&self) -> Result<i64, Error> {
        match self.capability {
            Capability::ProductionAndConsumption { metering_enabled } => self.required(
                Endpoint::ProductionJson,
                &format!(
                    "/production/{}/wNow",
                    Readings::production_index(metering_enabled)
                ),
            ),
            Capability::ProductionOnly => self.required(Endpoint::ProductionV1, "/wattsNow"),
            Capability::Undetected => Err(Readings::undetected()),
        }
    }

    /// Energy counter from the meter when there is one, from the
    /// production-only endpoint otherwise.
    fn production_energy(&self, meter_key: &str, v1_key: &str) -> Result<i64, Error> {
        if self.capability.metering_enabled() {
            self.required(
                Endpoint::ProductionJson,
                &format!("/production/1/{}", meter_key),
            )
        } else if self.capability.uses_production_v1() {
            self.required(Endpoint::ProductionV1, &format!("/{}", v1_key))
        } else {
            Err(Readings::undetected())
        }
    }

    pub fn daily_production(&self) -> Result<i64, Error> {
        self.production_energy("whToday", "wattHoursToday")
    }

    pub fn seven_days_production(&self) -> Result<i64, Error> {
        self.production_energy("whLastSevenDays", "wattHoursSevenDays")
    }

    pub fn lifetime_production(&self) -> Result<i64, Error> {
        self.production_energy("whLifetime", "wattHoursLifetime")
    }

    fn consumption_value(&self, key: &str) -> Result<Reading<i64>, Error> {
        if !self.capability.has_consumption() {
            return Ok(Reading::NotAvailable(CONSUMPTION_NOT_AVAILABLE));
        }
        self.required(
            Endpoint::ProductionJson,
            &format!("/consumption/0/{}", key),
        )
        .map(Reading::Available)
    }

    /// Current consumption in W.
    pub fn consumption(&self) -> Result<Reading<i64>, Error> {
        self.consumption_value("wNow")
    }

    pub fn daily_consumption(&self) -> Result<Reading<i64>, Error> {
        self.consumption_value("whToday")
    }

    pub fn seven_days_consumption(&self) -> Result<Reading<i64>, Error> {
        self.consumption_value("whLastSevenDays")
    }

    pub fn lifetime_consumption(&self) -> Result<Reading<i64>, Error> {
        self.consumption_value("whLifetime")
    }

    fn line(&self, section: &str, index: usize, phase: Phase, key: &str) -> Option<i64> {
        let json = self.cache.json(Endpoint::ProductionJson)?;
        integer(
            &json,
            &format!("/{}/{}/lines/{}/{}", section, index, phase.index(), key),
        )
    }

    /// Per-phase production in W.
    pub fn production_phase(&self, phase: Phase) -> Option<i64> {
        match self.capability {
            Capability::ProductionAndConsumption { metering_enabled } => self.line(
                "production",
                Readings::production_index(metering_enabled),
                phase,
                "wNow",
            ),
            _ => None,
        }
    }

    pub fn daily_production_phase(&self, phase: Phase) -> Option<i64> {
        if !self.capability.metering_enabled() {
            return None;
        }
        self.line("production", 1, phase, "whToday")
    }

    pub fn lifetime_production_phase(&self, phase: Phase) -> Option<i64> {
        if !self.capability.metering_enabled() {
            return None;
        }
        self.line("production", 1, phase, "whLifetime")
    }

    fn consumption_line(&self, phase: Phase, key: &str) -> Option<i64> {
        if !self.capability.has_consumption() {
            return None;
        }
        self.line("consumption", 0, phase, key)
    }

    pub fn consumption_phase(&self, phase: Phase) -> Option<i64> {
        self.consumption_line(phase, "wNow")
    }

    pub fn daily_consumption_phase(&self, phase: Phase) -> Option<i64> {
        self.consumption_line(phase, "whToday")
    }

    pub fn lifetime_consumption_phase(&self, phase: Phase) -> Option<i64> {
        self.consumption_line(phase, "whLifetime")
    }

    /// Last reported production per inverter serial.
    pub fn inverters_production(&self) -> Option<Inverters> {
        let json = self.cache.json(Endpoint::ProductionInverters)?;
        let inverters: Vec<Inverter> = match serde_json::from_value(json) {
            Ok(inverters) => inverters,
            Err(e) => {
                log::debug!("Unexpected inverter document: {}", e);
                return None;
            }
        };

        Some(
            inverters
                .into_iter()
                .map(|inverter| {
                    (
                        inverter.serial_number,
                        InverterProduction {
                            watts: inverter.last_report_watts as i64,
                            report_date: timestamp(inverter.last_report_date),
                        },
                    )
                })
                .collect(),
        )
    }

    fn dev_status(&self) -> Option<DevStatus> {
        let json = self.cache.json(Endpoint::DevStatus)?;
        serde_json::from_value(json)
            .map_err(|e| log::debug!("Unexpected device status document: {}", e))
            .ok()
    }

    /// Status of every inverter in the installer device table. Relays share
    /// the table and are left out.
    pub fn inverters_status(&self) -> Option<InverterStatuses> {
        let status = self.dev_status()?;
        let pcu = &status.pcu;
        if !pcu.is_well_formed() {
            return None;
        }

        let mut inverters = BTreeMap::new();
        if !pcu.has_field("serialNumber") {
            return Some(inverters);
        }

        for row in pcu.rows().filter(|row| !is_relay(row)) {
            let serial = match row.serial() {
                Some(serial) => serial,
                None => continue,
            };
            inverters.insert(
                serial,
                InverterStatus {
                    communicating: row.get("communicating").and_then(truthy),
                    producing: row.get("producing").and_then(truthy),
                    report_date: row
                        .get("reportDate")
                        .and_then(Value::as_i64)
                        .and_then(timestamp),
                    temperature: row.get("temperature").and_then(Value::as_i64),
                    dc_voltage: milli(row.get("dcVoltageINmV")),
                    dc_current: milli(row.get("dcCurrentINmA")),
                    ac_voltage: milli(row.get("acVoltageINmV")),
                    ac_power: milli(row.get("acPowerINmW")),
                },
            );
        }
        Some(inverters)
    }

    /// Relay state merged from the pcu rows (communication) and the nsrb
    /// table (switch state). An nsrb row replaces what the pcu row gave.
    pub fn relay_status(&self) -> Option<Relays> {
        let status = self.dev_status()?;
        let pcu = &status.pcu;
        let nsrb = status.nsrb.as_ref()?;
        if !pcu.is_well_formed() || !nsrb.is_well_formed() {
            return None;
        }

        let mut relays: Relays = BTreeMap::new();

        if pcu.has_field("serialNumber") {
            for row in pcu.rows().filter(is_relay) {
                if let Some(serial) = row.serial() {
                    let relay = relays.entry(serial).or_default();
                    relay.communicating = row.get("communicating").and_then(truthy);
                    relay.report_date = row
                        .get("reportDate")
                        .and_then(Value::as_i64)
                        .and_then(timestamp);
                }
            }
        }

        if nsrb.has_field("serialNumber") {
            for row in nsrb.rows() {
                if let Some(serial) = row.serial() {
                    relays.insert(
                        serial,
                        RelayStatus {
                            relay: row.get("relay").and_then(Value::as_str).map(String::from),
                            forced: row.get("forced").and_then(truthy),
                            reason_code: row.get("reason_code").and_then(Value::as_i64),
                            reason: row.get("reason").and_then(Value::as_str).map(String::from),
                            ..RelayStatus::default()
                        },
                    );
                }
            }
        }

        Some(relays)
    }

    /// Inline AC battery data when present, the ensemble inventory otherwise.
    pub fn battery_storage(&self) -> Reading<BatteryStorage> {
        let production = match self.cache.json(Endpoint::ProductionJson) {
            Some(json) => json,
            None => return Reading::NotAvailable(BATTERY_NOT_AVAILABLE),
        };

        if let Some(Value::Object(storage)) = production.pointer("/storage/0") {
            if storage.contains_key("percentFull") {
                return Reading::Available(BatteryStorage::Storage(storage.clone()));
            }
        }

        self.cache
            .json(Endpoint::EnsembleInventory)
            .and_then(|ensemble| ensemble.pointer("/0/devices").cloned())
            .and_then(|devices| match devices {
                Value::Array(devices) => Some(devices),
                _ => None,
            })
            .map_or(Reading::NotAvailable(BATTERY_NOT_AVAILABLE), |devices| {
                Reading::Available(BatteryStorage::Ensemble(devices))
            })
    }

    fn home(&self) -> Option<Home> {
        serde_json::from_value(self.cache.json(Endpoint::HomeJson)?).ok()
    }

    pub fn grid_status(&self) -> Reading<String> {
        self.home()
            .and_then(|home| home.enpower)
            .and_then(|enpower| enpower.grid_status)
            .map_or(Reading::NotAvailable(GRID_STATUS_NOT_AVAILABLE), Reading::Available)
    }

    /// Whether the gateway lets the inverters produce.
    pub fn production_power(&self) -> Reading<bool> {
        self.cache
            .json(Endpoint::ProductionPower)
            .and_then(|json| json.get("powerForcedOff").and_then(truthy))
            .map_or(
                Reading::NotAvailable(PRODUCTION_POWER_NOT_AVAILABLE),
                |forced_off| Reading::Available(!forced_off),
            )
    }

    pub fn firmware(&self) -> Option<Firmware> {
        let home = self.home()?;
        Some(Firmware {
            update_status: home.update_status?,
            software_build_epoch: home.software_build_epoch?,
        })
    }
}
