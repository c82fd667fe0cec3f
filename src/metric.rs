use crate::api::Error;
use crate::extract::Readings;
use crate::model::*;
use std::fmt;
use std::str::FromStr;

/// Every value the gateway can report, keyed the way consumers select them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    Production,
    DailyProduction,
    SevenDaysProduction,
    LifetimeProduction,
    Consumption,
    DailyConsumption,
    SevenDaysConsumption,
    LifetimeConsumption,
    ProductionPhase(Phase),
    DailyProductionPhase(Phase),
    LifetimeProductionPhase(Phase),
    ConsumptionPhase(Phase),
    DailyConsumptionPhase(Phase),
    LifetimeConsumptionPhase(Phase),
    Inverters,
    InvertersStatus,
    Relays,
    BatteryStorage,
    GridStatus,
    ProductionPower,
    Firmware,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Integer(i64),
    Text(String),
    Flag(bool),
    Battery(BatteryStorage),
    Inverters(Inverters),
    InvertersStatus(InverterStatuses),
    Relays(Relays),
    Firmware(Firmware),
    NotAvailable(&'static str),
    /// Not reported by this gateway or missing from the last cycle.
    Absent,
}

impl From<Reading<i64>> for MetricValue {
    fn from(reading: Reading<i64>) -> Self {
        match reading {
            Reading::Available(v) => MetricValue::Integer(v),
            Reading::NotAvailable(reason) => MetricValue::NotAvailable(reason),
        }
    }
}

impl From<Option<i64>> for MetricValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(MetricValue::Absent, MetricValue::Integer)
    }
}

fn absent_or<T>(value: Option<T>, f: impl FnOnce(T) -> MetricValue) -> MetricValue {
    value.map_or(MetricValue::Absent, f)
}

fn reading_or<T>(reading: Reading<T>, f: impl FnOnce(T) -> MetricValue) -> MetricValue {
    match reading {
        Reading::Available(v) => f(v),
        Reading::NotAvailable(reason) => MetricValue::NotAvailable(reason),
    }
}

pub type Extractor = Box<dyn Fn(&Readings) -> Result<MetricValue, Error> + Send + Sync>;

fn boxed<F>(f: F) -> Extractor
where
    F: Fn(&Readings) -> Result<MetricValue, Error> + Send + Sync + 'static,
{
    Box::new(f)
}

impl MetricKey {
    pub fn all() -> Vec<MetricKey> {
        let mut keys = vec![
            MetricKey::Production,
            MetricKey::DailyProduction,
            MetricKey::SevenDaysProduction,
            MetricKey::LifetimeProduction,
            MetricKey::Consumption,
            MetricKey::DailyConsumption,
            MetricKey::SevenDaysConsumption,
            MetricKey::LifetimeConsumption,
            MetricKey::Inverters,
            MetricKey::InvertersStatus,
            MetricKey::Relays,
            MetricKey::BatteryStorage,
            MetricKey::GridStatus,
            MetricKey::ProductionPower,
            MetricKey::Firmware,
        ];
        for &phase in Phase::ALL.iter() {
            keys.push(MetricKey::ProductionPhase(phase));
            keys.push(MetricKey::DailyProductionPhase(phase));
            keys.push(MetricKey::LifetimeProductionPhase(phase));
            keys.push(MetricKey::ConsumptionPhase(phase));
            keys.push(MetricKey::DailyConsumptionPhase(phase));
            keys.push(MetricKey::LifetimeConsumptionPhase(phase));
        }
        keys
    }

    fn base_name(self) -> &'static str {
        match self {
            MetricKey::Production | MetricKey::ProductionPhase(_) => "production",
            MetricKey::DailyProduction | MetricKey::DailyProductionPhase(_) => "daily_production",
            MetricKey::SevenDaysProduction => "seven_days_production",
            MetricKey::LifetimeProduction | MetricKey::LifetimeProductionPhase(_) => {
                "lifetime_production"
            }
            MetricKey::Consumption | MetricKey::ConsumptionPhase(_) => "consumption",
            MetricKey::DailyConsumption | MetricKey::DailyConsumptionPhase(_) => {
                "daily_consumption"
            }
            MetricKey::SevenDaysConsumption => "seven_days_consumption",
            MetricKey::LifetimeConsumption | MetricKey::LifetimeConsumptionPhase(_) => {
                "lifetime_consumption"
            }
            MetricKey::Inverters => "inverters",
            MetricKey::InvertersStatus => "inverters_status",
            MetricKey::Relays => "relays",
            MetricKey::BatteryStorage => "battery_storage",
            MetricKey::GridStatus => "grid_status",
            MetricKey::ProductionPower => "production_power",
            MetricKey::Firmware => "firmware",
        }
    }

    pub fn phase(self) -> Option<Phase> {
        match self {
            MetricKey::ProductionPhase(phase)
            | MetricKey::DailyProductionPhase(phase)
            | MetricKey::LifetimeProductionPhase(phase)
            | MetricKey::ConsumptionPhase(phase)
            | MetricKey::DailyConsumptionPhase(phase)
            | MetricKey::LifetimeConsumptionPhase(phase) => Some(phase),
            _ => None,
        }
    }

    /// Function computing this metric from a cycle's readings.
    pub fn extractor(self) -> Extractor {
        match self {
            MetricKey::Production => {
                boxed(|r| r.production().map(MetricValue::Integer))
            }
            MetricKey::DailyProduction => {
                boxed(|r| r.daily_production().map(MetricValue::Integer))
            }
            MetricKey::SevenDaysProduction => {
                boxed(|r| r.seven_days_production().map(MetricValue::Integer))
            }
            MetricKey::LifetimeProduction => {
                boxed(|r| r.lifetime_production().map(MetricValue::Integer))
            }
            MetricKey::Consumption => boxed(|r| r.consumption().map(MetricValue::from)),
            MetricKey::DailyConsumption => {
                boxed(|r| r.daily_consumption().map(MetricValue::from))
            }
            MetricKey::SevenDaysConsumption => {
                boxed(|r| r.seven_days_consumption().map(MetricValue::from))
            }
            MetricKey::LifetimeConsumption => {
                boxed(|r| r.lifetime_consumption().map(MetricValue::from))
            }
            MetricKey::ProductionPhase(phase) => {
                boxed(move |r| Ok(r.production_phase(phase).into()))
            }
            MetricKey::DailyProductionPhase(phase) => {
                boxed(move |r| Ok(r.daily_production_phase(phase).into()))
            }
            MetricKey::LifetimeProductionPhase(phase) => {
                boxed(move |r| Ok(r.lifetime_production_phase(phase).into()))
            }
            MetricKey::ConsumptionPhase(phase) => {
                boxed(move |r| Ok(r.consumption_phase(phase).into()))
            }
            MetricKey::DailyConsumptionPhase(phase) => {
                boxed(move |r| Ok(r.daily_consumption_phase(phase).into()))
            }
            MetricKey::LifetimeConsumptionPhase(phase) => {
                boxed(move |r| Ok(r.lifetime_consumption_phase(phase).into()))
            }
            MetricKey::Inverters => boxed(|r| {
                Ok(absent_or(r.inverters_production(), MetricValue::Inverters))
            }),
            MetricKey::InvertersStatus => boxed(|r| {
                Ok(absent_or(r.inverters_status(), MetricValue::InvertersStatus))
            }),
            MetricKey::Relays => {
                boxed(|r| Ok(absent_or(r.relay_status(), MetricValue::Relays)))
            }
            MetricKey::BatteryStorage => boxed(|r| {
                Ok(reading_or(r.battery_storage(), MetricValue::Battery))
            }),
            MetricKey::GridStatus => {
                boxed(|r| Ok(reading_or(r.grid_status(), MetricValue::Text)))
            }
            MetricKey::ProductionPower => boxed(|r| {
                Ok(reading_or(r.production_power(), MetricValue::Flag))
            }),
            MetricKey::Firmware => {
                boxed(|r| Ok(absent_or(r.firmware(), MetricValue::Firmware)))
            }
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase() {
            Some(phase) => write!(f, "{}_{}", self.base_name(), phase.label()),
            None => f.write_str(self.base_name()),
        }
    }
}

impl FromStr for MetricKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        MetricKey::all()
            .into_iter()
            .find(|k| k.to_string() == key)
            .ok_or_else(|| Error::Internal(format!("unknown metric key '{}'", s)))
    }
}

/// Selected metrics with their extractors resolved up front.
pub struct MetricSet {
    extractors: Vec<(MetricKey, Extractor)>,
}

impl fmt::Debug for MetricSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.extractors.iter().map(|(key, _)| key))
            .finish()
    }
}

impl MetricSet {
    pub fn new(keys: &[MetricKey]) -> MetricSet {
        MetricSet {
            extractors: keys.iter().map(|&key| (key, key.extractor())).collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = MetricKey> + '_ {
        self.extractors.iter().map(|(key, _)| *key)
    }

    /// Whether any selected metric needs the per-inverter endpoint.
    pub fn wants_inverters(&self) -> bool {
        self.keys().any(|key| key == MetricKey::Inverters)
    }

    /// Evaluate every selected metric. A failing extractor is logged and
    /// reported as absent so the others still come through.
    pub fn collect(&self, readings: &Readings) -> Vec<(MetricKey, MetricValue)> {
        self.extractors
            .iter()
            .map(|(key, extract)| {
                let value = extract(readings).unwrap_or_else(|e| {
                    log::warn!("Could not extract {}: {}", key, e);
                    MetricValue::Absent
                });
                (*key, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::cache::EndpointCache;
    use crate::api::endpoint::Endpoint;
    use crate::api::transport::RawResponse;
    use http::StatusCode;
    use serde_json::json;

    fn production_only(body: serde_json::Value) -> Readings {
        let mut cache = EndpointCache::new();
        cache.insert(
            Endpoint::ProductionV1,
            RawResponse {
                status: StatusCode::OK,
                body: body.to_string(),
                cookies: vec![],
            },
        );
        Readings::new(Capability::ProductionOnly, cache)
    }

    #[test]
    fn keys_have_stable_names() {
        assert_eq!("seven_days_production", MetricKey::SevenDaysProduction.to_string());
        assert_eq!(
            "lifetime_consumption_l3",
            MetricKey::LifetimeConsumptionPhase(Phase::L3).to_string()
        );
        assert_eq!(
            MetricKey::DailyProductionPhase(Phase::L2),
            "daily_production_l2".parse().unwrap()
        );
        assert!("voltage".parse::<MetricKey>().is_err());
        assert_eq!(33, MetricKey::all().len());
    }

    #[test]
    fn collect_reports_each_selected_metric() {
        let set = MetricSet::new(&[
            MetricKey::Production,
            MetricKey::Consumption,
            MetricKey::ProductionPhase(Phase::L1),
            MetricKey::DailyProduction,
        ]);
        let values = set.collect(&production_only(json!({"wattsNow": 300})));

        assert_eq!(
            vec![
                (MetricKey::Production, MetricValue::Integer(300)),
                (
                    MetricKey::Consumption,
                    MetricValue::NotAvailable(crate::extract::CONSUMPTION_NOT_AVAILABLE)
                ),
                (MetricKey::ProductionPhase(Phase::L1), MetricValue::Absent),
                (MetricKey::DailyProduction, MetricValue::Absent),
            ],
            values
        );
        assert!(!set.wants_inverters());
        assert!(MetricSet::new(&MetricKey::all()).wants_inverters());
    }
}
