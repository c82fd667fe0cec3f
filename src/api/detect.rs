use super::endpoint::Endpoint;
use super::{Error, Gateway};
use crate::model::Capability;
use http::StatusCode;
use serde_json::Value;

pub const PRODUCTION_AND_CONSUMPTION: [Endpoint; 3] = [
    Endpoint::ProductionJson,
    Endpoint::EnsembleInventory,
    Endpoint::HomeJson,
];

pub const INSTALLER: [Endpoint; 2] = [Endpoint::DevStatus, Endpoint::ProductionPower];

fn has_production_and_consumption(json: &Value) -> bool {
    json.get("production").is_some() && json.get("consumption").is_some()
}

/// Metering is set up when the second production entry (the meter) has
/// active devices.
fn has_metering_setup(json: &Value) -> bool {
    json.pointer("/production/1/activeCount")
        .and_then(Value::as_f64)
        .map_or(false, |count| count > 0.0)
}

impl Gateway {
    /// Probe `endpoint` during detection. Transport failures only mean the
    /// endpoint is unusable; authentication failures abort.
    async fn probe(&mut self, endpoint: Endpoint) -> Result<(), Error> {
        match self.update_endpoint(endpoint).await {
            Err(Error::Transport(e)) => {
                log::debug!("Probe of {} failed: {}", endpoint, e);
                Ok(())
            }
            result => result,
        }
    }

    /// Determine what the gateway can report and fill the cache on the way.
    /// Starts from a clean state, so running it again on an unchanged
    /// gateway yields the same result.
    pub async fn detect_model(&mut self) -> Result<Capability, Error> {
        self.readings.capability = Capability::Undetected;
        self.readings.cache.clear();
        self.installer_access = false;

        for &endpoint in PRODUCTION_AND_CONSUMPTION.iter() {
            self.probe(endpoint).await?;
        }

        let production = self.readings.cache.get(Endpoint::ProductionJson);
        if production.map_or(false, |r| r.status == StatusCode::UNAUTHORIZED) {
            return Err(Error::Detection(String::from(
                "gateway requires secure communication; configure cloud credentials",
            )));
        }

        let production = production
            .filter(|r| r.is_ok())
            .and_then(|r| r.json())
            .filter(has_production_and_consumption);

        let capability = match production {
            Some(json) => {
                let metering_enabled = has_metering_setup(&json);
                if !metering_enabled {
                    self.probe(Endpoint::ProductionV1).await?;
                }
                Capability::ProductionAndConsumption { metering_enabled }
            }
            None => {
                self.probe(Endpoint::ProductionV1).await?;
                let production_only = self
                    .readings
                    .cache
                    .get(Endpoint::ProductionV1)
                    .map_or(false, |r| r.is_ok());
                if !production_only {
                    return Err(Error::Detection(format!(
                        "could not determine model; check that the gateway is up at '{}'",
                        self.base_url
                    )));
                }
                Capability::ProductionOnly
            }
        };
        log::info!("Detected gateway model: {:?}", capability);
        self.readings.capability = capability;

        for &endpoint in INSTALLER.iter() {
            if let Err(e) = self.update_endpoint(endpoint).await {
                log::debug!("No installer access to {}: {}", endpoint, e);
            }
        }
        self.installer_access = self.readings.cache.contains(Endpoint::ProductionPower);
        if self.installer_access {
            log::info!("Installer endpoints available");
        }

        Ok(capability)
    }
}
