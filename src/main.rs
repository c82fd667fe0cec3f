#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use config::Config;
use envoy_rs::model::{Credentials, Options};
use envoy_rs::{Error, Gateway, MetricKey, MetricSet};
use rocket::{Build, Rocket, State};
use std::sync::Mutex;
use std::time::{Duration, Instant};

mod metrics;

#[derive(Clone, serde::Deserialize)]
pub struct EnvoyConfig {
    host: String,
    username: Option<String>,
    password: Option<String>,
    serial: Option<String>,
    token: Option<String>,
    interval: u64,
    token_refresh_buffer: u64,
    inverters: bool,
    enlighten_url: String,
}

impl EnvoyConfig {
    /// Cloud credentials, when all three parts are configured.
    fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password, &self.serial) {
            (Some(username), Some(password), Some(serial)) => Some(Credentials {
                username: username.to_owned(),
                password: password.to_owned(),
                serial: serial.to_owned(),
            }),
            _ => None,
        }
    }

    fn options(&self) -> Options {
        Options {
            token: self.token.clone().filter(|token| !token.is_empty()),
            token_refresh_buffer: Duration::from_secs(self.token_refresh_buffer),
            enlighten_url: self.enlighten_url.to_owned(),
        }
    }
}

/// Structure containing state for API handlers.
pub struct StateData {
    gateway: tokio::sync::Mutex<Gateway>,
    metrics: MetricSet,
    interval: u64,
    /// Timestamp of last successful metric collection via `metrics::collect()`
    timestamp: Mutex<Option<Instant>>,
}

impl StateData {
    /// Updates `timestamp` to `now()`.
    fn touch(&self) {
        if let Ok(mut ts) = self.timestamp.lock() {
            *ts = Some(Instant::now());
        } else {
            log::trace!("Unable to lock timestamp mutex, will refresh again")
        }
    }

    /// Checks whether `interval_seconds` elapsed since last `touch()`
    fn interval_elapsed(&self, interval_secs: u64) -> bool {
        let elapsed_opt = self
            .timestamp
            .lock()
            .ok()
            .and_then(|a| a.map(|b| b.elapsed().as_secs()));

        match elapsed_opt {
            Some(elapsed) => elapsed > interval_secs,
            /* never collected yet */
            None => true,
        }
    }
}

pub fn read_settings() -> Result<EnvoyConfig, config::ConfigError> {
    let mut settings = Config::default();
    settings
        .set_default("interval", 60_i64)?
        .set_default("token_refresh_buffer", 0_i64)?
        .set_default("inverters", true)?
        .set_default("enlighten_url", "https://enlighten.enphaseenergy.com")?
        .merge(config::Environment::with_prefix("ENVOY"))?;

    settings.try_into()
}

#[get("/metrics")]
async fn metrics_route(state: &State<StateData>) -> Result<String, Error> {
    if state.interval_elapsed(state.interval) {
        let mut gateway = state.gateway.lock().await;
        metrics::collect(&mut gateway, &state.metrics).await?;
        state.touch();
    } else {
        log::info!("interval time not yet elapsed since last run; returning cached result")
    }
    metrics::read()
}

#[put("/production-power/<enabled>")]
async fn production_power_route(state: &State<StateData>, enabled: bool) -> Result<String, Error> {
    let mut gateway = state.gateway.lock().await;
    gateway.set_production_power(enabled).await?;
    log::info!("Production power set to {}", enabled);

    Ok(format!("production power: {}\n", if enabled { "on" } else { "off" }))
}

#[launch]
fn rocket() -> Rocket<Build> {
    env_logger::init();

    let settings = read_settings().expect("Configuration error");
    let credentials = settings.credentials();
    if credentials.is_none() && settings.token.is_none() {
        log::warn!("No credentials or token configured; talking to the gateway unauthenticated");
    }

    let gateway = envoy_rs::configure(&settings.host, credentials, settings.options())
        .expect("Unable to set up gateway client");
    let keys: Vec<MetricKey> = MetricKey::all()
        .into_iter()
        .filter(|key| settings.inverters || *key != MetricKey::Inverters)
        .collect();

    let state = StateData {
        gateway: tokio::sync::Mutex::new(gateway),
        metrics: MetricSet::new(&keys),
        interval: settings.interval,
        timestamp: Mutex::new(None),
    };

    rocket::build()
        .manage(state)
        .mount("/", routes![metrics_route, production_power_route])
}
