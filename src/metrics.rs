use envoy_rs::model::{BatteryStorage, InverterStatus, Inverters, InverterStatuses, Relays};
use envoy_rs::{Error, Gateway, MetricKey, MetricSet, MetricValue};
use prometheus::{Encoder, GaugeVec, TextEncoder};

lazy_static! {
    static ref POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("envoy_power_watts", "current power (in W)"),
        &["metric"],
    )
    .unwrap();
    static ref ENERGY_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("envoy_energy_watt_hours", "energy over a period (in Wh)"),
        &["metric"],
    )
    .unwrap();
    static ref PHASE_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("envoy_phase_power_watts", "current power per phase (in W)"),
        &["metric", "phase"],
    )
    .unwrap();
    static ref PHASE_ENERGY_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("envoy_phase_energy_watt_hours", "energy per phase (in Wh)"),
        &["metric", "phase"],
    )
    .unwrap();
    static ref INVERTER_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "envoy_inverter_power_watts",
            "last power production reported by inverter",
        ),
        &["serial"],
    )
    .unwrap();
    static ref INVERTER_STATUS_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "envoy_inverter_status",
            "inverter readings from the installer device status",
        ),
        &["serial", "reading"],
    )
    .unwrap();
    static ref RELAY_CLOSED_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("envoy_relay_closed", "1 if the relay contact is closed"),
        &["serial"],
    )
    .unwrap();
    static ref BATTERY_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("envoy_battery_percent_full", "battery state of charge (in %)"),
        &["serial"],
    )
    .unwrap();
    static ref STATE_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "envoy_state",
            "gateway flags: grid closed, production enabled, firmware update pending",
        ),
        &["state"],
    )
    .unwrap();
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn process_inverters(inverters: &Inverters) {
    for (serial, inverter) in inverters {
        INVERTER_POWER_GAUGE
            .with_label_values(&[serial.as_str()])
            .set(inverter.watts as f64);
    }
}

fn inverter_readings(status: &InverterStatus) -> Vec<(&'static str, Option<f64>)> {
    vec![
        ("communicating", status.communicating.map(flag)),
        ("producing", status.producing.map(flag)),
        ("temperature", status.temperature.map(|t| t as f64)),
        ("dc_voltage", status.dc_voltage),
        ("dc_current", status.dc_current),
        ("ac_voltage", status.ac_voltage),
        ("ac_power", status.ac_power),
    ]
}

fn process_inverters_status(inverters: &InverterStatuses) {
    for (serial, status) in inverters {
        for (reading, value) in inverter_readings(status) {
            if let Some(value) = value {
                INVERTER_STATUS_GAUGE
                    .with_label_values(&[serial.as_str(), reading])
                    .set(value);
            }
        }
    }
}

fn process_relays(relays: &Relays) {
    for (serial, relay) in relays {
        if let Some(closed) = relay.is_closed() {
            RELAY_CLOSED_GAUGE
                .with_label_values(&[serial.as_str()])
                .set(flag(closed));
        }
    }
}

/// Inline AC batteries report one aggregate charge level, ensemble
/// batteries one per device.
fn process_battery(battery: &BatteryStorage) {
    match battery {
        BatteryStorage::Storage(storage) => {
            if let Some(percent) = storage.get("percentFull").and_then(|v| v.as_f64()) {
                BATTERY_GAUGE.with_label_values(&["acb"]).set(percent);
            }
        }
        BatteryStorage::Ensemble(devices) => {
            for device in devices {
                let serial = device.get("serial_num").and_then(|v| v.as_str());
                let percent = device.get("percentFull").and_then(|v| v.as_f64());
                if let (Some(serial), Some(percent)) = (serial, percent) {
                    BATTERY_GAUGE.with_label_values(&[serial]).set(percent);
                }
            }
        }
    }
}

/// Feed one metric value to the matching Prometheus gauge.
fn process_metric(key: MetricKey, value: &MetricValue) {
    let name = key.to_string();

    match (key, value) {
        (MetricKey::Production, MetricValue::Integer(v))
        | (MetricKey::Consumption, MetricValue::Integer(v)) => {
            POWER_GAUGE.with_label_values(&[&name]).set(*v as f64)
        }
        (MetricKey::ProductionPhase(phase), MetricValue::Integer(v))
        | (MetricKey::ConsumptionPhase(phase), MetricValue::Integer(v)) => PHASE_POWER_GAUGE
            .with_label_values(&[&name, phase.label()])
            .set(*v as f64),
        (key, MetricValue::Integer(v)) => match key.phase() {
            Some(phase) => PHASE_ENERGY_GAUGE
                .with_label_values(&[&name, phase.label()])
                .set(*v as f64),
            None => ENERGY_GAUGE.with_label_values(&[&name]).set(*v as f64),
        },
        (_, MetricValue::Inverters(inverters)) => process_inverters(inverters),
        (_, MetricValue::InvertersStatus(inverters)) => process_inverters_status(inverters),
        (_, MetricValue::Relays(relays)) => process_relays(relays),
        (_, MetricValue::Text(grid_status)) => STATE_GAUGE
            .with_label_values(&["grid_closed"])
            .set(flag(grid_status == "closed")),
        (_, MetricValue::Flag(enabled)) => STATE_GAUGE
            .with_label_values(&["production_enabled"])
            .set(flag(*enabled)),
        (_, MetricValue::Firmware(firmware)) => STATE_GAUGE
            .with_label_values(&["firmware_update_pending"])
            .set(flag(firmware.update_pending())),
        (_, MetricValue::NotAvailable(reason)) => log::debug!("{}: {}", name, reason),
        (_, MetricValue::Battery(battery)) => process_battery(battery),
        (_, MetricValue::Absent) => {}
    }
}

/// Replace the exported values with one cycle's snapshot. Per-device gauges
/// start empty so devices that dropped out are no longer reported.
fn process_snapshot(values: &[(MetricKey, MetricValue)]) {
    INVERTER_POWER_GAUGE.reset();
    INVERTER_STATUS_GAUGE.reset();
    RELAY_CLOSED_GAUGE.reset();
    BATTERY_GAUGE.reset();

    for (key, value) in values {
        process_metric(*key, value);
    }
}

/// Run one poll cycle against `gateway` and update the Prometheus registry.
pub async fn collect(gateway: &mut Gateway, metrics: &MetricSet) -> Result<(), Error> {
    gateway.fetch_all(metrics.wants_inverters()).await?;
    process_snapshot(&metrics.collect(gateway.readings()));

    Ok(())
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
}
