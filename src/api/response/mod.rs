pub mod device_type;
pub mod table;

use serde::Deserialize;
use serde_json::Value;

/* Cloud token issued for one gateway serial */
#[derive(Debug, Deserialize)]
pub struct OwnerToken {
    pub token: Option<String>,
    pub expires_at: Option<i64>,
    pub message: Option<String>,
}

/* Entry of /api/v1/production/inverters */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inverter {
    pub serial_number: String,
    pub last_report_date: i64,
    pub last_report_watts: f64,
}

#[derive(Debug, Deserialize)]
pub struct Enpower {
    pub grid_status: Option<String>,
}

/* /home.json, only the parts that are reported */
#[derive(Debug, Deserialize)]
pub struct Home {
    pub update_status: Option<String>,
    pub software_build_epoch: Option<i64>,
    pub enpower: Option<Enpower>,
}

/// Gateway flags come as JSON booleans or as 0/1 depending on firmware.
pub fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}
