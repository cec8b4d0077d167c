//! Data models for Fleetwatch.
//!
//! Alerts are produced by the upstream ingestion system and are read-only
//! from the dashboard's point of view. Decoding is deliberately lenient:
//! upstream records are loosely structured and a malformed optional field
//! must never hide the rest of the alert.
//!
//! # Rendering Guarantees
//!
//! Every accessor in this module tolerates missing data:
//!
//! - Non-finite or unparsable coordinates decode to `None`
//! - A missing or `null` `"Additional Data"` payload decodes to an empty list
//! - Auxiliary records that are not objects are skipped
//! - Off-type secondary fields decode to `None` or are coerced to strings
//! - Formatting helpers render `N/A` instead of panicking

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Pattern used by devices that report their charge inside the message text.
static BATTERY_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Battery level is at (\d+\.\d+)%").expect("battery pattern is valid")
});

/// Opaque identifier of an alert record.
///
/// Upstream emits either a plain string or a document id object
/// (`{"$oid": "..."}`); both decode to the same value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AlertId(pub String);

impl AlertId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AlertId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(AlertId(match Value::deserialize(deserializer)? {
            Value::Null => String::new(),
            Value::String(id) => id,
            Value::Object(doc) => match doc.get("$oid") {
                Some(Value::String(oid)) => oid.clone(),
                _ => Value::Object(doc).to_string(),
            },
            other => other.to_string(),
        }))
    }
}

/// A single device event reported by the tracking fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique record identifier; empty when upstream omitted it.
    #[serde(rename = "_id", default)]
    pub id: AlertId,

    /// Hardware serial (IMEI) of the reporting device.
    #[serde(default, deserialize_with = "lenient_string")]
    pub imei: String,

    /// When the event occurred, normalized to UTC.
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_time: Option<DateTime<Utc>>,

    /// Event category tag such as "battery", "tamper" or "speed".
    #[serde(default, deserialize_with = "lenient_string")]
    pub alert_type: String,

    /// Human-readable description.
    #[serde(default, deserialize_with = "lenient_string")]
    pub alert_message: String,

    /// Device-type tag attached to the alert.
    #[serde(default, deserialize_with = "lenient_string")]
    pub device_type_alert: String,

    /// Subsystem that raised the alert.
    #[serde(default, deserialize_with = "lenient_string")]
    pub source: String,

    /// Raw value that triggered the alert.
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,

    #[serde(default, deserialize_with = "finite_f64")]
    pub latitude: Option<f64>,

    #[serde(default, deserialize_with = "finite_f64")]
    pub longitude: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_type: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub serial_no: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub packet_type: Option<String>,

    /// Speed in km/h.
    #[serde(default, deserialize_with = "finite_f64")]
    pub speed: Option<f64>,

    /// Altitude in meters.
    #[serde(default, deserialize_with = "finite_f64")]
    pub altitude: Option<f64>,

    /// Heading in degrees.
    #[serde(default, deserialize_with = "finite_f64")]
    pub bearing: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub status_bit_definition: Option<StatusBitDefinition>,

    #[serde(
        default,
        deserialize_with = "lenient_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub alarm_flag_bit: Option<AlarmFlagBit>,

    /// Auxiliary device records, in upstream order.
    #[serde(
        rename = "Additional Data",
        default,
        deserialize_with = "lenient_list"
    )]
    pub additional_data: Vec<AdditionalData>,
}

impl Alert {
    /// Battery charge for this alert, if the device reported one.
    ///
    /// The first auxiliary record carrying a percentage wins. Battery alerts
    /// without such a record fall back to the percentage embedded in the
    /// message text.
    pub fn battery_percentage(&self) -> Option<f64> {
        self.additional_data
            .iter()
            .find_map(|record| record.battery_percentage)
            .or_else(|| self.battery_from_message())
    }

    fn battery_from_message(&self) -> Option<f64> {
        if self.alert_type != "battery" || !self.alert_message.contains("Battery") {
            return None;
        }

        BATTERY_MESSAGE
            .captures(&self.alert_message)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }

    /// Latitude/longitude pair when both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Badge tone derived from the alert category.
    pub fn tone(&self) -> AlertTone {
        AlertTone::for_category(&self.alert_type)
    }

    /// Case-insensitive substring match on category, message and IMEI.
    ///
    /// An empty term matches every alert.
    pub fn matches_search(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }

        let needle = term.to_lowercase();
        [&self.alert_type, &self.alert_message, &self.imei]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// One auxiliary record from an alert's `"Additional Data"` payload.
///
/// Every field is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalData {
    /// Mobile country code.
    #[serde(
        rename = "MCC",
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub mcc: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub base_station: Vec<BaseStation>,

    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub dynamic_password: Option<String>,

    #[serde(
        default,
        deserialize_with = "finite_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub battery_percentage: Option<f64>,

    #[serde(
        default,
        deserialize_with = "finite_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub battery_voltage: Option<f64>,

    #[serde(
        default,
        deserialize_with = "finite_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub network_csq_signal_value: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub satellites: Option<u32>,

    /// Raw payload for messages the ingestor could not decode.
    #[serde(
        rename = "Data",
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<String>,

    #[serde(
        rename = "Unknown Message ID",
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub unknown_message_id: Option<String>,
}

/// Cell tower the device was attached to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct BaseStation {
    #[serde(deserialize_with = "lenient_string")]
    pub lac: String,
    #[serde(deserialize_with = "lenient_string")]
    pub mnc: String,
    #[serde(deserialize_with = "lenient_string")]
    pub rxl: String,
    #[serde(rename = "CELLID", deserialize_with = "lenient_string")]
    pub cell_id: String,
}

/// Decoded device status bits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusBitDefinition {
    pub latitude_unit: String,
    pub longitude_unit: String,
    pub motion_state: bool,
    pub shackle_open: bool,
    pub seal_open: bool,
    pub active_sim: String,
    pub connection_type: String,
    pub connection: bool,
    pub network: String,
    pub gps: bool,
    pub gps_on: bool,
    pub ignition_on: bool,
    pub charge_status: String,
}

/// Alarm flags raised by the device firmware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlarmFlagBit {
    pub over_speed: bool,
    pub shackle_wire_cut: bool,
    pub shell_tampered: bool,
    pub gnss_failure: bool,
    pub gps_antenna_open: bool,
    pub mcu_comm_abnormal: bool,
    pub motor_stuck_unseal: bool,
    pub timeout_parking: bool,
    pub gps_antenna_short: bool,
    pub low_battery: bool,
    pub main_power_failure: bool,
    pub shackle_damaged: bool,
}

impl AlarmFlagBit {
    /// Labels of every raised flag, in firmware bit order.
    pub fn raised(&self) -> Vec<&'static str> {
        [
            (self.over_speed, "Over speed"),
            (self.shackle_wire_cut, "Shackle wire cut"),
            (self.shell_tampered, "Shell tampered"),
            (self.gnss_failure, "GNSS failure"),
            (self.gps_antenna_open, "GPS antenna open"),
            (self.mcu_comm_abnormal, "MCU communication abnormal"),
            (self.motor_stuck_unseal, "Motor stuck while unsealing"),
            (self.timeout_parking, "Parking timeout"),
            (self.gps_antenna_short, "GPS antenna short"),
            (self.low_battery, "Low battery"),
            (self.main_power_failure, "Main power failure"),
            (self.shackle_damaged, "Shackle damaged"),
        ]
        .into_iter()
        .filter_map(|(raised, label)| raised.then_some(label))
        .collect()
    }
}

/// Visual tone of an alert-category badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTone {
    Warning,
    Danger,
    Ok,
    Info,
}

impl AlertTone {
    /// Classify a category tag. Order matters: "unsealed" contains "sealed".
    pub fn for_category(category: &str) -> Self {
        if category.contains("battery") {
            AlertTone::Warning
        } else if category.contains("tamper") || category.contains("unsealed") {
            AlertTone::Danger
        } else if category.contains("sealed") {
            AlertTone::Ok
        } else {
            AlertTone::Info
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            AlertTone::Warning => "tone-warning",
            AlertTone::Danger => "tone-danger",
            AlertTone::Ok => "tone-ok",
            AlertTone::Info => "tone-info",
        }
    }
}

/// Charge band used to color the battery meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryTone {
    /// Below 20%.
    Critical,
    /// Below 50%.
    Low,
    Ok,
    /// No reading available.
    Unknown,
}

impl BatteryTone {
    pub fn from_percentage(percentage: Option<f64>) -> Self {
        match percentage {
            Some(p) if p < 20.0 => BatteryTone::Critical,
            Some(p) if p < 50.0 => BatteryTone::Low,
            Some(_) => BatteryTone::Ok,
            None => BatteryTone::Unknown,
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            BatteryTone::Critical => "battery-critical",
            BatteryTone::Low => "battery-low",
            BatteryTone::Ok => "battery-ok",
            BatteryTone::Unknown => "battery-unknown",
        }
    }
}

/// Format a coordinate with six decimals, or `N/A`.
pub fn format_coordinate(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.6}"),
        _ => "N/A".to_string(),
    }
}

/// Format a battery reading as `57.5%`, or `N/A`.
pub fn format_battery(percentage: Option<f64>) -> String {
    match percentage {
        Some(p) if p.is_finite() => format!("{p}%"),
        _ => "N/A".to_string(),
    }
}

/// Format an event timestamp for display, or `N/A`.
pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn finite_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()))
}

fn lenient_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let Value::String(raw) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    // Some firmware omits the offset; those timestamps are UTC.
    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}

/// Non-negative whole number; fractions, negatives and junk decode to `None`.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(parsed.and_then(|n| u32::try_from(n).ok()))
}

/// Decode a nested object, treating `null` members as absent.
///
/// An object that still fails to decode becomes `None` rather than failing
/// the enclosing record.
fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(decode_object(Value::deserialize(deserializer)?))
}

fn decode_object<T: DeserializeOwned>(value: Value) -> Option<T> {
    let Value::Object(mut fields) = value else {
        return None;
    };
    fields.retain(|_, v| !v.is_null());
    serde_json::from_value(Value::Object(fields)).ok()
}

/// Decode an array of objects, skipping members that are not objects.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(items.into_iter().filter_map(decode_object).collect())
}
