//! In-memory configuration document
//!
//! The document keeps the file's section and key order. Values of keys the
//! schema knows are checked against their [`ValueShape`] on load; everything
//! else is kept as raw JSON and written back unchanged.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::net::IpAddr;
use tracing::{debug, info};

use super::error::ConfigError;
use super::schema::{self, ValueShape};
use crate::color::Rgb;
use crate::constants::validation::{MAX_PORT, MIN_PORT};

/// Typed value of one configuration key
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Addresses(Vec<String>),
    Colors(Vec<Rgb>),
    /// Value of a key outside the schema, preserved verbatim
    Raw(Value),
}

impl ConfigValue {
    /// Text shown in a free-text field for this value
    pub fn display_text(&self) -> String {
        match self {
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Int(i) => i.to_string(),
            ConfigValue::Float(f) => format_float(*f),
            ConfigValue::Text(s) => s.clone(),
            ConfigValue::Addresses(list) => list.join(", "),
            ConfigValue::Colors(colors) => colors
                .iter()
                .map(Rgb::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            ConfigValue::Raw(v) => v.to_string(),
        }
    }

    /// JSON form of the value; `None` for a float JSON cannot hold
    pub fn to_json(&self) -> Option<Value> {
        let value = match self {
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Int(i) => Value::from(*i),
            ConfigValue::Float(f) => Value::Number(Number::from_f64(*f)?),
            ConfigValue::Text(s) => Value::String(s.clone()),
            ConfigValue::Addresses(list) => Value::from(list.clone()),
            ConfigValue::Colors(colors) => {
                Value::Array(colors.iter().map(|c| c.to_json()).collect())
            }
            ConfigValue::Raw(v) => v.clone(),
        };
        Some(value)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Floats keep a decimal point so they are re-read as floats after editing
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub type Section = IndexMap<String, ConfigValue>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    sections: IndexMap<String, Section>,
    /// Top-level entries that are not sections of the schema
    extra: IndexMap<String, Value>,
}

impl ConfigDocument {
    /// Interpret a parsed JSON document against the schema.
    ///
    /// All seven sections must be present. Fails without producing a partial
    /// document.
    pub fn from_json(root: Value) -> Result<Self, ConfigError> {
        let Value::Object(root) = root else {
            return Err(ConfigError::validation("document", "root must be an object"));
        };

        let mut doc = ConfigDocument::default();
        for (name, value) in root {
            if !schema::is_known_section(&name) {
                debug!(section = %name, "Preserving unknown top-level entry");
                doc.extra.insert(name, value);
                continue;
            }
            let Value::Object(entries) = value else {
                return Err(ConfigError::validation(name, "section must be an object"));
            };
            let section = parse_section(&name, entries)?;
            doc.sections.insert(name, section);
        }

        for name in schema::SECTIONS {
            if !doc.sections.contains_key(name) {
                return Err(ConfigError::validation(name, "section is missing"));
            }
        }

        Ok(doc)
    }

    /// Serialize back to JSON. Fails on values JSON cannot represent.
    pub fn to_json(&self) -> Result<Value, ConfigError> {
        let mut root = Map::new();
        for (name, section) in &self.sections {
            let mut entries = Map::new();
            for (key, value) in section {
                let json = value
                    .to_json()
                    .ok_or_else(|| ConfigError::validation(format!("{name}.{key}"), "number is not finite"))?;
                entries.insert(key.clone(), json);
            }
            root.insert(name.clone(), Value::Object(entries));
        }
        for (name, value) in &self.extra {
            root.insert(name.clone(), value.clone());
        }
        Ok(Value::Object(root))
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(name, section)| (name.as_str(), section))
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&ConfigValue> {
        self.sections.get(section)?.get(key)
    }

    /// Overwrite one value, keeping the key's position when it already exists
    pub fn set(&mut self, section: &str, key: &str, value: ConfigValue) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn udp_port(&self) -> Option<i64> {
        self.get(schema::NETWORK, schema::UDP_PORT)?.as_i64()
    }

    pub fn device_index(&self) -> Option<i64> {
        self.get(schema::AUDIO, schema::DEVICE_INDEX)?.as_i64()
    }

    pub fn light_ips(&self) -> &[String] {
        match self.get(schema::NETWORK, schema::LIGHT_IPS) {
            Some(ConfigValue::Addresses(list)) => list,
            _ => &[],
        }
    }

    pub fn set_light_ips(&mut self, ips: Vec<String>) {
        self.set(schema::NETWORK, schema::LIGHT_IPS, ConfigValue::Addresses(ips));
    }

    /// Append one address. Duplicates are rejected.
    #[cfg(test)]
    pub fn add_light_ip(&mut self, ip: &str) -> Result<(), ConfigError> {
        let mut ips = self.light_ips().to_vec();
        push_unique_address(&mut ips, ip)?;
        self.set_light_ips(ips);
        Ok(())
    }

    pub fn remove_light_ip(&mut self, ip: &str) -> bool {
        let mut ips = self.light_ips().to_vec();
        let before = ips.len();
        ips.retain(|existing| existing != ip);
        let removed = ips.len() != before;
        if removed {
            self.set_light_ips(ips);
        }
        removed
    }

    /// Append every address not yet present, in the given order.
    ///
    /// Returns the addresses that were actually added. Known addresses and
    /// repeats within `discovered` are skipped without error.
    pub fn merge_light_ips<'a, I>(&mut self, discovered: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ips = self.light_ips().to_vec();
        let added = merge_addresses(&mut ips, discovered);
        if !added.is_empty() {
            info!(added = ?added, "Merged discovered light addresses");
            self.set_light_ips(ips);
        }
        added
    }
}

/// Validate and append one manually entered address
pub(crate) fn push_unique_address(list: &mut Vec<String>, ip: &str) -> Result<(), ConfigError> {
    let field = format!("{}.{}", schema::NETWORK, schema::LIGHT_IPS);
    let ip = ip.trim();
    if ip.is_empty() {
        return Err(ConfigError::validation(field, "address is empty"));
    }
    if ip.parse::<IpAddr>().is_err() {
        return Err(ConfigError::validation(field, format!("'{ip}' is not an IP address")));
    }
    if list.iter().any(|existing| existing == ip) {
        return Err(ConfigError::validation(field, format!("'{ip}' is already in the list")));
    }
    list.push(ip.to_string());
    Ok(())
}

pub(crate) fn merge_addresses<'a, I>(list: &mut Vec<String>, discovered: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut added = Vec::new();
    for ip in discovered {
        if list.iter().any(|existing| existing == ip) {
            continue;
        }
        list.push(ip.to_string());
        added.push(ip.to_string());
    }
    added
}

fn parse_section(name: &str, entries: Map<String, Value>) -> Result<Section, ConfigError> {
    let mut section = Section::new();
    for (key, value) in entries {
        let typed = match schema::lookup(name, &key) {
            Some(entry) => parse_known(name, &key, entry.shape, value)?,
            None => {
                debug!(section = %name, key = %key, "Preserving key outside the schema");
                ConfigValue::Raw(value)
            }
        };
        section.insert(key, typed);
    }
    Ok(section)
}

fn parse_known(
    section: &str,
    key: &str,
    shape: ValueShape,
    value: Value,
) -> Result<ConfigValue, ConfigError> {
    let field = format!("{section}.{key}");
    match shape {
        ValueShape::Toggle => value
            .as_bool()
            .map(ConfigValue::Bool)
            .ok_or_else(|| ConfigError::validation(field, "expected a boolean")),
        ValueShape::Scalar => parse_scalar(value)
            .ok_or_else(|| ConfigError::validation(field, "expected a number, string or boolean")),
        ValueShape::Port => {
            let port = value
                .as_i64()
                .ok_or_else(|| ConfigError::validation(&field, "expected an integer"))?;
            validate_port(port).map_err(|reason| ConfigError::validation(field, reason))?;
            Ok(ConfigValue::Int(port))
        }
        ValueShape::DeviceIndex => value
            .as_i64()
            .map(ConfigValue::Int)
            .ok_or_else(|| ConfigError::validation(field, "expected an integer")),
        ValueShape::AddressList => {
            let Value::Array(items) = value else {
                return Err(ConfigError::validation(field, "expected a list of addresses"));
            };
            let mut ips: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                let ip = item
                    .as_str()
                    .ok_or_else(|| ConfigError::validation(&field, "addresses must be strings"))?;
                if ips.iter().any(|existing| existing == ip) {
                    return Err(ConfigError::validation(field, format!("duplicate address '{ip}'")));
                }
                ips.push(ip.to_string());
            }
            Ok(ConfigValue::Addresses(ips))
        }
        ValueShape::ColorGroup => {
            let Value::Array(items) = value else {
                return Err(ConfigError::validation(field, "expected a list of [r, g, b] colors"));
            };
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    Rgb::from_json(item)
                        .map_err(|e| ConfigError::validation(format!("{field}[{i}]"), e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigValue::Colors)
        }
    }
}

fn parse_scalar(value: Value) -> Option<ConfigValue> {
    match value {
        Value::Bool(b) => Some(ConfigValue::Bool(b)),
        Value::String(s) => Some(ConfigValue::Text(s)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(ConfigValue::Int(i)),
            None => n.as_f64().map(ConfigValue::Float),
        },
        _ => None,
    }
}

pub(crate) fn validate_port(port: i64) -> Result<(), String> {
    if (MIN_PORT..=MAX_PORT).contains(&port) {
        Ok(())
    } else {
        Err(format!("port {port} is outside {MIN_PORT}-{MAX_PORT}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "audio": { "sample_rate": 48000, "device_index": 2 },
            "network": { "udp_port": 38899, "light_ips": ["10.0.0.1"] },
            "visualization": { "beat_threshold": 1.3, "mode": "pulse" },
            "brightness": { "enable_dynamic_brightness": true },
            "features": {},
            "color_settings": { "beat_colors": [[1, 2, 3], [4, 5, 6]] },
            "audio_processing": { "max_seen_volume": 1.0 }
        })
    }

    #[test]
    fn test_from_json_types_values() {
        let doc = ConfigDocument::from_json(minimal()).unwrap();
        assert_eq!(doc.get("audio", "sample_rate"), Some(&ConfigValue::Int(48000)));
        assert_eq!(doc.get("visualization", "beat_threshold"), Some(&ConfigValue::Float(1.3)));
        assert_eq!(
            doc.get("visualization", "mode"),
            Some(&ConfigValue::Raw(json!("pulse")))
        );
        assert_eq!(doc.get("brightness", "enable_dynamic_brightness"), Some(&ConfigValue::Bool(true)));
        assert_eq!(
            doc.get("color_settings", "beat_colors"),
            Some(&ConfigValue::Colors(vec![Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)]))
        );
        assert_eq!(doc.udp_port(), Some(38899));
        assert_eq!(doc.device_index(), Some(2));
        assert_eq!(doc.light_ips(), ["10.0.0.1".to_string()]);
    }

    #[test]
    fn test_json_roundtrip_preserves_unknown_entries() {
        let mut raw = minimal();
        raw["plugin"] = json!({ "nested": [1, 2, 3] });
        raw["network"]["comment"] = json!({ "a": null });

        let doc = ConfigDocument::from_json(raw.clone()).unwrap();
        assert_eq!(doc.to_json().unwrap(), raw);
    }

    #[test]
    fn test_missing_section_rejected() {
        let mut raw = minimal();
        raw.as_object_mut().unwrap().remove("features");
        let err = ConfigDocument::from_json(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "features"));
    }

    #[test]
    fn test_duplicate_light_ips_rejected_on_load() {
        let mut raw = minimal();
        raw["network"]["light_ips"] = json!(["10.0.0.1", "10.0.0.1"]);
        assert!(ConfigDocument::from_json(raw).is_err());
    }

    #[test]
    fn test_bad_color_rejected_on_load() {
        let mut raw = minimal();
        raw["color_settings"]["beat_colors"] = json!([[1, 2, 3], [4, 5]]);
        let err = ConfigDocument::from_json(raw).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "color_settings.beat_colors[1]")
        );
    }

    #[test]
    fn test_port_range_checked_on_load() {
        let mut raw = minimal();
        raw["network"]["udp_port"] = json!(70000);
        assert!(ConfigDocument::from_json(raw.clone()).is_err());
        raw["network"]["udp_port"] = json!(0);
        assert!(ConfigDocument::from_json(raw).is_err());
    }

    #[test]
    fn test_add_light_ip_rejects_duplicates_and_garbage() {
        let mut doc = ConfigDocument::from_json(minimal()).unwrap();
        doc.add_light_ip("10.0.0.5").unwrap();
        assert!(doc.add_light_ip("10.0.0.5").is_err());
        assert!(doc.add_light_ip("").is_err());
        assert!(doc.add_light_ip("not-an-ip").is_err());
        assert_eq!(doc.light_ips(), ["10.0.0.1".to_string(), "10.0.0.5".to_string()]);
    }

    #[test]
    fn test_manual_then_discovered_keeps_single_occurrence() {
        let mut doc = ConfigDocument::from_json(minimal()).unwrap();
        doc.add_light_ip("10.0.0.5").unwrap();
        let added = doc.merge_light_ips(["10.0.0.5", "10.0.0.6", "10.0.0.6"]);
        assert_eq!(added, vec!["10.0.0.6".to_string()]);
        assert_eq!(doc.light_ips().iter().filter(|ip| *ip == "10.0.0.5").count(), 1);
        assert_eq!(
            doc.light_ips(),
            ["10.0.0.1".to_string(), "10.0.0.5".to_string(), "10.0.0.6".to_string()]
        );
    }

    #[test]
    fn test_remove_light_ip() {
        let mut doc = ConfigDocument::from_json(minimal()).unwrap();
        assert!(doc.remove_light_ip("10.0.0.1"));
        assert!(!doc.remove_light_ip("10.0.0.1"));
        assert!(doc.light_ips().is_empty());
    }

    #[test]
    fn test_non_finite_float_is_not_serialized() {
        let mut doc = ConfigDocument::from_json(minimal()).unwrap();
        doc.set("visualization", "beat_threshold", ConfigValue::Float(f64::INFINITY));
        let err = doc.to_json().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "visualization.beat_threshold")
        );
        assert_eq!(ConfigValue::Float(f64::NAN).to_json(), None);
    }

    #[test]
    fn test_display_text_keeps_float_marker() {
        assert_eq!(ConfigValue::Float(1.0).display_text(), "1.0");
        assert_eq!(ConfigValue::Float(0.05).display_text(), "0.05");
        assert_eq!(ConfigValue::Int(42).display_text(), "42");
    }
}
