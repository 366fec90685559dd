//! Editable field representation of a configuration document
//!
//! [`FieldSet::render`] projects a [`ConfigDocument`] into typed field
//! bindings; [`FieldSet::collect`] reads the edited fields back into a new
//! document. Keys are addressed through explicit [`FieldKey`]s, never by name
//! lookup on the editor surface.

mod coerce;
mod device;
mod network;

pub use coerce::coerce_text;
pub use device::DeviceSelector;
pub use network::NetworkFields;

use tracing::{debug, warn};

use crate::audio_devices::AudioDevice;
use crate::color::Rgb;
use crate::config::schema::{self, AUDIO, DEVICE_INDEX, LIGHT_IPS, NETWORK, UDP_PORT};
use crate::config::{ConfigDocument, ConfigError, ConfigValue};

/// Input kind declared for a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Checkbox holding a boolean
    Toggle,
    /// Free text coerced to integer, float or string on save
    Text,
    /// Read-only `RGB(r, g, b)` swatch edited through a color picker
    Color,
}

/// Address of one bound value; `index` is the position inside a color group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub section: String,
    pub key: String,
    pub index: Option<usize>,
}

impl FieldKey {
    fn new(section: &str, key: &str, index: Option<usize>) -> Self {
        Self {
            section: section.to_string(),
            key: key.to_string(),
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Toggle(bool),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct FieldBinding {
    key: FieldKey,
    kind: FieldKind,
    value: FieldValue,
}

impl FieldBinding {
    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn label(&self) -> String {
        match self.key.index {
            Some(i) => format!("Color {}", i + 1),
            None => schema::label(&self.key.key),
        }
    }

    pub fn tooltip(&self) -> &'static str {
        schema::tooltip(&self.key.section, &self.key.key)
    }

    pub fn toggle_mut(&mut self) -> Option<&mut bool> {
        match &mut self.value {
            FieldValue::Toggle(b) => Some(b),
            FieldValue::Text(_) => None,
        }
    }

    /// Editable text of a free-text field. Color swatches are read-only and
    /// return `None`; use [`FieldBinding::set_color`].
    pub fn text_mut(&mut self) -> Option<&mut String> {
        match (&mut self.value, self.kind) {
            (FieldValue::Text(t), FieldKind::Text) => Some(t),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Text(t) => Some(t),
            FieldValue::Toggle(_) => None,
        }
    }

    /// Current color of a swatch, if its text still parses
    pub fn color(&self) -> Option<Rgb> {
        match (&self.value, self.kind) {
            (FieldValue::Text(t), FieldKind::Color) => Rgb::parse_swatch(t).ok(),
            _ => None,
        }
    }

    /// Store a picked color as swatch text
    pub fn set_color(&mut self, color: Rgb) -> bool {
        if self.kind != FieldKind::Color {
            return false;
        }
        self.value = FieldValue::Text(color.to_string());
        true
    }

    #[cfg(test)]
    fn set_text(&mut self, text: String) {
        self.value = FieldValue::Text(text);
    }
}

/// All editable fields of one rendering of a document
#[derive(Debug, Clone)]
pub struct FieldSet {
    /// Document the fields were rendered from; supplies everything not bound
    base: ConfigDocument,
    bindings: Vec<FieldBinding>,
    pub network: NetworkFields,
    pub device: DeviceSelector,
}

impl FieldSet {
    pub fn render(doc: &ConfigDocument, devices: Vec<AudioDevice>) -> Self {
        let mut bindings = Vec::new();

        for (section, entries) in doc.sections() {
            for (key, value) in entries {
                if is_dedicated(section, key) {
                    continue;
                }
                match value {
                    ConfigValue::Bool(b) => bindings.push(FieldBinding {
                        key: FieldKey::new(section, key, None),
                        kind: FieldKind::Toggle,
                        value: FieldValue::Toggle(*b),
                    }),
                    ConfigValue::Int(_) | ConfigValue::Float(_) | ConfigValue::Text(_) => {
                        bindings.push(FieldBinding {
                            key: FieldKey::new(section, key, None),
                            kind: FieldKind::Text,
                            value: FieldValue::Text(value.display_text()),
                        })
                    }
                    ConfigValue::Colors(colors) => {
                        bindings.extend(colors.iter().enumerate().map(|(i, color)| FieldBinding {
                            key: FieldKey::new(section, key, Some(i)),
                            kind: FieldKind::Color,
                            value: FieldValue::Text(color.to_string()),
                        }))
                    }
                    ConfigValue::Addresses(_) | ConfigValue::Raw(_) => {
                        debug!(section = %section, key = %key, "Not rendering value");
                    }
                }
            }
        }

        Self {
            base: doc.clone(),
            bindings,
            network: NetworkFields::from_document(doc),
            device: DeviceSelector::from_document(doc, devices),
        }
    }

    /// Make `doc` the base for the next collection, keeping edited values
    pub fn rebase(&mut self, doc: &ConfigDocument) {
        self.base = doc.clone();
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Bindings of one section, in document order
    pub fn section_mut<'a>(&'a mut self, section: &'a str) -> impl Iterator<Item = &'a mut FieldBinding> + 'a {
        self.bindings
            .iter_mut()
            .filter(move |b| b.key.section == section)
    }


    /// Re-derive the full document from the current field values.
    ///
    /// Network fields are read first, then every bound key, then the device
    /// index. Any validation failure aborts the whole collection.
    pub fn collect(&self) -> Result<ConfigDocument, ConfigError> {
        let mut doc = self.base.clone();

        let port = self.network.parse_port()?;
        doc.set(NETWORK, UDP_PORT, ConfigValue::Int(port));
        doc.set_light_ips(self.network.addresses().to_vec());

        for binding in &self.bindings {
            let FieldKey { section, key, index } = &binding.key;
            match (&binding.value, binding.kind, index) {
                (FieldValue::Toggle(on), _, _) => doc.set(section, key, ConfigValue::Bool(*on)),
                (FieldValue::Text(text), FieldKind::Color, Some(i)) => {
                    let field = format!("{section}.{key}[{i}]");
                    let color = Rgb::parse_swatch(text)
                        .map_err(|e| ConfigError::validation(&field, format!("'{text}': {e}")))?;
                    let mut colors = match doc.get(section, key) {
                        Some(ConfigValue::Colors(colors)) => colors.clone(),
                        _ => return Err(ConfigError::validation(field, "not a color group")),
                    };
                    let Some(slot) = colors.get_mut(*i) else {
                        return Err(ConfigError::validation(field, "color index out of range"));
                    };
                    *slot = color;
                    doc.set(section, key, ConfigValue::Colors(colors));
                }
                (FieldValue::Text(text), _, _) => {
                    let value = coerce_text(text)
                        .map_err(|reason| ConfigError::validation(format!("{section}.{key}"), reason))?;
                    if let ConfigValue::Text(raw) = &value
                        && matches!(self.base.get(section, key), Some(ConfigValue::Int(_) | ConfigValue::Float(_)))
                    {
                        warn!(section = %section, key = %key, text = %raw, "Numeric field saved as text");
                    }
                    doc.set(section, key, value);
                }
            }
        }

        if let Some(index) = self.device.resolve()? {
            doc.set(AUDIO, DEVICE_INDEX, ConfigValue::Int(index));
        }

        Ok(doc)
    }
}

/// Keyed editing used by tests in place of the editor widgets
#[cfg(test)]
impl FieldSet {
    pub fn binding(&self, section: &str, key: &str) -> Option<&FieldBinding> {
        self.bindings
            .iter()
            .find(|b| b.key.section == section && b.key.key == key && b.key.index.is_none())
    }

    fn binding_mut(&mut self, section: &str, key: &str) -> Option<&mut FieldBinding> {
        self.bindings
            .iter_mut()
            .find(|b| b.key.section == section && b.key.key == key && b.key.index.is_none())
    }

    fn color_mut(&mut self, group: &str, index: usize) -> Option<&mut FieldBinding> {
        self.bindings.iter_mut().find(|b| {
            b.key.section == schema::COLOR_SETTINGS && b.key.key == group && b.key.index == Some(index)
        })
    }

    /// Replace the text of a free-text field. Returns false if there is none.
    pub fn set_text(&mut self, section: &str, key: &str, text: impl Into<String>) -> bool {
        match self.binding_mut(section, key) {
            Some(binding) if binding.kind == FieldKind::Text => {
                binding.set_text(text.into());
                true
            }
            _ => false,
        }
    }

    pub fn set_toggle(&mut self, section: &str, key: &str, on: bool) -> bool {
        match self.binding_mut(section, key).and_then(FieldBinding::toggle_mut) {
            Some(value) => {
                *value = on;
                true
            }
            None => false,
        }
    }

    pub fn set_color(&mut self, group: &str, index: usize, color: Rgb) -> bool {
        self.color_mut(group, index)
            .is_some_and(|binding| binding.set_color(color))
    }

    /// Overwrite a swatch's raw text, bypassing the picker
    pub fn set_color_text(&mut self, group: &str, index: usize, text: impl Into<String>) -> bool {
        match self.color_mut(group, index) {
            Some(binding) => {
                binding.set_text(text.into());
                true
            }
            None => false,
        }
    }
}

/// Keys with their own editor instead of the generic per-key loop
fn is_dedicated(section: &str, key: &str) -> bool {
    matches!(
        (section, key),
        (NETWORK, UDP_PORT) | (NETWORK, LIGHT_IPS) | (AUDIO, DEVICE_INDEX)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::COLOR_SETTINGS;
    use crate::config::store::BUNDLED_TEMPLATE;

    fn template() -> ConfigDocument {
        ConfigDocument::from_json(serde_json::from_str(BUNDLED_TEMPLATE).unwrap()).unwrap()
    }

    fn devices() -> Vec<AudioDevice> {
        vec![AudioDevice::new(0, "Built-in"), AudioDevice::new(2, "USB Audio")]
    }

    #[test]
    fn test_unedited_collect_is_identity() {
        let doc = template();
        let fields = FieldSet::render(&doc, devices());
        assert_eq!(fields.collect().unwrap(), doc);
    }

    #[test]
    fn test_render_kinds() {
        let fields = FieldSet::render(&template(), devices());

        let toggle = fields.binding("features", "reverse_colors").unwrap();
        assert_eq!(toggle.kind(), FieldKind::Toggle);

        let text = fields.binding("visualization", "upper_threshold").unwrap();
        assert_eq!(text.kind(), FieldKind::Text);
        assert_eq!(text.text(), Some("0.05"));

        let colors: Vec<_> = fields
            .bindings()
            .iter()
            .filter(|b| b.key().key == "beat_colors")
            .collect();
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0].kind(), FieldKind::Color);
        assert_eq!(colors[0].text(), Some("RGB(255, 255, 255)"));
        assert_eq!(colors[1].label(), "Color 2");

        // Dedicated fields stay out of the generic bindings
        assert!(fields.binding(NETWORK, UDP_PORT).is_none());
        assert!(fields.binding(AUDIO, DEVICE_INDEX).is_none());
        assert_eq!(fields.network.port_text, "38899");
    }

    #[test]
    fn test_numeric_coercion_on_collect() {
        let mut fields = FieldSet::render(&template(), devices());
        assert!(fields.set_text("visualization", "beat_threshold", "0.5"));
        assert!(fields.set_text("visualization", "min_bpm", "42"));
        assert!(fields.set_text("visualization", "max_bpm", "on"));

        let doc = fields.collect().unwrap();
        assert_eq!(doc.get("visualization", "beat_threshold"), Some(&ConfigValue::Float(0.5)));
        assert_eq!(doc.get("visualization", "min_bpm"), Some(&ConfigValue::Int(42)));
        assert_eq!(
            doc.get("visualization", "max_bpm"),
            Some(&ConfigValue::Text("on".to_string()))
        );
    }

    #[test]
    fn test_overflowing_float_blocks_collect() {
        let mut fields = FieldSet::render(&template(), devices());
        let huge = format!("1{}.0", "0".repeat(400));
        assert!(fields.set_text("visualization", "beat_threshold", huge));
        let err = fields.collect().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "visualization.beat_threshold")
        );
    }

    #[test]
    fn test_toggle_collect() {
        let mut fields = FieldSet::render(&template(), devices());
        assert!(fields.set_toggle("features", "enable_smoothing", true));
        assert!(!fields.set_toggle("visualization", "min_bpm", true));
        let doc = fields.collect().unwrap();
        assert_eq!(doc.get("features", "enable_smoothing"), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn test_color_edit_overwrites_only_its_index() {
        let doc = template();
        let mut fields = FieldSet::render(&doc, devices());
        assert!(fields.set_color("vivid_colors", 2, Rgb::new(12, 200, 255)));

        let collected = fields.collect().unwrap();
        let Some(ConfigValue::Colors(before)) = doc.get(COLOR_SETTINGS, "vivid_colors") else {
            panic!("vivid_colors missing");
        };
        let Some(ConfigValue::Colors(after)) = collected.get(COLOR_SETTINGS, "vivid_colors") else {
            panic!("vivid_colors missing");
        };
        assert_eq!(after.len(), before.len());
        for (i, (old, new)) in before.iter().zip(after).enumerate() {
            if i == 2 {
                assert_eq!(*new, Rgb::new(12, 200, 255));
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn test_malformed_color_blocks_collect() {
        let mut fields = FieldSet::render(&template(), devices());
        assert!(fields.set_color_text("beat_colors", 0, "RGB(1, 2)"));
        let err = fields.collect().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "color_settings.beat_colors[0]")
        );
    }

    #[test]
    fn test_color_swatch_is_not_free_text() {
        let mut fields = FieldSet::render(&template(), devices());
        let swatch = fields.color_mut("beat_colors", 0).unwrap();
        assert!(swatch.text_mut().is_none());
        assert_eq!(swatch.color(), Some(Rgb::new(255, 255, 255)));
        assert!(!fields.set_text(COLOR_SETTINGS, "beat_colors", "x"));
    }

    #[test]
    fn test_invalid_port_blocks_collect() {
        let mut fields = FieldSet::render(&template(), devices());
        fields.network.port_text = "port".to_string();
        assert!(fields.collect().is_err());
    }

    #[test]
    fn test_network_edits_are_collected() {
        let mut fields = FieldSet::render(&template(), devices());
        fields.network.port_text = "4000".to_string();
        fields.network.add_address("10.0.0.5").unwrap();
        fields.network.add_address("10.0.0.6").unwrap();
        fields.network.remove_address("10.0.0.5");

        let doc = fields.collect().unwrap();
        assert_eq!(doc.udp_port(), Some(4000));
        assert_eq!(doc.light_ips(), ["10.0.0.6".to_string()]);
    }

    #[test]
    fn test_device_index_from_selector_and_manual_entry() {
        let mut fields = FieldSet::render(&template(), devices());
        fields.device.select(Some(1));
        assert_eq!(fields.collect().unwrap().device_index(), Some(2));

        fields.device.set_manual(true);
        fields.device.set_manual_text("7");
        assert_eq!(fields.collect().unwrap().device_index(), Some(7));

        fields.device.set_manual_text("seven");
        assert!(fields.collect().is_err());
    }

    #[test]
    fn test_unselected_device_keeps_stored_index() {
        // Template stores -1 which matches no enumerated device
        let fields = FieldSet::render(&template(), devices());
        assert_eq!(fields.device.selected_position(), None);
        assert_eq!(fields.collect().unwrap().device_index(), Some(-1));
    }

    #[test]
    fn test_keys_outside_schema_survive_collect() {
        let mut raw: serde_json::Value = serde_json::from_str(BUNDLED_TEMPLATE).unwrap();
        raw["features"]["experimental"] = serde_json::json!({ "strobe": true });
        let doc = ConfigDocument::from_json(raw).unwrap();

        let fields = FieldSet::render(&doc, Vec::new());
        assert!(fields.binding("features", "experimental").is_none());
        assert_eq!(fields.collect().unwrap(), doc);
    }
}
