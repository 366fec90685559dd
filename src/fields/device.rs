//! Audio device index: discrete selector plus manual entry
//!
//! The two inputs mirror each other. Picking an entry rewrites the manual text;
//! typing a known index selects its entry and anything else clears the
//! selection. Which one is saved depends on the manual toggle.

use crate::audio_devices::AudioDevice;
use crate::config::schema::{AUDIO, DEVICE_INDEX};
use crate::config::{ConfigDocument, ConfigError};
use crate::constants::audio::DEFAULT_DEVICE_INDEX;

#[derive(Debug, Clone, Default)]
pub struct DeviceSelector {
    devices: Vec<AudioDevice>,
    selected: Option<usize>,
    manual: bool,
    manual_text: String,
}

impl DeviceSelector {
    pub fn from_document(doc: &ConfigDocument, devices: Vec<AudioDevice>) -> Self {
        let saved = doc.device_index().unwrap_or(DEFAULT_DEVICE_INDEX);
        let selected = devices.iter().position(|d| d.index == saved);
        Self {
            devices,
            selected,
            manual: false,
            manual_text: saved.to_string(),
        }
    }

    pub fn devices(&self) -> &[AudioDevice] {
        &self.devices
    }

    pub fn selected(&self) -> Option<&AudioDevice> {
        self.devices.get(self.selected?)
    }

    pub fn selected_position(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    pub fn set_manual(&mut self, manual: bool) {
        self.manual = manual;
    }

    #[cfg(test)]
    pub fn manual_text(&self) -> &str {
        &self.manual_text
    }

    /// Choose a selector entry by position
    pub fn select(&mut self, position: Option<usize>) {
        self.selected = position.filter(|&p| p < self.devices.len());
        if let Some(index) = self.selected().map(|d| d.index) {
            self.manual_text = index.to_string();
        }
    }

    /// Replace the manual text and re-sync the selector
    #[cfg(test)]
    pub fn set_manual_text(&mut self, text: impl Into<String>) {
        self.manual_text = text.into();
        self.sync_from_manual_text();
    }

    /// Mutable manual text for in-place editing; call
    /// [`Self::sync_from_manual_text`] after a change
    pub fn manual_text_mut(&mut self) -> &mut String {
        &mut self.manual_text
    }

    pub fn sync_from_manual_text(&mut self) {
        self.selected = self
            .manual_text
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|index| self.devices.iter().position(|d| d.index == index));
    }

    /// Index to store in `audio.device_index`.
    ///
    /// `Ok(None)` means nothing is selected and the stored value is kept.
    pub fn resolve(&self) -> Result<Option<i64>, ConfigError> {
        if self.manual {
            let text = self.manual_text.trim();
            return text.parse::<i64>().map(Some).map_err(|_| {
                ConfigError::validation(
                    format!("{AUDIO}.{DEVICE_INDEX}"),
                    format!("'{}' is not a valid device index", self.manual_text),
                )
            });
        }
        Ok(self.selected().map(|d| d.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use crate::config::store::BUNDLED_TEMPLATE;

    fn devices() -> Vec<AudioDevice> {
        vec![AudioDevice::new(0, "Built-in"), AudioDevice::new(3, "USB Audio")]
    }

    fn doc_with_index(index: i64) -> ConfigDocument {
        let mut doc =
            ConfigDocument::from_json(serde_json::from_str(BUNDLED_TEMPLATE).unwrap()).unwrap();
        doc.set(AUDIO, DEVICE_INDEX, ConfigValue::Int(index));
        doc
    }

    #[test]
    fn test_preselects_saved_index() {
        let selector = DeviceSelector::from_document(&doc_with_index(3), devices());
        assert_eq!(selector.selected_position(), Some(1));
        assert_eq!(selector.manual_text(), "3");
        assert_eq!(selector.resolve().unwrap(), Some(3));
    }

    #[test]
    fn test_unknown_saved_index_selects_nothing() {
        let selector = DeviceSelector::from_document(&doc_with_index(9), devices());
        assert_eq!(selector.selected_position(), None);
        assert_eq!(selector.resolve().unwrap(), None);
    }

    #[test]
    fn test_select_rewrites_manual_text() {
        let mut selector = DeviceSelector::from_document(&doc_with_index(0), devices());
        selector.select(Some(1));
        assert_eq!(selector.manual_text(), "3");
        selector.select(Some(7));
        assert_eq!(selector.selected_position(), None);
    }

    #[test]
    fn test_manual_text_syncs_selection() {
        let mut selector = DeviceSelector::from_document(&doc_with_index(0), devices());
        selector.set_manual_text("3");
        assert_eq!(selector.selected_position(), Some(1));
        selector.set_manual_text("12");
        assert_eq!(selector.selected_position(), None);
        selector.set_manual_text("abc");
        assert_eq!(selector.selected_position(), None);
    }

    #[test]
    fn test_manual_entry_must_be_integer() {
        let mut selector = DeviceSelector::from_document(&doc_with_index(0), devices());
        selector.set_manual(true);
        selector.set_manual_text("12");
        assert_eq!(selector.resolve().unwrap(), Some(12));
        selector.set_manual_text("twelve");
        let err = selector.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "audio.device_index"));
    }
}
