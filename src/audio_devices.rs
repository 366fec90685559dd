//! Audio capture device enumeration for the device selector
//!
//! Devices are listed once when the editor is built, through the default cpal
//! host. Each device keeps its position in the host's full device list as its
//! index, the way the visualizer numbers devices; only devices with an input
//! stream are offered.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, warn};

const UNNAMED_DEVICE: &str = "Unknown device";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Index written to `audio.device_index`
    pub index: i64,
    pub name: String,
}

impl AudioDevice {
    pub fn new(index: i64, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    /// Entry text in the selector, `"3: USB Audio"`
    pub fn label(&self) -> String {
        format!("{}: {}", self.index, self.name)
    }
}

pub fn list_input_devices() -> Vec<AudioDevice> {
    let host = cpal::default_host();
    let devices = match host.devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!(host = ?host.id(), error = %e, "Cannot enumerate audio devices");
            return Vec::new();
        }
    };

    let listed = devices.map(|device| {
        let name = device.name().unwrap_or_else(|e| {
            debug!(error = %e, "Audio device has no name");
            UNNAMED_DEVICE.to_string()
        });
        let has_input = device
            .supported_input_configs()
            .map(|mut configs| configs.next().is_some())
            .unwrap_or(false);
        (name, has_input)
    });

    let inputs = number_input_devices(listed);
    debug!(host = ?host.id(), count = inputs.len(), "Enumerated audio input devices");
    inputs
}

/// Number every listed device by position and keep the ones with an input stream
fn number_input_devices<I>(listed: I) -> Vec<AudioDevice>
where
    I: IntoIterator<Item = (String, bool)>,
{
    listed
        .into_iter()
        .enumerate()
        .filter_map(|(index, (name, has_input))| has_input.then(|| AudioDevice::new(index as i64, name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(entries: &[(&str, bool)]) -> Vec<(String, bool)> {
        entries.iter().map(|(name, input)| (name.to_string(), *input)).collect()
    }

    #[test]
    fn test_output_only_devices_still_count_towards_index() {
        let devices = number_input_devices(listed(&[
            ("default", true),
            ("HDMI Output", false),
            ("pulse", true),
            ("USB Audio", true),
        ]));
        assert_eq!(
            devices,
            vec![
                AudioDevice::new(0, "default"),
                AudioDevice::new(2, "pulse"),
                AudioDevice::new(3, "USB Audio"),
            ]
        );
        assert_eq!(devices[2].label(), "3: USB Audio");
    }

    #[test]
    fn test_no_input_devices() {
        assert!(number_input_devices(listed(&[("HDMI Output", false)])).is_empty());
        assert!(number_input_devices(Vec::<(String, bool)>::new()).is_empty());
    }
}
