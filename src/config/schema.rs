//! Canonical schema of the worker configuration
//!
//! Lists every section and key the worker understands together with the shape
//! its value must have. Keys outside this table are carried through load/save
//! untouched but never interpreted or rendered.

/// Shape a known key's value must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// JSON boolean
    Toggle,
    /// Any JSON scalar: integer, float, string or boolean
    Scalar,
    /// Integer UDP port in 1..=65535
    Port,
    /// Integer audio device index (may be negative for "default")
    DeviceIndex,
    /// Array of unique address strings
    AddressList,
    /// Array of `[r, g, b]` triples
    ColorGroup,
}

#[derive(Debug, Clone, Copy)]
pub struct KeySpec {
    pub section: &'static str,
    pub key: &'static str,
    pub shape: ValueShape,
    pub tooltip: &'static str,
}

pub const AUDIO: &str = "audio";
pub const NETWORK: &str = "network";
pub const VISUALIZATION: &str = "visualization";
pub const BRIGHTNESS: &str = "brightness";
pub const FEATURES: &str = "features";
pub const COLOR_SETTINGS: &str = "color_settings";
pub const AUDIO_PROCESSING: &str = "audio_processing";

pub const UDP_PORT: &str = "udp_port";
pub const LIGHT_IPS: &str = "light_ips";
pub const DEVICE_INDEX: &str = "device_index";

/// Sections in the order the editor shows them
pub const SECTIONS: [&str; 7] = [
    AUDIO,
    NETWORK,
    VISUALIZATION,
    BRIGHTNESS,
    FEATURES,
    COLOR_SETTINGS,
    AUDIO_PROCESSING,
];

const fn entry(
    section: &'static str,
    key: &'static str,
    shape: ValueShape,
    tooltip: &'static str,
) -> KeySpec {
    KeySpec { section, key, shape, tooltip }
}

use ValueShape::*;

pub static KEYS: &[KeySpec] = &[
    entry(AUDIO, "sample_rate", Scalar, "Sample rate for audio processing."),
    entry(AUDIO, "frames_per_buffer", Scalar, "Number of frames per buffer."),
    entry(AUDIO, "num_channels", Scalar, "Number of audio channels."),
    entry(AUDIO, DEVICE_INDEX, DeviceIndex, "Index of the audio device to use."),
    entry(NETWORK, UDP_PORT, Port, "UDP port the lights listen on."),
    entry(NETWORK, LIGHT_IPS, AddressList, "Addresses of the lights to drive."),
    entry(VISUALIZATION, "beat_threshold", Scalar, "Threshold for beat detection."),
    entry(VISUALIZATION, "color_cycle_duration_ms", Scalar, "Duration for color cycle in milliseconds."),
    entry(VISUALIZATION, "drum_break_threshold", Scalar, "Threshold for drum break detection."),
    entry(VISUALIZATION, "drum_break_interval_ms", Scalar, "Interval for drum break effects in milliseconds."),
    entry(VISUALIZATION, "bpm_interval_ms", Scalar, "Interval for BPM calculation in milliseconds."),
    entry(VISUALIZATION, "min_bpm", Scalar, "Minimum BPM for detection."),
    entry(VISUALIZATION, "max_bpm", Scalar, "Maximum BPM for detection."),
    entry(VISUALIZATION, "min_update_interval_ms", Scalar, "Minimum interval for updating visual effects in milliseconds."),
    entry(VISUALIZATION, "upper_threshold", Scalar, "Upper threshold for visual effect intensity."),
    entry(VISUALIZATION, "lower_threshold", Scalar, "Lower threshold for visual effect intensity."),
    entry(VISUALIZATION, "beat_history_size", Scalar, "Number of past volume readings used for beat detection smoothing."),
    entry(VISUALIZATION, "drum_break_history_size", Scalar, "Number of past volume readings used for drum break detection smoothing."),
    entry(BRIGHTNESS, "user_brightness", Scalar, "User-defined brightness level."),
    entry(BRIGHTNESS, "min_brightness", Scalar, "Minimum brightness level."),
    entry(BRIGHTNESS, "enable_dynamic_brightness", Toggle, "Enable dynamic brightness adjustment."),
    entry(FEATURES, "enable_smoothing", Toggle, "Enable smoothing of visual effects."),
    entry(FEATURES, "reverse_colors", Toggle, "Enable color reversal."),
    entry(FEATURES, "random_reversal_interval", Toggle, "Enable random reversal intervals."),
    entry(FEATURES, "reversal_interval", Scalar, "Fixed interval for color reversal in milliseconds."),
    entry(FEATURES, "reversal_interval_min", Scalar, "Minimum interval for color reversal in milliseconds."),
    entry(FEATURES, "reversal_interval_max", Scalar, "Maximum interval for color reversal in milliseconds."),
    entry(FEATURES, "enable_interpolation", Toggle, "Fade between colors instead of switching."),
    entry(FEATURES, "enable_drum_break_detection", Toggle, "Enable detection of drum breaks."),
    entry(FEATURES, "enable_beat_detection", Toggle, "Enable detection of beats."),
    entry(FEATURES, "enable_tempo_based_intensity", Toggle, "Enable tempo-based intensity adjustments."),
    entry(COLOR_SETTINGS, "vivid_colors", ColorGroup, "Palette cycled during normal playback."),
    entry(COLOR_SETTINGS, "beat_colors", ColorGroup, "Colors flashed on detected beats."),
    entry(COLOR_SETTINGS, "drum_break_colors", ColorGroup, "Colors used during drum breaks."),
    entry(AUDIO_PROCESSING, "max_seen_volume", Scalar, "Maximum volume seen for normalization."),
    entry(AUDIO_PROCESSING, "normalized_volume_factor", Scalar, "Factor for normalizing volume."),
];

pub fn lookup(section: &str, key: &str) -> Option<&'static KeySpec> {
    KEYS.iter().find(|k| k.section == section && k.key == key)
}

pub fn is_known_section(section: &str) -> bool {
    SECTIONS.contains(&section)
}

pub fn tooltip(section: &str, key: &str) -> &'static str {
    lookup(section, key).map(|k| k.tooltip).unwrap_or("")
}

/// Human label for a key or section name: `beat_threshold` -> `Beat threshold`
pub fn label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_belongs_to_a_known_section() {
        for key in KEYS {
            assert!(is_known_section(key.section), "{} not a section", key.section);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(NETWORK, UDP_PORT).map(|k| k.shape), Some(ValueShape::Port));
        assert_eq!(lookup(COLOR_SETTINGS, "beat_colors").map(|k| k.shape), Some(ValueShape::ColorGroup));
        assert!(lookup(AUDIO, "nonexistent").is_none());
        assert!(lookup("nonexistent", "sample_rate").is_none());
    }

    #[test]
    fn test_label() {
        assert_eq!(label("beat_threshold"), "Beat threshold");
        assert_eq!(label("audio_processing"), "Audio processing");
        assert_eq!(label(""), "");
    }
}
