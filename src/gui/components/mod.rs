pub mod audio_settings;
pub mod color_settings;
pub mod network_settings;
pub mod section_fields;
