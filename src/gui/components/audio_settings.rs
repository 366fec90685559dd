use eframe::egui;

use crate::audio_devices::AudioDevice;
use crate::config::schema::{self, AUDIO, DEVICE_INDEX};
use crate::fields::FieldSet;
use crate::gui::components::section_fields;
use crate::gui::constants::*;

pub fn ui(ui: &mut egui::Ui, fields: &mut FieldSet) -> bool {
    let mut changed = false;
    let tooltip = schema::tooltip(AUDIO, DEVICE_INDEX);

    ui.group(|ui| {
        ui.label(egui::RichText::new("Audio").strong());
        ui.add_space(ITEM_SPACING);

        let device = &mut fields.device;

        ui.horizontal(|ui| {
            ui.label("Input device:").on_hover_text(tooltip);
            let selected_text = device
                .selected()
                .map(AudioDevice::label)
                .unwrap_or_else(|| "---".to_string());
            let mut position = device.selected_position();

            egui::ComboBox::from_id_salt("audio_device")
                .selected_text(selected_text)
                .width(260.0)
                .show_ui(ui, |ui| {
                    for (i, entry) in device.devices().iter().enumerate() {
                        ui.selectable_value(&mut position, Some(i), entry.label());
                    }
                });

            if position != device.selected_position() {
                device.select(position);
                changed = true;
            }
        });

        ui.horizontal(|ui| {
            let mut manual = device.is_manual();
            if ui
                .checkbox(&mut manual, "Manual index:")
                .on_hover_text("Save the typed index instead of the selected device")
                .changed()
            {
                device.set_manual(manual);
                changed = true;
            }
            let edit = egui::TextEdit::singleline(device.manual_text_mut()).desired_width(60.0);
            if ui.add(edit).on_hover_text(tooltip).changed() {
                device.sync_from_manual_text();
                changed = true;
            }
        });

        if device.devices().is_empty() {
            ui.label(
                egui::RichText::new("No capture devices found, enter the index manually.")
                    .small()
                    .weak(),
            );
        }

        ui.add_space(ITEM_SPACING);
        if section_fields::rows(ui, fields, AUDIO) {
            changed = true;
        }
    });

    ui.add_space(SECTION_SPACING);
    changed
}
