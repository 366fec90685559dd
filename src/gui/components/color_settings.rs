use eframe::egui;

use crate::color::Rgb;
use crate::config::schema::{self, COLOR_SETTINGS};
use crate::fields::{FieldKind, FieldSet};
use crate::gui::components::section_fields;
use crate::gui::constants::*;

/// Color groups as rows of swatches with a picker each
pub fn ui(ui: &mut egui::Ui, fields: &mut FieldSet) -> bool {
    let mut changed = false;

    let mut groups: Vec<String> = Vec::new();
    for binding in fields.bindings() {
        let key = binding.key();
        if key.section == COLOR_SETTINGS && binding.kind() == FieldKind::Color && !groups.contains(&key.key) {
            groups.push(key.key.clone());
        }
    }

    ui.group(|ui| {
        ui.label(egui::RichText::new("Colors").strong());
        ui.add_space(ITEM_SPACING);

        for group in &groups {
            ui.label(schema::label(group))
                .on_hover_text(schema::tooltip(COLOR_SETTINGS, group));

            ui.horizontal_wrapped(|ui| {
                let swatches = fields
                    .section_mut(COLOR_SETTINGS)
                    .filter(|b| b.kind() == FieldKind::Color && b.key().key == *group);

                for binding in swatches {
                    let Some(color) = binding.color() else {
                        ui.colored_label(STATUS_STOPPED, binding.text().unwrap_or_default());
                        continue;
                    };
                    let mut rgb = color.to_array();
                    if ui
                        .color_edit_button_srgb(&mut rgb)
                        .on_hover_text(binding.label())
                        .changed()
                    {
                        binding.set_color(Rgb::from(rgb));
                        changed = true;
                    }
                    ui.label(egui::RichText::new(Rgb::from(rgb).to_string()).monospace().small());
                }
            });
            ui.add_space(ITEM_SPACING);
        }

        if section_fields::rows(ui, fields, COLOR_SETTINGS) {
            changed = true;
        }
    });

    ui.add_space(SECTION_SPACING);
    changed
}
