use eframe::egui;

use crate::config::schema;
use crate::fields::{FieldKind, FieldSet};
use crate::gui::constants::*;

/// Group box with every generic field of one section
pub fn ui(ui: &mut egui::Ui, fields: &mut FieldSet, section: &str) -> bool {
    let mut changed = false;

    ui.group(|ui| {
        ui.label(egui::RichText::new(schema::label(section)).strong());
        ui.add_space(ITEM_SPACING);
        changed = rows(ui, fields, section);
    });

    ui.add_space(SECTION_SPACING);
    changed
}

/// Toggle and free-text rows of a section; color swatches are skipped
pub fn rows(ui: &mut egui::Ui, fields: &mut FieldSet, section: &str) -> bool {
    let mut changed = false;

    egui::Grid::new(format!("{section}_fields"))
        .num_columns(2)
        .spacing([ITEM_SPACING * 2.0, ITEM_SPACING])
        .show(ui, |ui| {
            for binding in fields.section_mut(section) {
                let label = binding.label();
                let tooltip = binding.tooltip();

                match binding.kind() {
                    FieldKind::Toggle => {
                        let Some(on) = binding.toggle_mut() else { continue };
                        ui.label(label).on_hover_text(tooltip);
                        if ui.checkbox(on, "").on_hover_text(tooltip).changed() {
                            changed = true;
                        }
                        ui.end_row();
                    }
                    FieldKind::Text => {
                        let Some(text) = binding.text_mut() else { continue };
                        ui.label(label).on_hover_text(tooltip);
                        let edit = egui::TextEdit::singleline(text).desired_width(TEXT_FIELD_WIDTH);
                        if ui.add(edit).on_hover_text(tooltip).changed() {
                            changed = true;
                        }
                        ui.end_row();
                    }
                    FieldKind::Color => {}
                }
            }
        });

    changed
}
