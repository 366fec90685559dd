use eframe::egui;

use crate::config::schema::{self, LIGHT_IPS, NETWORK, UDP_PORT};
use crate::fields::NetworkFields;
use crate::gui::constants::*;

/// Requests the session has to carry out for the network group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkAction {
    None,
    AddAddress,
    RemoveSelected,
    Discover,
}

pub fn ui(ui: &mut egui::Ui, network: &mut NetworkFields, discovering: bool) -> NetworkAction {
    let mut action = NetworkAction::None;

    ui.group(|ui| {
        ui.label(egui::RichText::new("Network").strong());
        ui.add_space(ITEM_SPACING);

        ui.horizontal(|ui| {
            ui.label("UDP port:").on_hover_text(schema::tooltip(NETWORK, UDP_PORT));
            ui.add(egui::TextEdit::singleline(&mut network.port_text).desired_width(TEXT_FIELD_WIDTH));
        });

        ui.add_space(ITEM_SPACING);
        ui.label("Light IPs:").on_hover_text(schema::tooltip(NETWORK, LIGHT_IPS));

        let mut selected = network.selected;
        egui::Frame::group(ui.style()).show(ui, |ui| {
            egui::ScrollArea::vertical()
                .id_salt("light_ips")
                .max_height(ADDRESS_LIST_HEIGHT)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    if network.addresses().is_empty() {
                        ui.label(egui::RichText::new("No lights configured").weak());
                    }
                    for (i, ip) in network.addresses().iter().enumerate() {
                        if ui.selectable_label(selected == Some(i), ip).clicked() {
                            selected = Some(i);
                        }
                    }
                });
        });
        network.selected = selected;

        ui.horizontal(|ui| {
            let entry = ui.add(
                egui::TextEdit::singleline(&mut network.new_address)
                    .hint_text("192.168.1.20")
                    .desired_width(TEXT_FIELD_WIDTH),
            );
            let submitted = entry.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Add Light IP").clicked() || submitted {
                action = NetworkAction::AddAddress;
            }
            if ui
                .add_enabled(network.selected.is_some(), egui::Button::new("Remove Selected"))
                .clicked()
            {
                action = NetworkAction::RemoveSelected;
            }
        });

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!discovering, egui::Button::new("\u{1F50D} Discover Lights"))
                .clicked()
            {
                action = NetworkAction::Discover;
            }
            if discovering {
                ui.spinner();
            }
        });
    });

    ui.add_space(SECTION_SPACING);
    action
}
