//! egui manager window over a [`crate::session::ConfigSession`]

mod components;
mod constants;
mod manager;

pub use manager::run_gui;
