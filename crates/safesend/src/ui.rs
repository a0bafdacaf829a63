//! Small reusable widgets

use alloy::primitives::Address;
use eframe::egui;

use safesend_core::{Notice, NoticeLevel};

pub const ACCENT: egui::Color32 = egui::Color32::from_rgb(0, 212, 170);
const ERROR: egui::Color32 = egui::Color32::from_rgb(230, 90, 90);

/// `0x1234…abcd`
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

/// Address label with a copy button; returns true when copy was clicked.
pub fn address_with_copy(ui: &mut egui::Ui, address: &Address) -> bool {
    let mut copied = false;
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new(short_address(address)).monospace())
            .on_hover_text(address.to_string());
        if ui
            .small_button("📋")
            .on_hover_text("Copy to clipboard")
            .clicked()
        {
            copied = true;
        }
    });
    copied
}

pub fn notice_label(ui: &mut egui::Ui, notice: &Notice) {
    let color = match notice.level {
        NoticeLevel::Info => ACCENT,
        NoticeLevel::Error => ERROR,
    };
    ui.label(egui::RichText::new(&notice.message).color(color));
}

#[cfg(not(target_arch = "wasm32"))]
pub fn copy_to_clipboard(text: &str) {
    if let Ok(mut clipboard) = arboard::Clipboard::new() {
        let _ = clipboard.set_text(text);
    }
}

#[cfg(target_arch = "wasm32")]
pub fn copy_to_clipboard(text: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.navigator().clipboard().write_text(text);
    }
}
