//! Application shell: renders the connection state and forwards user intents
//! to the connection controller.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::egui;
use eyre::WrapErr;
use tracing::{error, info, warn};

use safesend_adapters::{ContractAdapter, Eip1193Adapter, WalletConfig};
use safesend_core::{
    ConnectOutcome, ConnectionController, ConnectionPhase, NetworkChange, NetworkRegistry,
    ProviderPort, Reconciliation,
};

use crate::ui;

pub type WalletController = ConnectionController<Eip1193Adapter, ContractAdapter>;

/// Builds the controller from the runtime configuration. A networks file, when
/// configured, replaces the built-in network table.
pub fn build_controller(config: WalletConfig) -> eyre::Result<WalletController> {
    let registry = match &config.networks_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read networks file {}", path.display()))?;
            NetworkRegistry::from_json(&raw)
                .wrap_err_with(|| format!("invalid networks file {}", path.display()))?
        }
        None => NetworkRegistry::builtin().wrap_err("invalid built-in network table")?,
    };
    let registry = match &config.default_network {
        Some(id) => registry
            .with_default(id)
            .wrap_err("SAFESEND_DEFAULT_NETWORK does not name a registered network")?,
        None => registry,
    };
    info!(
        networks = registry.len(),
        ids = ?registry.ids(),
        default = %registry.default_network().id,
        "network registry loaded"
    );

    let provider = Eip1193Adapter::with_config(config);
    Ok(ConnectionController::new(provider, ContractAdapter, registry))
}

pub struct App {
    controller: WalletController,
    /// Trail of the most recent completed reconciliation
    last_reconciliation: Arc<Mutex<Option<Reconciliation>>>,
    show_trail: bool,
}

impl App {
    pub fn new(_cc: &eframe::CreationContext<'_>, controller: WalletController) -> Self {
        Self {
            controller,
            last_reconciliation: Arc::new(Mutex::new(None)),
            show_trail: false,
        }
    }

    fn connect(&self, ctx: &egui::Context) {
        let controller = self.controller.clone();
        let last = Arc::clone(&self.last_reconciliation);
        spawn(ctx, async move {
            match controller.connect().await {
                Ok(ConnectOutcome::Connected { reconciliation, .. }) => {
                    store(&last, reconciliation);
                }
                Ok(ConnectOutcome::Superseded) => {}
                Err(e) => warn!(error = %e, "connect failed"),
            }
        });
    }

    fn select_network(&self, ctx: &egui::Context, id: String) {
        let controller = self.controller.clone();
        let last = Arc::clone(&self.last_reconciliation);
        spawn(ctx, async move {
            match controller.set_active_network(&id).await {
                Ok(NetworkChange::Reconciled(reconciliation)) => store(&last, reconciliation),
                Ok(NetworkChange::Selected | NetworkChange::Superseded) => {}
                Err(e) => warn!(network = %id, error = %e, "network change failed"),
            }
        });
    }

    fn render_header(&self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let Ok(state) = self.controller.snapshot() else {
            ui.label("Connection state unavailable");
            return;
        };

        ui.horizontal(|ui| {
            ui.heading(
                egui::RichText::new("SafeSend")
                    .size(22.0)
                    .color(ui::ACCENT),
            );
            ui.add_space(20.0);
            ui.separator();

            let registry = self.controller.registry();
            let selected = registry
                .resolve(&state.active_network_id)
                .map(|n| n.display_name.clone())
                .unwrap_or_else(|_| state.active_network_id.clone());
            let mut chosen = None;
            egui::ComboBox::from_id_salt("network")
                .selected_text(selected)
                .show_ui(ui, |ui| {
                    for network in registry.iter() {
                        let active = network.id == state.active_network_id;
                        let label = ui.selectable_label(active, network.display_name.as_str());
                        if label.clicked() && !active {
                            chosen = Some(network.id.clone());
                        }
                    }
                });
            if let Some(id) = chosen {
                self.select_network(ctx, id);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                match state.phase {
                    ConnectionPhase::Connected => {
                        if ui.button("Disconnect").clicked() {
                            if let Err(e) = self.controller.disconnect() {
                                error!(error = %e, "disconnect failed");
                            }
                        }
                        if let Some(account) = state.account {
                            if ui::address_with_copy(ui, &account) {
                                ui::copy_to_clipboard(&account.to_string());
                            }
                        }
                    }
                    ConnectionPhase::Connecting => {
                        ui.add_enabled(false, egui::Button::new("Connecting…"));
                        ui.spinner();
                    }
                    ConnectionPhase::Disconnected | ConnectionPhase::Failed => {
                        let label = if self.controller.provider().is_available() {
                            "Connect Wallet"
                        } else {
                            "Install Wallet"
                        };
                        if ui.button(label).clicked() {
                            self.connect(ctx);
                        }
                    }
                }
            });
        });
    }

    fn render_body(&mut self, ui: &mut egui::Ui) {
        let snapshot = self.controller.snapshot();
        let (state, network) = match (snapshot, self.controller.active_network()) {
            (Ok(state), Ok(network)) => (state, network.clone()),
            (Err(e), _) | (_, Err(e)) => {
                ui.label(format!("Connection state unavailable: {e}"));
                return;
            }
        };

        if let Some(notice) = &state.notice {
            ui::notice_label(ui, notice);
            ui.add_space(8.0);
        }

        egui::Grid::new("network_details")
            .num_columns(2)
            .spacing([24.0, 6.0])
            .show(ui, |ui| {
                ui.label(egui::RichText::new("Network").strong());
                ui.label(network.display_name.as_str());
                ui.end_row();

                ui.label(egui::RichText::new("Chain ID").strong());
                ui.label(egui::RichText::new(&network.chain_id).monospace());
                ui.end_row();

                ui.label(egui::RichText::new("Currency").strong());
                ui.label(network.currency.as_str());
                ui.end_row();

                ui.label(egui::RichText::new("Explorer").strong());
                ui.hyperlink_to(network.explorer_url.as_str(), &network.explorer_url);
                ui.end_row();

                ui.label(egui::RichText::new("Transfer type").strong());
                let mut chosen = None;
                egui::ComboBox::from_id_salt("transfer_kind")
                    .selected_text(state.transfer_kind.as_str())
                    .show_ui(ui, |ui| {
                        for kind in network.transfer_kinds.iter() {
                            let active = *kind == state.transfer_kind;
                            if ui.selectable_label(active, kind.as_str()).clicked() && !active {
                                chosen = Some(kind.clone());
                            }
                        }
                    });
                if let Some(kind) = chosen {
                    if let Err(e) = self.controller.set_transfer_kind(kind.as_str()) {
                        error!(error = %e, "transfer kind rejected");
                    }
                }
                ui.end_row();

                ui.label(egui::RichText::new("Contract").strong());
                match &state.contract_handle {
                    Some(handle) => {
                        ui.label(egui::RichText::new(handle.address().to_string()).monospace())
                    }
                    None if state.is_connected() => {
                        ui.label("Not bound: wallet is on another network")
                    }
                    None => ui.label("Not connected"),
                };
                ui.end_row();
            });

        ui.add_space(12.0);
        let last = self
            .last_reconciliation
            .lock()
            .ok()
            .and_then(|guard| guard.clone());
        if let Some(reconciliation) = last {
            ui.checkbox(&mut self.show_trail, "Show last network reconciliation");
            if self.show_trail {
                ui.label(format!(
                    "{}: {:?}",
                    reconciliation.network_id,
                    reconciliation.final_state()
                ));
                for step in &reconciliation.trail {
                    ui.label(
                        egui::RichText::new(format!(
                            "{:?} → {:?} ({})",
                            step.from, step.to, step.reason
                        ))
                        .monospace()
                        .small(),
                    );
                }
            }
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        if let Err(e) = self.controller.sync_provider_events() {
            warn!(error = %e, "failed to apply wallet events");
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            self.render_header(ui, ctx);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(10.0);
            self.render_body(ui);
        });

        // Wallet events arrive outside egui's input loop.
        ctx.request_repaint_after(Duration::from_millis(500));
    }
}

fn store(slot: &Mutex<Option<Reconciliation>>, reconciliation: Reconciliation) {
    if let Ok(mut guard) = slot.lock() {
        *guard = Some(reconciliation);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn<F>(ctx: &egui::Context, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let ctx = ctx.clone();
    std::thread::spawn(move || {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(task),
            Err(e) => error!(error = %e, "failed to start async runtime"),
        }
        ctx.request_repaint();
    });
}

#[cfg(target_arch = "wasm32")]
fn spawn<F>(ctx: &egui::Context, task: F)
where
    F: Future<Output = ()> + 'static,
{
    let ctx = ctx.clone();
    wasm_bindgen_futures::spawn_local(async move {
        task.await;
        ctx.request_repaint();
    });
}
