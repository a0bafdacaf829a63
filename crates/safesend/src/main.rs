//! SafeSend: wallet connection and network reconciliation for the SafeSend DApp

mod app;
mod ui;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting SafeSend");

    let controller = app::build_controller(safesend_adapters::WalletConfig::from_env())?;

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("SafeSend")
            .with_inner_size([720.0, 520.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native(
        "SafeSend",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::App::new(cc, controller)))),
    )
    .map_err(|e| eyre::eyre!("eframe exited with an error: {e}"))
}

#[cfg(target_arch = "wasm32")]
fn main() {
    tracing_wasm::set_as_global_default();

    wasm_bindgen_futures::spawn_local(async {
        if let Err(e) = start_web().await {
            tracing::error!(error = ?e, "failed to start SafeSend");
        }
    });
}

#[cfg(target_arch = "wasm32")]
async fn start_web() -> Result<(), wasm_bindgen::JsValue> {
    use wasm_bindgen::{JsCast, JsValue};

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let canvas = document
        .get_element_by_id("safesend_canvas")
        .ok_or_else(|| JsValue::from_str("missing #safesend_canvas"))?
        .dyn_into::<web_sys::HtmlCanvasElement>()
        .map_err(JsValue::from)?;

    let controller = app::build_controller(safesend_adapters::WalletConfig::from_env())
        .map_err(|e| JsValue::from_str(&format!("{e:#}")))?;

    eframe::WebRunner::new()
        .start(
            canvas,
            eframe::WebOptions::default(),
            Box::new(move |cc| Ok(Box::new(app::App::new(cc, controller)))),
        )
        .await
}
