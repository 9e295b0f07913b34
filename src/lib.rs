/// Tabwise - Chrome Extension that groups tabs by topic
/// Built with Rust + WASM + Yew

pub mod auto_organize;
pub mod background;
pub mod chrome;
pub mod classifier;
pub mod environment;
pub mod error;
pub mod grouping;
pub mod snapshot;
pub mod storage;
pub mod tab_data;
pub mod workflow;
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}
