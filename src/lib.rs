// ==================== Imports ====================
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsValue;

#[macro_use]
mod browser;
pub mod engine;
pub mod game;

use engine::GameLoop;
use game::DodgeTheDrop;

// ==================== Main Functions ====================
/// Main entry for the Webassembly module
/// - sizes the canvas and keeps it sized on resize
/// - starts the game loop once assets are loaded
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    // setup better panic messages for debugging
    console_error_panic_hook::set_once();

    browser::install_resize_handler()
        .map_err(|err| JsValue::from_str(&format!("Error sizing canvas : {:#?}", err)))?;

    // spawns a new asynchronous task in the local thread, for the web
    // assembly environment, using wasm_bindgen_futures
    browser::spawn_local(async move {
        GameLoop::start(DodgeTheDrop::new())
            .await
            .expect("Could not start game loop");
    });

    Ok(())
}
