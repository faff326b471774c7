mod analysis;
mod simulation;

pub use simulation::{WasmRocket, WasmTrajectory};

use ascent_core::rocket;
use ascent_core::symbolic::{tsiolkovsky_delta_v, vertical_rocket_equations};
use wasm_bindgen::prelude::*;

/// Ideal delta-v `isp * g0 * ln(m0 / mf)`.
#[wasm_bindgen]
pub fn delta_v(isp: f64, g0: f64, m0: f64, mf: f64) -> f64 {
    rocket::delta_v(isp, g0, m0, mf)
}

#[wasm_bindgen]
pub fn standard_gravity() -> f64 {
    rocket::G0
}

/// The model relations rendered as `dX/dt = ...` strings, for display.
#[wasm_bindgen]
pub fn model_equations() -> Vec<String> {
    vertical_rocket_equations()
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[wasm_bindgen]
pub fn delta_v_equation() -> String {
    format!("dv = {}", tsiolkovsky_delta_v())
}
