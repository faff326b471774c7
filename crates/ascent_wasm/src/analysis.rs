//! Convergence study runner.

use crate::simulation::WasmRocket;
use ascent_core::analysis::{rocket_convergence, ConvergenceReport, ConvergenceSettings};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

impl WasmRocket {
    pub(crate) fn convergence(
        &self,
        settings: &ConvergenceSettings,
        initial: [f64; 3],
        t0: f64,
        t_end: f64,
    ) -> anyhow::Result<ConvergenceReport> {
        rocket_convergence(&self.params, initial, t0, t_end, settings)
    }
}

#[wasm_bindgen]
impl WasmRocket {
    /// Observed order of the RK4 scheme on this rocket, as a
    /// `{ levels: [{ dt, error }], observed_order }` object.
    pub fn compute_convergence(
        &self,
        settings_val: JsValue,
        h0: f64,
        v0: f64,
        m0: f64,
        t0: f64,
        t_end: f64,
    ) -> Result<JsValue, JsValue> {
        let settings: ConvergenceSettings = from_value(settings_val)
            .map_err(|e| JsValue::from_str(&format!("Invalid convergence settings: {}", e)))?;
        let report = self
            .convergence(&settings, [h0, v0, m0], t0, t_end)
            .map_err(|e| JsValue::from_str(&format!("Convergence study failed: {}", e)))?;
        to_value(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
