//! Rocket construction and trajectory integration exposed to JavaScript.

use anyhow::{Context, Result};
use ascent_core::drag::{ConfiguredDrag, DragConfig};
use ascent_core::rocket::{rocket_rhs, RocketConfig, RocketParams};
use ascent_core::trajectory::{integrate_vertical_rocket, IntegrationSettings, Trajectory};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmRocket {
    pub(crate) params: RocketParams<ConfiguredDrag>,
}

impl WasmRocket {
    pub(crate) fn from_config(config: &RocketConfig) -> Result<WasmRocket> {
        let params = config.build().context("Invalid drag expression")?;
        Ok(WasmRocket { params })
    }

    pub(crate) fn run(
        &self,
        settings: &IntegrationSettings,
        initial: [f64; 3],
    ) -> Result<WasmTrajectory> {
        let inner = integrate_vertical_rocket(settings, initial, &self.params)
            .context("Integration failed")?;
        Ok(WasmTrajectory { inner })
    }
}

fn js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}

#[wasm_bindgen]
impl WasmRocket {
    /// Builds a rocket from a serialized `RocketConfig`.
    #[wasm_bindgen(constructor)]
    pub fn new(config_val: JsValue) -> Result<WasmRocket, JsValue> {
        console_error_panic_hook::set_once();

        let config: RocketConfig = from_value(config_val)
            .map_err(|e| JsValue::from_str(&format!("Invalid rocket config: {}", e)))?;
        WasmRocket::from_config(&config).map_err(js_error)
    }

    pub fn from_parts(
        thrust: f64,
        gravity: f64,
        mass_flow: f64,
        drag_expression: Option<String>,
    ) -> Result<WasmRocket, JsValue> {
        console_error_panic_hook::set_once();

        let config = RocketConfig {
            thrust,
            gravity,
            mass_flow,
            drag: drag_expression.map(|expression| DragConfig {
                expression,
                constants: Default::default(),
            }),
        };
        WasmRocket::from_config(&config).map_err(js_error)
    }

    /// Integrates on the reference grid `t0 + i*dt`.
    pub fn integrate(
        &self,
        t0: f64,
        t_end: f64,
        dt: f64,
        h0: f64,
        v0: f64,
        m0: f64,
    ) -> Result<WasmTrajectory, JsValue> {
        self.run(&IntegrationSettings::new(t0, t_end, dt), [h0, v0, m0])
            .map_err(js_error)
    }

    /// Integrates with a serialized `IntegrationSettings`, grid policy included.
    pub fn integrate_with_settings(
        &self,
        settings_val: JsValue,
        h0: f64,
        v0: f64,
        m0: f64,
    ) -> Result<WasmTrajectory, JsValue> {
        let settings: IntegrationSettings = from_value(settings_val)
            .map_err(|e| JsValue::from_str(&format!("Invalid integration settings: {}", e)))?;
        self.run(&settings, [h0, v0, m0]).map_err(js_error)
    }

    /// `[dh, dv, dm]` at the given time and state.
    pub fn derivative(&self, t: f64, h: f64, v: f64, m: f64) -> Vec<f64> {
        rocket_rhs(t, [h, v, m], &self.params).to_array().to_vec()
    }

    /// Time for mass `m0` to reach zero, if the mass flow is positive.
    pub fn burn_time(&self, m0: f64) -> Option<f64> {
        self.params.depletion_time(m0)
    }

    pub fn thrust_to_weight(&self, m: f64) -> f64 {
        self.params.thrust_to_weight(m)
    }

    pub fn drag_expression(&self) -> Option<String> {
        match &self.params.drag {
            ConfiguredDrag::None => None,
            ConfiguredDrag::Expression(drag) => Some(drag.expression().to_string()),
        }
    }
}

#[wasm_bindgen]
pub struct WasmTrajectory {
    pub(crate) inner: Trajectory,
}

#[wasm_bindgen]
impl WasmTrajectory {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn t(&self) -> Vec<f64> {
        self.inner.t.clone()
    }

    pub fn h(&self) -> Vec<f64> {
        self.inner.h.clone()
    }

    pub fn v(&self) -> Vec<f64> {
        self.inner.v.clone()
    }

    pub fn m(&self) -> Vec<f64> {
        self.inner.m.clone()
    }

    /// Index of the first node with `m <= 0`, if any.
    pub fn depletion_index(&self) -> Option<usize> {
        self.inner.depletion_index()
    }

    /// `[t, h]` of the highest node.
    pub fn apogee(&self) -> Option<Vec<f64>> {
        self.inner.apogee().map(|(t, h)| vec![t, h])
    }

    /// The whole trajectory as a `{ t, h, v, m }` object.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
