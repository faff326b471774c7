//! Drag models injected into the rocket right-hand side.
//!
//! A drag model is any pure function `(t, h, v, m) -> force`. Closures work
//! directly; [`NoDrag`] is the default and contributes exactly zero.

use crate::equation_engine::{compile_expression, Bytecode, Compiler, Expr, VM};
use crate::error::ExpressionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Force opposing the thrust, evaluated once per RHS call.
///
/// Implementations must be safe to call repeatedly. If trajectories are
/// integrated on several threads with shared parameters the model must also
/// be `Sync`.
pub trait DragModel {
    fn drag(&self, t: f64, h: f64, v: f64, m: f64) -> f64;
}

/// No aerodynamic force at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoDrag;

impl DragModel for NoDrag {
    #[inline]
    fn drag(&self, _t: f64, _h: f64, _v: f64, _m: f64) -> f64 {
        0.0
    }
}

impl<F> DragModel for F
where
    F: Fn(f64, f64, f64, f64) -> f64,
{
    #[inline]
    fn drag(&self, t: f64, h: f64, v: f64, m: f64) -> f64 {
        self(t, h, v, m)
    }
}

/// Serializable description of an [`ExpressionDrag`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DragConfig {
    /// Expression over `t`, `h`, `v`, `m` and the named constants.
    pub expression: String,
    #[serde(default)]
    pub constants: BTreeMap<String, f64>,
}

const STATE_NAMES: [&str; 3] = ["h", "v", "m"];
const TIME_NAME: &str = "t";

/// Drag force given as a parsed expression, e.g. `0.5 * rho * cd * area * v * abs(v)`.
#[derive(Debug, Clone)]
pub struct ExpressionDrag {
    expr: Expr,
    code: Bytecode,
    constants: Vec<f64>,
    stack_depth: usize,
}

impl ExpressionDrag {
    pub fn new(source: &str) -> Result<Self, ExpressionError> {
        Self::with_constants(source, &BTreeMap::new())
    }

    pub fn with_constants(
        source: &str,
        constants: &BTreeMap<String, f64>,
    ) -> Result<Self, ExpressionError> {
        if let Some(name) = constants
            .keys()
            .find(|name| name.as_str() == TIME_NAME || STATE_NAMES.contains(&name.as_str()))
        {
            return Err(ExpressionError::ReservedName(name.clone()));
        }

        let state_names = STATE_NAMES.map(String::from);
        let constant_names: Vec<String> = constants.keys().cloned().collect();
        let compiler = Compiler::new(&state_names, &constant_names).with_time(TIME_NAME);
        let (expr, code) = compile_expression(source, &compiler)?;
        let stack_depth = code.max_stack_depth();

        Ok(Self {
            expr,
            code,
            constants: constants.values().copied().collect(),
            stack_depth,
        })
    }

    pub fn from_config(config: &DragConfig) -> Result<Self, ExpressionError> {
        Self::with_constants(&config.expression, &config.constants)
    }

    pub fn expression(&self) -> &Expr {
        &self.expr
    }
}

impl DragModel for ExpressionDrag {
    fn drag(&self, t: f64, h: f64, v: f64, m: f64) -> f64 {
        let mut stack = Vec::with_capacity(self.stack_depth);
        VM::execute(&self.code, t, &[h, v, m], &self.constants, &mut stack)
    }
}

/// Drag chosen at runtime from configuration.
#[derive(Debug, Clone, Default)]
pub enum ConfiguredDrag {
    #[default]
    None,
    Expression(ExpressionDrag),
}

impl ConfiguredDrag {
    pub fn from_config(config: Option<&DragConfig>) -> Result<Self, ExpressionError> {
        match config {
            None => Ok(ConfiguredDrag::None),
            Some(config) => ExpressionDrag::from_config(config).map(ConfiguredDrag::Expression),
        }
    }
}

impl DragModel for ConfiguredDrag {
    fn drag(&self, t: f64, h: f64, v: f64, m: f64) -> f64 {
        match self {
            ConfiguredDrag::None => NoDrag.drag(t, h, v, m),
            ConfiguredDrag::Expression(expr) => expr.drag(t, h, v, m),
        }
    }
}
