//! Closed-form relations of the vertical rocket as expression trees.
//!
//! These are a readable, checkable statement of the model. The trajectory
//! driver never uses them; [`crate::rocket::rocket_rhs`] is the numerical
//! implementation. [`RocketModel::max_residual`] compares the two.

use crate::drag::DragModel;
use crate::equation_engine::{Bytecode, Compiler, EquationSystem, Expr, VM};
use crate::error::ExpressionError;
use crate::rocket::{rocket_rhs, RocketParams, STATE_DIM};
use anyhow::{bail, Result};
use std::fmt;

/// State variable names, in state-vector order.
pub const STATE_NAMES: [&str; STATE_DIM] = ["h", "v", "m"];

/// Parameter names used by the relations. `D` is the drag force value.
pub const PARAM_NAMES: [&str; 4] = ["T", "D", "g", "mdot"];

/// One equation `d<state>/dt = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub state: &'static str,
    pub rhs: Expr,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}/dt = {}", self.state, self.rhs)
    }
}

/// `dh/dt = v`, `dv/dt = (T - D - m*g)/m`, `dm/dt = -mdot`.
pub fn vertical_rocket_equations() -> [Relation; STATE_DIM] {
    let var = Expr::var;
    [
        Relation {
            state: "h",
            rhs: var("v"),
        },
        Relation {
            state: "v",
            rhs: (var("T") - var("D") - var("m") * var("g")) / var("m"),
        },
        Relation {
            state: "m",
            rhs: -var("mdot"),
        },
    ]
}

/// `Isp * g0 * ln(m0 / mf)`.
pub fn tsiolkovsky_delta_v() -> Expr {
    let var = Expr::var;
    var("Isp") * var("g0") * Expr::call("ln", var("m0") / var("mf"))
}

/// Numerically evaluates [`tsiolkovsky_delta_v`].
pub fn evaluate_delta_v(isp: f64, g0: f64, m0: f64, mf: f64) -> Result<f64, ExpressionError> {
    let names = ["Isp", "g0", "m0", "mf"].map(String::from);
    let code = Compiler::new(&[], &names).compile(&tsiolkovsky_delta_v())?;
    let mut stack = Vec::with_capacity(code.max_stack_depth());
    Ok(VM::execute(&code, 0.0, &[], &[isp, g0, m0, mf], &mut stack))
}

/// The three relations together with their compiled form.
#[derive(Debug, Clone)]
pub struct RocketModel {
    relations: [Relation; STATE_DIM],
    code: Vec<Bytecode>,
}

impl RocketModel {
    pub fn new() -> Result<Self, ExpressionError> {
        let relations = vertical_rocket_equations();
        let vars = STATE_NAMES.map(String::from);
        let params = PARAM_NAMES.map(String::from);
        let compiler = Compiler::new(&vars, &params).with_time("t");
        let code = relations
            .iter()
            .map(|relation| compiler.compile(&relation.rhs))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { relations, code })
    }

    pub fn relations(&self) -> &[Relation; STATE_DIM] {
        &self.relations
    }

    pub fn relation(&self, state: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.state == state)
    }

    /// Binds `T`, `D`, `g` and `mdot` to numbers. Drag is held constant.
    pub fn system(&self, thrust: f64, drag: f64, gravity: f64, mass_flow: f64) -> EquationSystem<f64> {
        EquationSystem::new(self.code.clone(), vec![thrust, drag, gravity, mass_flow])
    }

    /// Evaluates the relations at `(t, state)`, taking `D` from the drag model.
    ///
    /// The relations have no notion of a spent rocket, so `m <= 0` is an error.
    pub fn evaluate<D: DragModel>(
        &self,
        t: f64,
        state: [f64; STATE_DIM],
        params: &RocketParams<D>,
    ) -> Result<[f64; STATE_DIM]> {
        let [h, v, m] = state;
        if m <= 0.0 {
            bail!("Relations are undefined for a spent rocket (m = {m}).");
        }
        let drag = params.drag.drag(t, h, v, m);
        let system = self.system(params.thrust, drag, params.gravity, params.mass_flow);
        let mut out = [0.0; STATE_DIM];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = system.evaluate(i, t, &state);
        }
        Ok(out)
    }

    /// Largest absolute difference between the relations and `rocket_rhs`
    /// over the given `(t, state)` samples.
    pub fn max_residual<D: DragModel>(
        &self,
        params: &RocketParams<D>,
        samples: &[(f64, [f64; STATE_DIM])],
    ) -> Result<f64> {
        if samples.is_empty() {
            bail!("At least one sample point is required.");
        }
        let mut worst = 0.0f64;
        for &(t, state) in samples {
            let symbolic = self.evaluate(t, state, params)?;
            let numeric = rocket_rhs(t, state, params).to_array();
            for (a, b) in symbolic.iter().zip(numeric.iter()) {
                worst = worst.max((a - b).abs());
            }
        }
        Ok(worst)
    }
}
