use crate::{
    drag::DragModel,
    rocket::{RocketParams, STATE_DIM},
    solvers::RK4,
    trajectory::{integrate_vertical_rocket, GridPolicy, IntegrationSettings},
    traits::{DynamicalSystem, Steppable},
};
use anyhow::{anyhow, bail, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Step sizes `base_dt, base_dt/2, ...` for `levels` runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceSettings {
    pub base_dt: f64,
    pub levels: usize,
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        Self {
            base_dt: 0.1,
            levels: 4,
        }
    }
}

impl ConvergenceSettings {
    fn validate(&self) -> Result<()> {
        if !(self.base_dt > 0.0) || !self.base_dt.is_finite() {
            bail!("Base step size must be positive and finite.");
        }
        if self.levels < 2 {
            bail!("A convergence study needs at least two levels.");
        }
        Ok(())
    }

    pub fn step_sizes(&self) -> Vec<f64> {
        (0..self.levels)
            .map(|k| self.base_dt / 2f64.powi(k as i32))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConvergenceLevel {
    pub dt: f64,
    /// Max-norm error of the state at `t_end`.
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    pub levels: Vec<ConvergenceLevel>,
    /// Slope of the least-squares fit of `ln(error)` against `ln(dt)`.
    pub observed_order: f64,
}

impl ConvergenceReport {
    /// `error[k] / error[k + 1]`; about 16 for a fourth-order scheme.
    pub fn error_ratios(&self) -> Vec<f64> {
        self.levels
            .windows(2)
            .map(|pair| pair[0].error / pair[1].error)
            .collect()
    }
}

/// Integrates `system` from `t0` to exactly `t_end` with RK4, shortening the
/// last step if `dt` does not divide the interval.
pub fn integrate_to<S: DynamicalSystem<f64>>(
    system: &S,
    initial: &[f64],
    t0: f64,
    t_end: f64,
    dt: f64,
) -> Result<Vec<f64>> {
    if initial.len() != system.dimension() {
        bail!("Initial state dimension mismatch.");
    }
    if !(dt > 0.0) || !(t_end > t0) {
        bail!("Need dt > 0 and t_end > t0.");
    }

    let steps = ((t_end - t0) / dt - 1e-9).ceil().max(1.0) as usize;
    let mut solver = RK4::new(initial.len());
    let mut state = initial.to_vec();
    for i in 0..steps {
        let mut t = t0 + i as f64 * dt;
        let h = if i + 1 == steps { t_end - t } else { dt };
        solver.step(system, &mut t, &mut state, h);
    }
    Ok(state)
}

/// Runs RK4 at each level of `settings` and measures the error against the
/// known state `exact` at `t_end`.
pub fn convergence_study<S: DynamicalSystem<f64>>(
    system: &S,
    initial: &[f64],
    t0: f64,
    t_end: f64,
    settings: &ConvergenceSettings,
    exact: &[f64],
) -> Result<ConvergenceReport> {
    settings.validate()?;
    if exact.len() != initial.len() {
        bail!("Exact solution has the wrong dimension.");
    }

    let mut levels = Vec::with_capacity(settings.levels);
    for dt in settings.step_sizes() {
        let state = integrate_to(system, initial, t0, t_end, dt)?;
        levels.push(ConvergenceLevel {
            dt,
            error: max_abs_diff(&state, exact),
        });
    }
    report(levels)
}

/// Convergence of the rocket trajectory at `t_end`. The reference is a run at
/// a quarter of the finest step. Depletion inside the interval introduces a
/// kink in the solution and lowers the observed order.
pub fn rocket_convergence<D: DragModel>(
    params: &RocketParams<D>,
    initial: [f64; STATE_DIM],
    t0: f64,
    t_end: f64,
    settings: &ConvergenceSettings,
) -> Result<ConvergenceReport> {
    settings.validate()?;
    if let Some(burnout) = params.depletion_time(initial[2]) {
        if t0 + burnout < t_end {
            warn!(burnout, t_end, "propellant runs out inside the study interval");
        }
    }
    let dts = settings.step_sizes();
    let finest = dts[dts.len() - 1];

    let final_state = |dt: f64| -> Result<[f64; STATE_DIM]> {
        let run = IntegrationSettings::new(t0, t_end, dt).with_grid(GridPolicy::LandOnEnd);
        integrate_vertical_rocket(&run, initial, params)?
            .final_state()
            .ok_or_else(|| anyhow!("Integration produced an empty trajectory."))
    };

    let reference = final_state(finest / 4.0)?;
    let mut levels = Vec::with_capacity(dts.len());
    for dt in dts {
        levels.push(ConvergenceLevel {
            dt,
            error: max_abs_diff(&final_state(dt)?, &reference),
        });
    }
    report(levels)
}

/// Least-squares slope of `ln(error)` against `ln(dt)`.
pub fn fit_order(dts: &[f64], errors: &[f64]) -> Result<f64> {
    if dts.len() != errors.len() {
        bail!("Step sizes and errors must have the same length.");
    }
    if dts.len() < 2 {
        bail!("At least two points are needed to fit an order.");
    }
    if dts.iter().chain(errors).any(|&x| !(x > 0.0) || !x.is_finite()) {
        bail!("Step sizes and errors must be positive and finite.");
    }
    if dts.iter().all(|&dt| dt == dts[0]) {
        bail!("Step sizes are degenerate; cannot fit an order.");
    }

    let n = dts.len();
    let a = DMatrix::from_fn(n, 2, |i, j| if j == 0 { dts[i].ln() } else { 1.0 });
    let b = DVector::from_iterator(n, errors.iter().map(|e| e.ln()));
    let at = a.transpose();
    let coeffs = (&at * &a)
        .lu()
        .solve(&(&at * &b))
        .ok_or_else(|| anyhow!("Step sizes are degenerate; cannot fit an order."))?;
    Ok(coeffs[0])
}

fn report(levels: Vec<ConvergenceLevel>) -> Result<ConvergenceReport> {
    let dts: Vec<f64> = levels.iter().map(|l| l.dt).collect();
    let errors: Vec<f64> = levels.iter().map(|l| l.error).collect();
    let observed_order = fit_order(&dts, &errors)?;
    debug!(?errors, observed_order, "convergence study finished");
    Ok(ConvergenceReport {
        levels,
        observed_order,
    })
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
