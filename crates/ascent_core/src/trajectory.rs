use crate::drag::DragModel;
use crate::error::IntegrationError;
use crate::rocket::{RocketParams, STATE_DIM};
use crate::solvers::RK4;
use crate::traits::Steppable;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// How the time grid treats a remainder when `t_end - t0` is not a multiple
/// of `dt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridPolicy {
    /// Nodes `t0 + i*dt` for `i < floor((t_end - t0)/dt) + 1`. The last node
    /// may fall short of `t_end`.
    #[default]
    Truncate,
    /// As `Truncate`, plus one shorter final step landing exactly on `t_end`
    /// when the remainder is larger than `1e-9 * dt`.
    LandOnEnd,
}

/// Time interval and step of one integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    pub t0: f64,
    pub t_end: f64,
    pub dt: f64,
    #[serde(default)]
    pub grid: GridPolicy,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            t0: 0.0,
            t_end: 10.0,
            dt: 0.01,
            grid: GridPolicy::Truncate,
        }
    }
}

// Remainders below this fraction of dt are rounding noise, not a real tail.
const TAIL_TOLERANCE: f64 = 1e-9;

/// Largest number of grid nodes a run may request. One more than this would
/// not fit in a single `Vec<f64>`.
pub const MAX_NODES: usize = isize::MAX as usize / std::mem::size_of::<f64>() - 1;

impl IntegrationSettings {
    pub fn new(t0: f64, t_end: f64, dt: f64) -> Self {
        Self {
            t0,
            t_end,
            dt,
            grid: GridPolicy::Truncate,
        }
    }

    pub fn with_grid(mut self, grid: GridPolicy) -> Self {
        self.grid = grid;
        self
    }

    pub fn validate(&self) -> Result<(), IntegrationError> {
        if !(self.dt > 0.0) {
            return Err(IntegrationError::invalid(format!(
                "time step dt must be positive, got {}",
                self.dt
            )));
        }
        if !(self.t_end > self.t0) {
            return Err(IntegrationError::invalid(format!(
                "t_end ({}) must be greater than t0 ({})",
                self.t_end, self.t0
            )));
        }
        if !self.t0.is_finite() || !self.t_end.is_finite() || !self.dt.is_finite() {
            return Err(IntegrationError::invalid(
                "t0, t_end and dt must be finite",
            ));
        }
        self.regular_steps().map(|_| ())
    }

    // floor((t_end - t0)/dt), bounded so that the node count and an optional
    // tail node still fit in memory.
    fn regular_steps(&self) -> Result<usize, IntegrationError> {
        let steps = ((self.t_end - self.t0) / self.dt).floor();
        if !steps.is_finite() || steps >= (MAX_NODES - 1) as f64 {
            return Err(IntegrationError::invalid(format!(
                "grid from t0 = {} to t_end = {} with dt = {} needs more than {} nodes",
                self.t0, self.t_end, self.dt, MAX_NODES
            )));
        }
        Ok(steps as usize)
    }

    /// Number of regular nodes, `floor((t_end - t0)/dt) + 1`.
    pub fn step_count(&self) -> Result<usize, IntegrationError> {
        self.validate()?;
        self.regular_steps()?
            .checked_add(1)
            .ok_or_else(|| IntegrationError::invalid("node count overflows usize"))
    }

    /// Time nodes of the integration, honouring `grid`.
    pub fn time_grid(&self) -> Result<Vec<f64>, IntegrationError> {
        Ok(self.build_grid()?.0)
    }

    /// Nodes plus the size of the last step (`dt` unless a tail was added).
    fn build_grid(&self) -> Result<(Vec<f64>, f64), IntegrationError> {
        let n = self.step_count()?;
        let mut nodes: Vec<f64> = (0..n).map(|i| self.t0 + i as f64 * self.dt).collect();

        let last = nodes[n - 1];
        let remainder = self.t_end - last;
        if remainder <= TAIL_TOLERANCE * self.dt {
            return Ok((nodes, self.dt));
        }

        match self.grid {
            GridPolicy::Truncate => {
                trace!(remainder, last, t_end = self.t_end, "time grid stops short of t_end");
                Ok((nodes, self.dt))
            }
            GridPolicy::LandOnEnd => {
                nodes.push(self.t_end);
                Ok((nodes, remainder))
            }
        }
    }
}

/// Sampled solution: four sequences of equal length indexed by step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub h: Vec<f64>,
    pub v: Vec<f64>,
    pub m: Vec<f64>,
}

impl Trajectory {
    fn zeroed(t: Vec<f64>) -> Self {
        let n = t.len();
        Self {
            t,
            h: vec![0.0; n],
            v: vec![0.0; n],
            m: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// `(h, v, m)` at step `i`.
    pub fn state(&self, i: usize) -> Option<[f64; STATE_DIM]> {
        Some([*self.h.get(i)?, *self.v.get(i)?, *self.m.get(i)?])
    }

    pub fn final_state(&self) -> Option<[f64; STATE_DIM]> {
        self.state(self.len().checked_sub(1)?)
    }

    /// First step at which the mass is no longer positive.
    pub fn depletion_index(&self) -> Option<usize> {
        self.m.iter().position(|&m| m <= 0.0)
    }

    /// `(t, h)` at the highest sampled altitude.
    pub fn apogee(&self) -> Option<(f64, f64)> {
        self.h
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &h)| (self.t[i], h))
    }

    /// `[t, h]` pairs for an altitude plot.
    pub fn altitude_series(&self) -> Vec<[f64; 2]> {
        self.t.iter().zip(&self.h).map(|(&t, &h)| [t, h]).collect()
    }

    /// `[t, v]` pairs for a velocity plot.
    pub fn velocity_series(&self) -> Vec<[f64; 2]> {
        self.t.iter().zip(&self.v).map(|(&t, &v)| [t, v]).collect()
    }

    /// One row per step, columns `t, h, v, m`.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.len(), 4, |row, col| match col {
            0 => self.t[row],
            1 => self.h[row],
            2 => self.v[row],
            _ => self.m[row],
        })
    }
}

/// Integrates the vertical rocket model with RK4 on a fixed grid.
///
/// Settings are validated before anything is allocated. Once the mass at a
/// node is `<= 0` the remaining nodes hold that altitude with zero velocity
/// and zero mass, and the stepper is not called again.
pub fn integrate_vertical_rocket<D: DragModel>(
    settings: &IntegrationSettings,
    initial: [f64; STATE_DIM],
    params: &RocketParams<D>,
) -> Result<Trajectory, IntegrationError> {
    let (grid, last_step) = settings.build_grid()?;
    let n = grid.len();

    debug!(
        steps = n,
        dt = settings.dt,
        grid = ?settings.grid,
        "integrating vertical rocket"
    );

    let mut traj = Trajectory::zeroed(grid);
    let [h0, v0, m0] = initial;
    traj.h[0] = h0;
    traj.v[0] = v0;
    traj.m[0] = m0;

    let mut solver = RK4::new(STATE_DIM);
    let mut warned_non_finite = false;

    for i in 0..n - 1 {
        if traj.m[i] <= 0.0 {
            let frozen = traj.h[i];
            debug!(index = i, t = traj.t[i], altitude = frozen, "mass depleted, freezing state");
            traj.h[i + 1..].fill(frozen);
            traj.v[i + 1..].fill(0.0);
            traj.m[i + 1..].fill(0.0);
            break;
        }

        let step = if i + 2 == n { last_step } else { settings.dt };
        let mut t = traj.t[i];
        let mut state = [traj.h[i], traj.v[i], traj.m[i]];
        solver.step(params, &mut t, &mut state, step);

        if !warned_non_finite && state.iter().any(|x| !x.is_finite()) {
            warn!(index = i + 1, t = traj.t[i + 1], ?state, "integration produced a non-finite state");
            warned_non_finite = true;
        }

        traj.h[i + 1] = state[0];
        traj.v[i + 1] = state[1];
        traj.m[i + 1] = state[2];
    }

    Ok(traj)
}

/// Positional form of [`integrate_vertical_rocket`] with the reference grid.
pub fn integrate<D: DragModel>(
    t0: f64,
    t_end: f64,
    dt: f64,
    h0: f64,
    v0: f64,
    m0: f64,
    params: &RocketParams<D>,
) -> Result<Trajectory, IntegrationError> {
    integrate_vertical_rocket(&IntegrationSettings::new(t0, t_end, dt), [h0, v0, m0], params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rocket::{rocket_rhs, G0};
    use approx::assert_relative_eq;

    fn vehicle() -> RocketParams {
        RocketParams::new(2000.0, G0, 1.0)
    }

    /// Straight transcription of the reference scheme, used to pin the
    /// driver to bit-identical output.
    fn reference_rk4(t0: f64, dt: f64, n: usize, y0: [f64; 3], params: &RocketParams) -> Vec<[f64; 3]> {
        let f = |t: f64, y: [f64; 3]| rocket_rhs(t, y, params).to_array();
        let axpy = |y: [f64; 3], a: f64, k: [f64; 3]| [y[0] + a * k[0], y[1] + a * k[1], y[2] + a * k[2]];
        let mut out = vec![y0];
        for i in 0..n - 1 {
            let y = out[i];
            if y[2] <= 0.0 {
                let frozen = [y[0], 0.0, 0.0];
                out.resize(n, frozen);
                break;
            }
            let ti = t0 + i as f64 * dt;
            let k1 = f(ti, y);
            let k2 = f(ti + 0.5 * dt, axpy(y, 0.5 * dt, k1));
            let k3 = f(ti + 0.5 * dt, axpy(y, 0.5 * dt, k2));
            let k4 = f(ti + dt, axpy(y, dt, k3));
            let mut next = [0.0; 3];
            for j in 0..3 {
                next[j] = y[j] + (dt / 6.0) * (k1[j] + 2.0 * k2[j] + 2.0 * k3[j] + k4[j]);
            }
            out.push(next);
        }
        out
    }

    #[test]
    fn sequences_share_length_and_start_at_initial_state() {
        let traj = integrate(0.0, 5.0, 0.1, 12.0, 3.0, 100.0, &vehicle()).expect("valid input");
        let n = (5.0f64 / 0.1).floor() as usize + 1;
        assert_eq!(traj.len(), n);
        assert_eq!(traj.h.len(), n);
        assert_eq!(traj.v.len(), n);
        assert_eq!(traj.m.len(), n);
        assert_eq!(traj.state(0), Some([12.0, 3.0, 100.0]));
        assert_eq!(traj.t[0], 0.0);
    }

    #[test]
    fn time_grid_truncates_remainder() {
        let settings = IntegrationSettings::new(0.0, 1.05, 0.1);
        let grid = settings.time_grid().expect("valid settings");
        assert_eq!(grid.len(), 11);
        assert_relative_eq!(grid[10], 1.0);
        for (i, t) in grid.iter().enumerate() {
            assert_eq!(*t, 0.0 + i as f64 * 0.1);
        }
    }

    #[test]
    fn land_on_end_adds_a_short_final_step() {
        let settings = IntegrationSettings::new(0.0, 1.05, 0.1).with_grid(GridPolicy::LandOnEnd);
        let grid = settings.time_grid().expect("valid settings");
        assert_eq!(grid.len(), 12);
        assert_eq!(*grid.last().unwrap(), 1.05);

        let coast = RocketParams::new(0.0, 0.0, 0.0);
        let traj = integrate_vertical_rocket(&settings, [0.0, 2.0, 1.0], &coast).expect("valid input");
        assert_relative_eq!(*traj.h.last().unwrap(), 2.1, epsilon = 1e-12);
    }

    #[test]
    fn land_on_end_ignores_exact_multiples() {
        let settings = IntegrationSettings::new(0.0, 1.0, 0.25).with_grid(GridPolicy::LandOnEnd);
        assert_eq!(settings.time_grid().expect("valid settings").len(), 5);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let params = vehicle();
        for (t0, t_end, dt) in [
            (0.0, 1.0, 0.0),
            (0.0, 1.0, -0.1),
            (0.0, 1.0, f64::NAN),
            (1.0, 1.0, 0.1),
            (2.0, 1.0, 0.1),
            (0.0, f64::INFINITY, 0.1),
        ] {
            let result = integrate(t0, t_end, dt, 0.0, 0.0, 10.0, &params);
            assert!(
                matches!(result, Err(IntegrationError::InvalidInput { .. })),
                "expected InvalidInput for t0={t0}, t_end={t_end}, dt={dt}"
            );
        }
    }

    #[test]
    fn oversized_grids_are_rejected_before_allocation() {
        let params = vehicle();
        let tiny_dt = integrate(0.0, 1.0, 1e-300, 0.0, 0.0, 10.0, &params);
        assert!(matches!(tiny_dt, Err(IntegrationError::InvalidInput { .. })));

        // The span itself overflows to infinity.
        let huge_span = IntegrationSettings::new(-1e308, 1e308, 1.0);
        assert!(matches!(
            huge_span.step_count(),
            Err(IntegrationError::InvalidInput { .. })
        ));
        assert!(huge_span.time_grid().is_err());

        let too_many = IntegrationSettings::new(0.0, 10.0, 1e-18)
            .with_grid(GridPolicy::LandOnEnd);
        assert!(too_many.validate().is_err());

        let big_but_fine = IntegrationSettings::new(0.0, 1e6, 1.0);
        assert_eq!(big_but_fine.step_count(), Ok(1_000_001));
    }

    #[test]
    fn mass_decreases_linearly_without_depletion() {
        let params = RocketParams::new(500.0, G0, 0.5);
        let dt = 0.05;
        let traj = integrate(0.0, 4.0, dt, 0.0, 0.0, 10.0, &params).expect("valid input");
        assert!(traj.depletion_index().is_none());
        for (i, m) in traj.m.iter().enumerate() {
            assert_relative_eq!(*m, 10.0 - i as f64 * 0.5 * dt, epsilon = 1e-12);
        }
    }

    #[test]
    fn ballistic_coast_without_forces() {
        let params = RocketParams::new(0.0, 0.0, 0.0);
        let dt = 0.2;
        let traj = integrate(0.0, 3.0, dt, 5.0, 7.0, 1.0, &params).expect("valid input");
        for i in 0..traj.len() {
            assert_eq!(traj.v[i], 7.0);
            assert_relative_eq!(traj.h[i], 5.0 + i as f64 * dt * 7.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn depletion_freezes_remaining_steps() {
        let params = RocketParams::new(30.0, G0, 1.0);
        let traj = integrate(0.0, 3.0, 0.3, 0.0, 0.0, 1.0, &params).expect("valid input");
        let k = traj.depletion_index().expect("mass must run out");
        assert!(k < traj.len() - 1, "depletion should happen mid-grid");
        assert!(traj.m[k] <= 0.0);
        for j in k + 1..traj.len() {
            assert_eq!(traj.h[j], traj.h[k]);
            assert_eq!(traj.v[j], 0.0);
            assert_eq!(traj.m[j], 0.0);
        }
        // Everything before the crossing still has propellant.
        assert!(traj.m[..k].iter().all(|&m| m > 0.0));
    }

    #[test]
    fn zero_initial_mass_freezes_immediately() {
        let traj = integrate(0.0, 1.0, 0.1, 42.0, 9.0, 0.0, &vehicle()).expect("valid input");
        assert_eq!(traj.state(0), Some([42.0, 9.0, 0.0]));
        for i in 1..traj.len() {
            assert_eq!(traj.state(i), Some([42.0, 0.0, 0.0]));
        }
    }

    #[test]
    fn matches_reference_scheme_bit_for_bit() {
        let params = RocketParams::new(1500.0, G0, 2.0);
        let (t0, dt) = (0.5, 0.07);
        let settings = IntegrationSettings::new(t0, 60.0, dt);
        let n = settings.step_count().expect("valid settings");
        let traj = integrate_vertical_rocket(&settings, [10.0, 0.0, 80.0], &params).expect("valid input");
        let reference = reference_rk4(t0, dt, n, [10.0, 0.0, 80.0], &params);
        assert!(traj.depletion_index().is_some(), "scenario should cover the freeze");
        for (i, expected) in reference.iter().enumerate() {
            assert_eq!(traj.state(i), Some(*expected), "mismatch at step {i}");
        }
    }

    #[test]
    fn drag_lowers_apogee() {
        let settings = IntegrationSettings::new(0.0, 120.0, 0.01);
        let bare = vehicle();
        let draggy = vehicle().with_drag(|_t: f64, _h: f64, v: f64, _m: f64| 0.02 * v * v.abs());
        let a = integrate_vertical_rocket(&settings, [0.0, 0.0, 100.0], &bare).expect("valid input");
        let b = integrate_vertical_rocket(&settings, [0.0, 0.0, 100.0], &draggy).expect("valid input");
        let (_, apogee_bare) = a.apogee().expect("non-empty");
        let (_, apogee_drag) = b.apogee().expect("non-empty");
        assert!(apogee_drag < apogee_bare, "{apogee_drag} should be below {apogee_bare}");
    }

    #[test]
    #[should_panic(expected = "drag model failure")]
    fn drag_panics_reach_the_caller() {
        let params = vehicle().with_drag(|t: f64, _h: f64, _v: f64, _m: f64| {
            if t > 0.25 {
                panic!("drag model failure");
            }
            0.0
        });
        let _ = integrate(0.0, 1.0, 0.1, 0.0, 0.0, 50.0, &params);
    }

    #[test]
    fn plotting_views_line_up_with_sequences() {
        let traj = integrate(0.0, 1.0, 0.5, 1.0, 2.0, 10.0, &vehicle()).expect("valid input");
        let altitude = traj.altitude_series();
        let velocity = traj.velocity_series();
        assert_eq!(altitude.len(), traj.len());
        assert_eq!(altitude[2], [traj.t[2], traj.h[2]]);
        assert_eq!(velocity[1], [traj.t[1], traj.v[1]]);

        let matrix = traj.to_matrix();
        assert_eq!(matrix.shape(), (3, 4));
        assert_eq!(matrix[(1, 0)], traj.t[1]);
        assert_eq!(matrix[(2, 3)], traj.m[2]);
        assert_eq!(traj.final_state(), traj.state(2));
    }
}
