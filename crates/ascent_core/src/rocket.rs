use crate::drag::{ConfiguredDrag, DragModel, DragConfig, NoDrag};
use crate::error::ExpressionError;
use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};

/// Standard gravity, m/s^2.
pub const G0: f64 = 9.80665;

/// Dimension of the `(h, v, m)` state vector.
pub const STATE_DIM: usize = 3;

/// Immutable inputs of the vertical rocket model.
#[derive(Debug, Clone)]
pub struct RocketParams<D = NoDrag> {
    /// Thrust T (force).
    pub thrust: f64,
    /// Gravitational acceleration g, positive downward.
    pub gravity: f64,
    /// Propellant mass flow mdot, so that dm/dt = -mdot.
    pub mass_flow: f64,
    /// Drag force D(t, h, v, m).
    pub drag: D,
}

impl RocketParams<NoDrag> {
    pub fn new(thrust: f64, gravity: f64, mass_flow: f64) -> Self {
        Self {
            thrust,
            gravity,
            mass_flow,
            drag: NoDrag,
        }
    }
}

impl<D: DragModel> RocketParams<D> {
    /// Replaces the drag model, keeping T, g and mdot.
    pub fn with_drag<E: DragModel>(self, drag: E) -> RocketParams<E> {
        RocketParams {
            thrust: self.thrust,
            gravity: self.gravity,
            mass_flow: self.mass_flow,
            drag,
        }
    }

    /// Time at which the mass reaches zero from `m0`, if it ever does.
    pub fn depletion_time(&self, m0: f64) -> Option<f64> {
        (self.mass_flow > 0.0).then(|| m0 / self.mass_flow)
    }

    /// Thrust-to-weight ratio at mass `m`.
    pub fn thrust_to_weight(&self, m: f64) -> f64 {
        self.thrust / (m * self.gravity)
    }
}

/// Serializable form of [`RocketParams`] for callers outside Rust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocketConfig {
    pub thrust: f64,
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    pub mass_flow: f64,
    #[serde(default)]
    pub drag: Option<DragConfig>,
}

fn default_gravity() -> f64 {
    G0
}

impl RocketConfig {
    pub fn build(&self) -> Result<RocketParams<ConfiguredDrag>, ExpressionError> {
        let drag = ConfiguredDrag::from_config(self.drag.as_ref())?;
        Ok(RocketParams::new(self.thrust, self.gravity, self.mass_flow).with_drag(drag))
    }
}

/// Time derivative of the `(h, v, m)` state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Derivative {
    pub dh: f64,
    pub dv: f64,
    pub dm: f64,
}

impl Derivative {
    pub const ZERO: Derivative = Derivative {
        dh: 0.0,
        dv: 0.0,
        dm: 0.0,
    };

    pub fn to_array(self) -> [f64; STATE_DIM] {
        [self.dh, self.dv, self.dm]
    }
}

/// Equations of motion of the vertical point-mass rocket:
///
/// ```text
/// dh/dt = v
/// dv/dt = (T - D(t, h, v, m) - m*g) / m
/// dm/dt = -mdot
/// ```
///
/// A spent rocket (`m <= 0`) is frozen: the derivative is zero and the drag
/// model is not consulted.
pub fn rocket_rhs<D: DragModel>(
    t: f64,
    state: [f64; STATE_DIM],
    params: &RocketParams<D>,
) -> Derivative {
    let [h, v, m] = state;

    if m <= 0.0 {
        return Derivative::ZERO;
    }

    let drag = params.drag.drag(t, h, v, m);

    Derivative {
        dh: v,
        dv: (params.thrust - drag - m * params.gravity) / m,
        dm: -params.mass_flow,
    }
}

impl<D: DragModel> DynamicalSystem<f64> for RocketParams<D> {
    fn dimension(&self) -> usize {
        STATE_DIM
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let d = rocket_rhs(t, [x[0], x[1], x[2]], self);
        out.copy_from_slice(&d.to_array());
    }
}

/// Ideal delta-v: `isp * g0 * ln(m0 / mf)`.
///
/// `mf < m0` is the physical case; other inputs are not rejected.
pub fn delta_v(isp: f64, g0: f64, m0: f64, mf: f64) -> f64 {
    isp * g0 * (m0 / mf).ln()
}
