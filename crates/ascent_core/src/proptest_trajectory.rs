//! Property-based tests for the trajectory driver using proptest.
//!
//! These check the structural invariants of the output across a wide range
//! of grids and vehicles.

use approx::relative_eq;
use proptest::prelude::*;

use crate::error::IntegrationError;
use crate::rocket::{RocketParams, G0};
use crate::trajectory::{integrate, integrate_vertical_rocket, IntegrationSettings};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// All four sequences have `floor((t_end - t0)/dt) + 1` entries and start
    /// at the initial state.
    #[test]
    fn prop_lengths_and_initial_values(
        t0 in -50.0f64..50.0,
        span in 0.1f64..20.0,
        steps_hint in 5u32..400,
        h0 in -100.0f64..1000.0,
        v0 in -50.0f64..50.0,
        m0 in 0.0f64..500.0,
        thrust in 0.0f64..5000.0,
        mass_flow in 0.0f64..5.0,
    ) {
        let dt = span / steps_hint as f64;
        let t_end = t0 + span;
        let params = RocketParams::new(thrust, G0, mass_flow);
        let traj = integrate(t0, t_end, dt, h0, v0, m0, &params).unwrap();

        let n = ((t_end - t0) / dt).floor() as usize + 1;
        prop_assert_eq!(traj.t.len(), n);
        prop_assert_eq!(traj.h.len(), n);
        prop_assert_eq!(traj.v.len(), n);
        prop_assert_eq!(traj.m.len(), n);
        prop_assert_eq!(traj.t[0], t0);
        prop_assert_eq!(traj.h[0], h0);
        prop_assert_eq!(traj.v[0], v0);
        prop_assert_eq!(traj.m[0], m0);
    }

    /// Without depletion the mass is the exact linear solution up to rounding.
    #[test]
    fn prop_mass_is_linear_until_depletion(
        m0 in 10.0f64..1000.0,
        mass_flow in 0.0f64..5.0,
        dt in 0.001f64..0.5,
        span in 0.5f64..1.9,
    ) {
        let params = RocketParams::new(4.0 * m0 * G0, G0, mass_flow);
        let traj = integrate(0.0, span, dt, 0.0, 0.0, m0, &params).unwrap();
        prop_assert!(traj.depletion_index().is_none());
        for (i, &m) in traj.m.iter().enumerate() {
            let exact = m0 - i as f64 * mass_flow * dt;
            prop_assert!(
                relative_eq!(m, exact, epsilon = 1e-9, max_relative = 1e-12),
                "m[{}] = {} but expected {}", i, m, exact
            );
        }
    }

    /// After the first node with `m <= 0` every node is frozen.
    #[test]
    fn prop_depletion_freezes_tail(
        m0 in 0.5f64..20.0,
        mass_flow in 0.5f64..5.0,
        dt in 0.01f64..0.5,
        thrust_ratio in 1.5f64..6.0,
    ) {
        let params = RocketParams::new(thrust_ratio * m0 * G0, G0, mass_flow);
        let burn = m0 / mass_flow;
        let settings = IntegrationSettings::new(0.0, 2.0 * burn + 1.0, dt);
        let traj = integrate_vertical_rocket(&settings, [0.0, 0.0, m0], &params).unwrap();

        let k = traj.depletion_index();
        prop_assert!(k.is_some(), "mass never ran out");
        let k = k.unwrap();
        for j in k + 1..traj.len() {
            prop_assert_eq!(traj.h[j], traj.h[k]);
            prop_assert_eq!(traj.v[j], 0.0);
            prop_assert_eq!(traj.m[j], 0.0);
        }
    }

    /// Non-positive steps and empty intervals are always rejected.
    #[test]
    fn prop_invalid_settings_rejected(
        t0 in -10.0f64..10.0,
        backwards in 0.0f64..10.0,
        dt in -1.0f64..=0.0,
    ) {
        let params = RocketParams::new(100.0, G0, 1.0);
        let bad_dt = integrate(t0, t0 + 1.0, dt, 0.0, 0.0, 1.0, &params);
        let is_invalid = matches!(bad_dt, Err(IntegrationError::InvalidInput { .. }));
        prop_assert!(is_invalid);
        let bad_span = integrate(t0, t0 - backwards, 0.1, 0.0, 0.0, 1.0, &params);
        let is_invalid = matches!(bad_span, Err(IntegrationError::InvalidInput { .. }));
        prop_assert!(is_invalid);
    }
}
