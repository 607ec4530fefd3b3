// Integrators - Fixed-step explicit schemes advancing [r, v]
// No adaptive control: every step is exactly the requested size (the last may be shorter)

use serde::{Deserialize, Serialize};

use crate::physics_engine::{StateVector, Vector3};

/// Acceleration at time `t` (s from job start) for a given state
pub type Derivative<'a> = dyn Fn(f64, &StateVector) -> Vector3 + 'a;

pub trait Integrator: Send + Sync {
    /// Advance `state` from `t` by `dt`. No validity checks.
    fn step(&self, t: f64, state: &StateVector, dt: f64, acceleration: &Derivative<'_>) -> StateVector;

    fn name(&self) -> &'static str;

    fn order(&self) -> u8;

    /// Step, returning `None` if the new state holds a NaN or Inf
    fn checked_step(
        &self,
        t: f64,
        state: &StateVector,
        dt: f64,
        acceleration: &Derivative<'_>,
    ) -> Option<StateVector> {
        let next = self.step(t, state, dt, acceleration);
        next.is_finite().then_some(next)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorKind {
    #[default]
    Rk4,
    Verlet,
}

impl IntegratorKind {
    pub fn build(self) -> Box<dyn Integrator> {
        match self {
            Self::Rk4 => Box::new(RungeKutta4),
            Self::Verlet => Box::new(VelocityVerlet),
        }
    }
}

// =============================================================================
// CLASSIC RUNGE-KUTTA 4
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct RungeKutta4;

impl Integrator for RungeKutta4 {
    fn step(&self, t: f64, state: &StateVector, dt: f64, acceleration: &Derivative<'_>) -> StateVector {
        let half = dt * 0.5;
        let shifted = |dr: &Vector3, dv: &Vector3, h: f64| {
            StateVector::new(
                state.position.add(&dr.scale(h)),
                state.velocity.add(&dv.scale(h)),
            )
        };

        let k1_r = state.velocity;
        let k1_v = acceleration(t, state);

        let s2 = shifted(&k1_r, &k1_v, half);
        let k2_r = s2.velocity;
        let k2_v = acceleration(t + half, &s2);

        let s3 = shifted(&k2_r, &k2_v, half);
        let k3_r = s3.velocity;
        let k3_v = acceleration(t + half, &s3);

        let s4 = shifted(&k3_r, &k3_v, dt);
        let k4_r = s4.velocity;
        let k4_v = acceleration(t + dt, &s4);

        let weighted = |k1: Vector3, k2: Vector3, k3: Vector3, k4: Vector3| {
            k1.add(&k2.scale(2.0))
                .add(&k3.scale(2.0))
                .add(&k4)
                .scale(dt / 6.0)
        };

        StateVector::new(
            state.position.add(&weighted(k1_r, k2_r, k3_r, k4_r)),
            state.velocity.add(&weighted(k1_v, k2_v, k3_v, k4_v)),
        )
    }

    fn name(&self) -> &'static str {
        "rk4"
    }

    fn order(&self) -> u8 {
        4
    }
}

// =============================================================================
// VELOCITY VERLET (Symplectic)
// =============================================================================

/// x(t+dt) = x(t) + v(t)·dt + ½·a(t)·dt²
/// v(t+dt) = v(t) + ½·(a(t) + a(t+dt))·dt
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityVerlet;

impl Integrator for VelocityVerlet {
    fn step(&self, t: f64, state: &StateVector, dt: f64, acceleration: &Derivative<'_>) -> StateVector {
        let a0 = acceleration(t, state);
        let position = state
            .position
            .add(&state.velocity.scale(dt))
            .add(&a0.scale(dt * dt * 0.5));

        // Drag needs a velocity at t+dt; use the explicit prediction
        let predicted = state.velocity.add(&a0.scale(dt));
        let a1 = acceleration(t + dt, &StateVector::new(position, predicted));
        let velocity = state.velocity.add(&a0.add(&a1).scale(0.5 * dt));

        StateVector::new(position, velocity)
    }

    fn name(&self) -> &'static str {
        "verlet"
    }

    fn order(&self) -> u8 {
        2
    }
}

// =============================================================================
// TESTS
// =============================================================================
