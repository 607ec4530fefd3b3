// Physics Engine - Orbital Mechanics Primitives
// Vector math, state vectors, Keplerian elements and analytic two-body motion (km, km/s)

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// =============================================================================
// PHYSICAL CONSTANTS (km, s, kg)
// =============================================================================

/// Gravitational constant (km³/(kg·s²))
pub const G_KM: f64 = 6.67430e-20;

/// Astronomical Unit in kilometers
pub const AU_KM: f64 = 1.495978707e8;

/// Sun's gravitational parameter μ = G * M_sun (km³/s²)
pub const MU_SUN: f64 = 1.32712440018e11;

/// Earth's gravitational parameter μ = G * M_earth (km³/s²)
pub const MU_EARTH: f64 = 398600.435507;

/// Earth's J2 coefficient (oblateness perturbation)
pub const J2_EARTH: f64 = 1.08262668e-3;

/// Earth's equatorial radius (km)
pub const R_EARTH: f64 = 6378.1366;

/// Julian date of the J2000 epoch (2000-01-01 12:00 TT)
pub const J2000_JD: f64 = 2451545.0;

pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Mean obliquity of the ecliptic at J2000 (degrees)
pub const OBLIQUITY_J2000_DEG: f64 = 23.439281;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

/// Cartesian vector. Travels on the wire as `[x, y, z]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vector3> for [f64; 3] {
    fn from(v: Vector3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn unit_z() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    pub fn magnitude_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 1e-15 {
            self.scale(1.0 / mag)
        } else {
            Self::zero()
        }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Unit vector from equatorial right ascension / declination (degrees),
    /// rotated into the ecliptic J2000 frame.
    pub fn from_equatorial_pole(ra_deg: f64, dec_deg: f64) -> Self {
        let (ra, dec) = (ra_deg.to_radians(), dec_deg.to_radians());
        let eq = Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin());
        let eps = OBLIQUITY_J2000_DEG.to_radians();
        Vector3::new(
            eq.x,
            eps.cos() * eq.y + eps.sin() * eq.z,
            -eps.sin() * eq.y + eps.cos() * eq.z,
        )
    }
}

// =============================================================================
// STATE VECTOR (Position + Velocity)
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct StateVector {
    pub position: Vector3, // km
    pub velocity: Vector3, // km/s
}

impl StateVector {
    pub fn new(position: Vector3, velocity: Vector3) -> Self {
        Self { position, velocity }
    }

    pub fn zero() -> Self {
        Self {
            position: Vector3::zero(),
            velocity: Vector3::zero(),
        }
    }

    pub fn add(&self, other: &StateVector) -> StateVector {
        StateVector::new(
            self.position.add(&other.position),
            self.velocity.add(&other.velocity),
        )
    }

    pub fn sub(&self, other: &StateVector) -> StateVector {
        StateVector::new(
            self.position.sub(&other.position),
            self.velocity.sub(&other.velocity),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }

    /// Specific orbital energy about a body with parameter `mu`
    pub fn specific_energy(&self, mu: f64) -> f64 {
        let v = self.velocity.magnitude();
        0.5 * v * v - mu / self.position.magnitude()
    }
}

// =============================================================================
// KEPLERIAN ORBITAL ELEMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrbitalElements {
    /// Semi-major axis (km)
    pub semi_major_axis: f64,
    /// Eccentricity (0-1 for elliptical)
    pub eccentricity: f64,
    /// Inclination (radians)
    pub inclination: f64,
    /// Longitude of ascending node (radians)
    pub longitude_ascending_node: f64,
    /// Argument of periapsis (radians)
    pub argument_periapsis: f64,
    /// Mean anomaly at `epoch` (radians)
    pub mean_anomaly: f64,
    /// Epoch (Julian Date)
    pub epoch: f64,
}

impl OrbitalElements {
    /// Build from catalog-style values: km and degrees, mean anomaly at J2000.
    pub fn from_degrees(a: f64, e: f64, i: f64, raan: f64, argp: f64, m0: f64) -> Self {
        Self {
            semi_major_axis: a,
            eccentricity: e,
            inclination: i.to_radians(),
            longitude_ascending_node: raan.to_radians(),
            argument_periapsis: argp.to_radians(),
            mean_anomaly: m0.to_radians(),
            epoch: J2000_JD,
        }
    }

    /// Mean motion (rad/s)
    pub fn mean_motion(&self, mu: f64) -> f64 {
        (mu / self.semi_major_axis.powi(3)).sqrt()
    }

    /// Same orbit with the mean anomaly advanced to `julian_date`
    pub fn at_julian_date(&self, julian_date: f64, mu: f64) -> Self {
        let dt = (julian_date - self.epoch) * SECONDS_PER_DAY;
        let m = (self.mean_anomaly + self.mean_motion(mu) * dt).rem_euclid(2.0 * PI);
        Self {
            mean_anomaly: m,
            epoch: julian_date,
            ..*self
        }
    }

    /// Convert orbital elements to a Cartesian state vector about a body with parameter `mu`
    pub fn to_state_vector(&self, mu: f64) -> StateVector {
        let a = self.semi_major_axis;
        let e = self.eccentricity;

        let eccentric_anomaly = solve_kepler_equation(self.mean_anomaly, e);
        let half = eccentric_anomaly / 2.0;
        let true_anomaly =
            2.0 * ((1.0 + e).sqrt() * half.sin()).atan2((1.0 - e).sqrt() * half.cos());

        // Perifocal frame
        let r = a * (1.0 - e * eccentric_anomaly.cos());
        let (sin_nu, cos_nu) = true_anomaly.sin_cos();
        let x_orb = r * cos_nu;
        let y_orb = r * sin_nu;

        let sqrt_mu_p = (mu / (a * (1.0 - e * e))).sqrt();
        let vx_orb = -sqrt_mu_p * sin_nu;
        let vy_orb = sqrt_mu_p * (e + cos_nu);

        // Perifocal -> inertial rotation (Ω, i, ω)
        let (sin_o, cos_o) = self.longitude_ascending_node.sin_cos();
        let (sin_w, cos_w) = self.argument_periapsis.sin_cos();
        let (sin_i, cos_i) = self.inclination.sin_cos();

        let r11 = cos_o * cos_w - sin_o * sin_w * cos_i;
        let r12 = -cos_o * sin_w - sin_o * cos_w * cos_i;
        let r21 = sin_o * cos_w + cos_o * sin_w * cos_i;
        let r22 = -sin_o * sin_w + cos_o * cos_w * cos_i;
        let r31 = sin_w * sin_i;
        let r32 = cos_w * sin_i;

        let rotate = |px: f64, py: f64| {
            Vector3::new(r11 * px + r12 * py, r21 * px + r22 * py, r31 * px + r32 * py)
        };

        StateVector::new(rotate(x_orb, y_orb), rotate(vx_orb, vy_orb))
    }
}

/// Solve Kepler's equation M = E - e*sin(E) using Newton-Raphson
pub fn solve_kepler_equation(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let mut e_anom = if eccentricity > 0.8 { PI } else { mean_anomaly };
    let tolerance = 1e-12;
    let max_iterations = 50;

    for _ in 0..max_iterations {
        let f = e_anom - eccentricity * e_anom.sin() - mean_anomaly;
        let f_prime = 1.0 - eccentricity * e_anom.cos();
        let delta = f / f_prime;
        e_anom -= delta;

        if delta.abs() < tolerance {
            break;
        }
    }

    e_anom
}

// =============================================================================
// ANALYTIC TWO-BODY MOTION (Lagrange f/g coefficients)
// =============================================================================

/// Advance a relative state along its conic by `dt` seconds.
///
/// Works in eccentric-anomaly differences, so circular and equatorial
/// orbits need no special casing. Returns `None` when the orbit is not
/// elliptic (the caller decides what to do with escape trajectories).
pub fn kepler_propagate(state: &StateVector, mu: f64, dt: f64) -> Option<StateVector> {
    let r0 = state.position.magnitude();
    let v0 = state.velocity.magnitude();
    if mu <= 0.0 || r0 < 1e-12 {
        return None;
    }

    let inv_a = 2.0 / r0 - v0 * v0 / mu;
    if inv_a <= 1e-15 {
        return None;
    }
    let a = 1.0 / inv_a;
    let sqrt_a = a.sqrt();
    let n = (mu / (a * a * a)).sqrt();
    let sigma0 = state.position.dot(&state.velocity) / mu.sqrt();

    // Whole revolutions carry no information
    let period = 2.0 * PI / n;
    let dt = dt.rem_euclid(period);

    let mean_delta = n * dt;
    let c = 1.0 - r0 / a;
    let s = sigma0 / sqrt_a;

    let mut x = mean_delta;
    for _ in 0..50 {
        let f = x - c * x.sin() + s * (1.0 - x.cos()) - mean_delta;
        let f_prime = 1.0 - c * x.cos() + s * x.sin();
        let delta = f / f_prime;
        x -= delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }

    let (sin_x, cos_x) = x.sin_cos();
    let r = a + (r0 - a) * cos_x + sigma0 * sqrt_a * sin_x;

    let f = 1.0 - a / r0 * (1.0 - cos_x);
    let g = dt + (a * a * a / mu).sqrt() * (sin_x - x);
    let f_dot = -(mu * a).sqrt() / (r * r0) * sin_x;
    let g_dot = 1.0 - a / r * (1.0 - cos_x);

    let position = state.position.scale(f).add(&state.velocity.scale(g));
    let velocity = state.position.scale(f_dot).add(&state.velocity.scale(g_dot));
    let next = StateVector::new(position, velocity);

    next.is_finite().then_some(next)
}

/// Circular orbital speed at radius `r` about a body with parameter `mu`
pub fn circular_velocity(mu: f64, r: f64) -> f64 {
    (mu / r).sqrt()
}

/// Escape speed at radius `r` about a body with parameter `mu`
pub fn escape_velocity(mu: f64, r: f64) -> f64 {
    (2.0 * mu / r).sqrt()
}

// =============================================================================
// TESTS
// =============================================================================
