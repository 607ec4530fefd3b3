// Acceleration Model - Central gravity, third-body, J2 and drag
// Evaluated relative to the current central body; positions in km, accelerations in km/s²

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bodies::{Body, BodyId, RegistrySnapshot};
use crate::ephemeris::EphemerisFrame;
use crate::physics_engine::{StateVector, Vector3};

/// Separations below this (km) are treated as coincident and skipped
const MIN_SEPARATION_KM: f64 = 1e-9;

// =============================================================================
// SPACECRAFT
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpacecraftProperties {
    pub drag_coefficient: f64,
    pub area_m2: f64,
    pub mass_kg: f64,
}

impl Default for SpacecraftProperties {
    fn default() -> Self {
        Self {
            drag_coefficient: 2.2,
            area_m2: 4.0,
            mass_kg: 500.0,
        }
    }
}

impl SpacecraftProperties {
    /// Cd · A / m (m²/kg)
    pub fn ballistic_term(&self) -> f64 {
        self.drag_coefficient * self.area_m2 / self.mass_kg
    }
}

// =============================================================================
// PERTURBATION BREAKDOWN (diagnostics only)
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Contribution {
    pub acceleration: Vector3, // km/s²
    pub force: Vector3,        // N
}

impl Contribution {
    fn new(acceleration: Vector3, mass_kg: f64) -> Self {
        Self {
            acceleration,
            force: acceleration.scale(mass_kg * 1000.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerturbationBreakdown {
    pub central_body: BodyId,
    /// Point-mass gravity per body, the central body included
    pub gravity: BTreeMap<BodyId, Contribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub j2: Option<Contribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drag: Option<Contribution>,
    pub total: Contribution,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Source {
    Gravity(BodyId),
    J2,
    Drag,
}

// =============================================================================
// ACCELERATION MODEL
// =============================================================================

#[derive(Debug, Clone)]
pub struct AccelerationModel {
    snapshot: Arc<RegistrySnapshot>,
    pub spacecraft: SpacecraftProperties,
    /// Include every other registry body as a third-body perturber
    pub enable_third_body: bool,
    pub enable_j2: bool,
    pub enable_drag: bool,
}

impl AccelerationModel {
    pub fn new(snapshot: Arc<RegistrySnapshot>, spacecraft: SpacecraftProperties) -> Self {
        Self {
            snapshot,
            spacecraft,
            enable_third_body: true,
            enable_j2: true,
            enable_drag: true,
        }
    }

    /// Summed acceleration, the integrator's derivative
    pub fn total(&self, central: &Body, frame: &EphemerisFrame, state: &StateVector) -> Vector3 {
        let mut total = Vector3::zero();
        self.accumulate(central, frame, state, |_, a| total = total.add(&a));
        total
    }

    /// Per-source decomposition of the same acceleration
    pub fn breakdown(
        &self,
        central: &Body,
        frame: &EphemerisFrame,
        state: &StateVector,
    ) -> PerturbationBreakdown {
        let mass = self.spacecraft.mass_kg;
        let mut gravity = BTreeMap::new();
        let mut j2 = None;
        let mut drag = None;
        let mut total = Vector3::zero();

        self.accumulate(central, frame, state, |source, a| {
            total = total.add(&a);
            match source {
                Source::Gravity(id) => {
                    gravity.insert(id, Contribution::new(a, mass));
                }
                Source::J2 => j2 = Some(Contribution::new(a, mass)),
                Source::Drag => drag = Some(Contribution::new(a, mass)),
            }
        });

        PerturbationBreakdown {
            central_body: central.naif_id,
            gravity,
            j2,
            drag,
            total: Contribution::new(total, mass),
        }
    }

    fn accumulate(
        &self,
        central: &Body,
        frame: &EphemerisFrame,
        state: &StateVector,
        mut sink: impl FnMut(Source, Vector3),
    ) {
        let r_vec = state.position;

        sink(Source::Gravity(central.naif_id), central_gravity(central.gm, &r_vec));

        if self.enable_third_body {
            for body in self.snapshot.bodies() {
                if body.naif_id == central.naif_id || !body.is_integration_center() {
                    continue;
                }
                let Some(relative) = frame.relative(body.naif_id, central.naif_id) else {
                    continue;
                };
                if let Some(a) = third_body(body.gm, &relative.position, &r_vec) {
                    sink(Source::Gravity(body.naif_id), a);
                }
            }
        }

        if self.enable_j2 {
            if let Some(j2) = central.j2.filter(|j2| *j2 != 0.0) {
                sink(
                    Source::J2,
                    j2_perturbation(central.gm, j2, central.radius, &central.spin_axis(), &r_vec),
                );
            }
        }

        if self.enable_drag {
            if let Some(a) = self.drag(central, state) {
                sink(Source::Drag, a);
            }
        }
    }

    /// a_drag = -½ Cd (A/m) ρ v_rel |v_rel| with a co-rotating atmosphere
    fn drag(&self, central: &Body, state: &StateVector) -> Option<Vector3> {
        let atmosphere = central.atmosphere.as_ref()?;
        let altitude = state.position.magnitude() - central.radius;
        let rho = atmosphere.density(altitude)?;

        let omega = central.spin_axis().scale(atmosphere.rotation_rate);
        let v_rel = state.velocity.sub(&omega.cross(&state.position));
        let v_rel_mag = v_rel.magnitude();
        if v_rel_mag < 1e-12 {
            return None;
        }

        // ρ in kg/m³ and A/m in m²/kg give m⁻¹; v in km/s, so scale by 1000 to land in km/s²
        let accel_mag = -0.5 * self.spacecraft.ballistic_term() * rho * v_rel_mag * 1000.0;
        Some(v_rel.scale(accel_mag))
    }
}

/// a = -GM r / |r|³
pub fn central_gravity(gm: f64, r_vec: &Vector3) -> Vector3 {
    let r = r_vec.magnitude();
    if r < MIN_SEPARATION_KM {
        return Vector3::zero();
    }
    r_vec.scale(-gm / (r * r * r))
}

/// Indirect-term third-body acceleration: GM_B ((r_B - r)/|r_B - r|³ - r_B/|r_B|³)
pub fn third_body(gm: f64, r_body: &Vector3, r_sat: &Vector3) -> Option<Vector3> {
    let d_vec = r_body.sub(r_sat);
    let d = d_vec.magnitude();
    let rb = r_body.magnitude();
    if d < MIN_SEPARATION_KM || rb < MIN_SEPARATION_KM {
        return None;
    }
    let direct = d_vec.scale(1.0 / (d * d * d));
    let indirect = r_body.scale(1.0 / (rb * rb * rb));
    Some(direct.sub(&indirect).scale(gm))
}

/// J2 oblateness about a spin axis `pole`:
/// a = -3/2 J2 μ R² / r⁵ [ (1 - 5 z²/r²) r + 2 z k̂ ], z = r·k̂
pub fn j2_perturbation(gm: f64, j2: f64, radius: f64, pole: &Vector3, r_vec: &Vector3) -> Vector3 {
    let r = r_vec.magnitude();
    if r < radius.max(MIN_SEPARATION_KM) {
        return Vector3::zero();
    }

    let r2 = r * r;
    let r5 = r2 * r2 * r;
    let z = r_vec.dot(pole);
    let factor = -1.5 * j2 * gm * radius * radius / r5;

    r_vec
        .scale(1.0 - 5.0 * z * z / r2)
        .add(&pole.scale(2.0 * z))
        .scale(factor)
}

// =============================================================================
// TESTS
// =============================================================================
