// Body Registry - Massive bodies and immutable registry snapshots
// Updates swap in a whole new snapshot; running jobs keep the one they started with

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::physics_engine::{StateVector, Vector3};

/// NAIF integer identifier
pub type BodyId = i32;

// =============================================================================
// CELESTIAL BODY
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    Star,
    Planet,
    Moon,
    Barycenter,
}

/// Exponential atmosphere: ρ(h) = ρ_ref · exp(-(h - h_ref) / H) below the cutoff
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtmosphereModel {
    pub reference_density: f64,  // kg/m³
    pub reference_altitude: f64, // km
    pub scale_height: f64,       // km
    pub cutoff_altitude: f64,    // km
    /// Co-rotation rate of the atmosphere about the body's spin axis (rad/s)
    #[serde(default)]
    pub rotation_rate: f64,
}

impl AtmosphereModel {
    /// Density in kg/m³, or `None` above the cutoff
    pub fn density(&self, altitude: f64) -> Option<f64> {
        if altitude >= self.cutoff_altitude {
            return None;
        }
        let h = altitude.max(0.0);
        Some(self.reference_density * (-(h - self.reference_altitude) / self.scale_height).exp())
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !(self.reference_density >= 0.0 && self.reference_density.is_finite()) {
            return Err("atmosphere referenceDensity must be finite and >= 0".into());
        }
        if !(self.scale_height > 0.0 && self.scale_height.is_finite()) {
            return Err("atmosphere scaleHeight must be finite and > 0".into());
        }
        if !self.cutoff_altitude.is_finite() || !self.rotation_rate.is_finite() {
            return Err("atmosphere cutoffAltitude and rotationRate must be finite".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub naif_id: BodyId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub body_type: BodyType,
    pub position: Vector3, // km, inertial
    pub velocity: Vector3, // km/s, inertial
    #[serde(default)]
    pub mass: f64, // kg
    #[serde(alias = "GM")]
    pub gm: f64, // km³/s²
    pub radius: f64,     // km
    pub soi_radius: f64, // km
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j2: Option<f64>,
    /// Spin axis in the inertial frame; +Z when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pole_axis: Option<Vector3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atmosphere: Option<AtmosphereModel>,
}

impl Body {
    pub fn state(&self) -> StateVector {
        StateVector::new(self.position, self.velocity)
    }

    pub fn spin_axis(&self) -> Vector3 {
        match self.pole_axis {
            Some(axis) if axis.magnitude() > 1e-12 => axis.normalize(),
            _ => Vector3::unit_z(),
        }
    }

    /// GM > 0: the body can anchor an integration frame
    pub fn is_integration_center(&self) -> bool {
        self.gm > 0.0
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| EngineError::InvalidBody {
            id: self.naif_id,
            reason: reason.to_string(),
        };

        if !self.position.is_finite() || !self.velocity.is_finite() {
            return Err(fail("position and velocity must be finite"));
        }
        if !(self.gm >= 0.0 && self.gm.is_finite()) {
            return Err(fail("GM must be finite and >= 0"));
        }
        if !(self.radius >= 0.0 && self.radius.is_finite()) {
            return Err(fail("radius must be finite and >= 0"));
        }
        if !(self.soi_radius > self.radius) {
            return Err(fail("SOI radius must exceed the physical radius"));
        }
        if let Some(j2) = self.j2 {
            if !j2.is_finite() {
                return Err(fail("j2 must be finite"));
            }
        }
        if let Some(atmosphere) = &self.atmosphere {
            atmosphere.validate().map_err(|reason| fail(&reason))?;
        }
        Ok(())
    }
}

// =============================================================================
// HIERARCHY & EPOCH
// =============================================================================

/// Child id -> parent id; `None` marks a root.
// JSON object keys arrive as strings, and integer keys do not survive tagged-enum buffering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "HashMap<String, Option<BodyId>>")]
pub struct Hierarchy(HashMap<BodyId, Option<BodyId>>);

impl TryFrom<HashMap<String, Option<BodyId>>> for Hierarchy {
    type Error = String;

    fn try_from(raw: HashMap<String, Option<BodyId>>) -> std::result::Result<Self, Self::Error> {
        raw.into_iter()
            .map(|(key, parent)| {
                key.trim()
                    .parse::<BodyId>()
                    .map(|child| (child, parent))
                    .map_err(|_| format!("hierarchy key `{}` is not a NAIF id", key))
            })
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .map(Hierarchy)
    }
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, child: BodyId, parent: BodyId) -> Self {
        self.0.insert(child, Some(parent));
        self
    }

    pub fn insert(&mut self, child: BodyId, parent: Option<BodyId>) {
        self.0.insert(child, parent);
    }

    pub fn parent_of(&self, id: BodyId) -> Option<BodyId> {
        self.0.get(&id).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Simulated wall time of a snapshot, in Unix epoch milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct SimulationEpoch {
    pub unix_millis: f64,
}

impl SimulationEpoch {
    pub fn from_unix_millis(unix_millis: f64) -> Self {
        Self { unix_millis }
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self::from_unix_millis(datetime.timestamp_millis() as f64)
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.unix_millis.round() as i64).single()
    }

    pub fn julian_date(&self) -> f64 {
        self.unix_millis / 86_400_000.0 + 2440587.5
    }
}

impl fmt::Display for SimulationEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{} ms", self.unix_millis),
        }
    }
}

// =============================================================================
// REGISTRY SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    bodies: Vec<Body>,
    index: HashMap<BodyId, usize>,
    hierarchy: Hierarchy,
    /// Nearest ancestor usable as an integration center, per body
    center_parents: HashMap<BodyId, Option<BodyId>>,
    epoch: SimulationEpoch,
    version: u64,
}

impl RegistrySnapshot {
    pub fn new(bodies: Vec<Body>, hierarchy: Hierarchy, epoch: SimulationEpoch) -> Result<Self> {
        if !epoch.unix_millis.is_finite() {
            return Err(EngineError::invalid_request(
                "currentTime",
                "must be a finite number of milliseconds",
            ));
        }

        let mut index = HashMap::with_capacity(bodies.len());
        for (i, body) in bodies.iter().enumerate() {
            body.validate()?;
            if index.insert(body.naif_id, i).is_some() {
                return Err(EngineError::InvalidBody {
                    id: body.naif_id,
                    reason: "duplicate NAIF id".to_string(),
                });
            }
        }

        let mut snapshot = Self {
            bodies,
            index,
            hierarchy,
            center_parents: HashMap::new(),
            epoch,
            version: 0,
        };
        snapshot.center_parents = snapshot
            .bodies
            .iter()
            .map(|b| Ok((b.naif_id, snapshot.climb_to_center(b.naif_id)?)))
            .collect::<Result<_>>()?;
        Ok(snapshot)
    }

    /// Walk the full parent chain; any revisit is a cycle and fails the snapshot
    fn climb_to_center(&self, id: BodyId) -> Result<Option<BodyId>> {
        let mut seen = HashSet::from([id]);
        let mut center = None;
        let mut cursor = self.hierarchy.parent_of(id);
        while let Some(candidate) = cursor {
            if !seen.insert(candidate) {
                return Err(EngineError::InvalidBody {
                    id,
                    reason: format!("hierarchy cycle through body {}", candidate),
                });
            }
            if center.is_none() && self.body(candidate).is_some_and(Body::is_integration_center) {
                center = Some(candidate);
            }
            cursor = self.hierarchy.parent_of(candidate);
        }
        Ok(center)
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.index.get(&id).map(|&i| &self.bodies[i])
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn epoch(&self) -> SimulationEpoch {
        self.epoch
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Frame a trajectory hands off to when it leaves `id`'s SOI
    pub fn center_parent(&self, id: BodyId) -> Option<BodyId> {
        self.center_parents.get(&id).copied().flatten()
    }

    /// Bodies whose SOI nests directly inside `id`'s frame
    pub fn center_children(&self, id: BodyId) -> impl Iterator<Item = &Body> + '_ {
        self.bodies
            .iter()
            .filter(move |b| b.naif_id != id && b.is_integration_center())
            .filter(move |b| self.center_parent(b.naif_id) == Some(id))
    }
}

// =============================================================================
// BODY REGISTRY (process-wide, replaced wholesale)
// =============================================================================

#[derive(Debug, Default)]
pub struct BodyRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and swap in a new snapshot. On error the old snapshot stays.
    pub fn update(
        &self,
        bodies: Vec<Body>,
        hierarchy: Hierarchy,
        epoch: SimulationEpoch,
    ) -> Result<Arc<RegistrySnapshot>> {
        let snapshot = RegistrySnapshot::new(bodies, hierarchy, epoch)?;
        Ok(self.replace(snapshot))
    }

    pub fn replace(&self, mut snapshot: RegistrySnapshot) -> Arc<RegistrySnapshot> {
        let mut current = self.current.write();
        snapshot.version = current.version + 1;
        let snapshot = Arc::new(snapshot);
        *current = Arc::clone(&snapshot);
        log::debug!(
            "Registry v{} installed: {} bodies at {}",
            snapshot.version,
            snapshot.len(),
            snapshot.epoch
        );
        snapshot
    }

    /// The snapshot a job starting now would see
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.read())
    }
}

// =============================================================================
// TESTS
// =============================================================================
