// Solar System Catalog - Built-in NAIF bodies for seeding the registry
// Canonical orbits place bodies when no external state has been pushed yet

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::bodies::{
    AtmosphereModel, Body, BodyId, BodyType, Hierarchy, RegistrySnapshot, SimulationEpoch,
};
use crate::error::Result;
use crate::physics_engine::{OrbitalElements, StateVector, Vector3, G_KM, MU_SUN};

/// Default catalog epoch (UTC)
pub const DEFAULT_EPOCH: &str = "2025-05-11T00:00:00";

/// Atmospheric drag is ignored above this altitude (km)
pub const DEFAULT_DRAG_CUTOFF_KM: f64 = 500.0;

/// The Sun has no parent to hand off to; this bounds the tracked region (km)
pub const SUN_SOI_KM: f64 = 1.5e10;

/// Laplace SOIs smaller than the body itself are lifted to this multiple of its radius
pub const SOI_SURFACE_MARGIN: f64 = 1.1;

pub const SUN: BodyId = 10;
pub const EARTH: BodyId = 399;
pub const MOON: BodyId = 301;
pub const MARS: BodyId = 499;
pub const JUPITER: BodyId = 599;

pub const EARTH_ATMOSPHERE: AtmosphereModel = AtmosphereModel {
    reference_density: 3.725e-12,
    reference_altitude: 400.0,
    scale_height: 58.515,
    cutoff_altitude: DEFAULT_DRAG_CUTOFF_KM,
    rotation_rate: 7.2921159e-5,
};

// =============================================================================
// CATALOG TABLE
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub id: BodyId,
    pub name: &'static str,
    /// NAIF parent (planets hang off their system barycenter)
    pub parent: Option<BodyId>,
    pub body_type: BodyType,
    pub gm: Option<f64>,  // km³/s²
    pub radius: f64,      // km, mean equatorial
    pub j2: Option<f64>,
    /// North pole right ascension / declination, degrees (equatorial J2000)
    pub pole: Option<(f64, f64)>,
    /// a (km), e, i, Ω, ω, M0 at J2000 (degrees)
    pub orbit: Option<[f64; 6]>,
}

const fn barycenter(id: BodyId, name: &'static str) -> CatalogEntry {
    CatalogEntry {
        id,
        name,
        parent: if id == 0 { None } else { Some(0) },
        body_type: BodyType::Barycenter,
        gm: None,
        radius: 0.0,
        j2: None,
        pole: None,
        orbit: None,
    }
}

#[allow(clippy::too_many_arguments)]
const fn body(
    id: BodyId,
    name: &'static str,
    parent: BodyId,
    body_type: BodyType,
    gm: f64,
    radius: f64,
    j2: Option<f64>,
    pole: Option<(f64, f64)>,
    orbit: [f64; 6],
) -> CatalogEntry {
    CatalogEntry {
        id,
        name,
        parent: Some(parent),
        body_type,
        gm: Some(gm),
        radius,
        j2,
        pole,
        orbit: Some(orbit),
    }
}

use crate::bodies::BodyType::{Moon, Planet};

pub const CATALOG: &[CatalogEntry] = &[
    barycenter(0, "Solar System Barycenter"),
    CatalogEntry {
        id: SUN,
        name: "Sun",
        parent: Some(0),
        body_type: BodyType::Star,
        gm: Some(MU_SUN),
        radius: 695_700.0,
        j2: None,
        pole: Some((286.13, 63.87)),
        orbit: None,
    },
    barycenter(1, "Mercury Barycenter"),
    barycenter(2, "Venus Barycenter"),
    barycenter(3, "Earth Barycenter"),
    barycenter(4, "Mars Barycenter"),
    barycenter(5, "Jupiter Barycenter"),
    barycenter(6, "Saturn Barycenter"),
    barycenter(7, "Uranus Barycenter"),
    barycenter(8, "Neptune Barycenter"),
    barycenter(9, "Pluto System Barycenter"),
    // Planets (orbits heliocentric)
    body(199, "Mercury", 1, Planet, 22031.86855, 2439.7, Some(6.0e-5), Some((281.0103, 61.4155)),
        [57909050.0, 0.2056, 7.005, 48.331, 29.124, 174.796]),
    body(299, "Venus", 2, Planet, 324858.592, 6051.8, Some(4.458e-6), Some((272.76, 67.16)),
        [108208000.0, 0.0067, 3.3947, 76.680, 54.884, 50.416]),
    body(EARTH, "Earth", 3, Planet, 398600.435507, 6378.1366, Some(1.08262668e-3), Some((0.0, 90.0)),
        [149598023.0, 0.0167, 0.0, -11.26064, 114.20783, 358.617]),
    body(MARS, "Mars", 4, Planet, 42828.375214, 3396.19, Some(1.96045e-3), Some((317.681, 52.887)),
        [227939200.0, 0.0935, 1.850, 49.558, 286.502, 19.373]),
    body(JUPITER, "Jupiter", 5, Planet, 126686531.9, 71492.0, Some(0.014696), Some((268.057, 64.495)),
        [778570000.0, 0.0489, 1.303, 100.464, 273.867, 20.020]),
    body(699, "Saturn", 6, Planet, 37931207.8, 60268.0, Some(0.016298), Some((40.589, 83.537)),
        [1433530000.0, 0.0565, 2.485, 113.665, 339.392, 317.020]),
    body(799, "Uranus", 7, Planet, 5793951.3, 25559.0, None, Some((257.311, -15.175)),
        [2875040000.0, 0.0463, 0.773, 74.006, 96.998, 142.2386]),
    body(899, "Neptune", 8, Planet, 6835103.1, 24764.0, None, Some((299.36, 43.46)),
        [4504450000.0, 0.0097, 1.770, 131.784, 273.187, 256.228]),
    body(999, "Pluto", 9, Planet, 869.613817, 1188.3, None, Some((132.993, -6.163)),
        [5906440628.0, 0.2488, 17.16, 110.299, 113.834, 14.53]),
    // Major moons (orbits relative to their planet)
    body(MOON, "Moon", 3, Moon, 4902.800066, 1737.4, Some(2.032e-4), Some((269.9949, 66.5392)),
        [384400.0, 0.0549, 5.145, 125.08, 318.15, 115.3654]),
    body(401, "Phobos", 4, Moon, 0.0007112, 11.2667, None, None,
        [9376.0, 0.0151, 1.075, 49.2, 150.057, 177.4]),
    body(402, "Deimos", 4, Moon, 9.85e-05, 6.2, None, None,
        [23463.2, 0.00033, 1.788, 316.65, 260.729, 53.2]),
    body(501, "Io", 5, Moon, 5959.9, 1821.6, None, None,
        [421700.0, 0.0041, 0.036, 43.977, 84.129, 171.016]),
    body(502, "Europa", 5, Moon, 3202.7, 1560.8, None, None,
        [671034.0, 0.009, 0.465, 219.106, 88.970, 29.298]),
    body(503, "Ganymede", 5, Moon, 9887.8, 2634.1, None, None,
        [1070412.0, 0.0013, 0.177, 63.552, 192.417, 192.417]),
    body(504, "Callisto", 5, Moon, 7179.3, 2410.3, None, None,
        [1882709.0, 0.007, 0.192, 298.848, 52.643, 52.643]),
    body(606, "Titan", 6, Moon, 8978.0, 2574.7, None, None,
        [1221870.0, 0.0288, 0.34854, 78.6, 78.3, 11.7]),
    body(801, "Triton", 8, Moon, 1427.6, 1353.4, None, None,
        [354800.0, 0.0, 157.3, 178.1, 0.0, 63.0]),
    body(901, "Charon", 9, Moon, 101.4, 606.0, None, None,
        [19591.4, 0.0, 96.145, 223.046, 0.0, 0.0]),
];

pub fn entry(id: BodyId) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.id == id)
}

/// Barycenter 0 is dominated by the Sun, barycenter N by body N99
fn barycenter_primary(id: BodyId) -> BodyId {
    match id {
        0 => SUN,
        1..=9 => id * 100 + 99,
        other => other,
    }
}

/// Body whose gravity a catalog entry actually orbits, with barycenters collapsed
pub fn dynamical_center(id: BodyId) -> Option<BodyId> {
    let mut parent = entry(id)?.parent?;
    loop {
        let primary = barycenter_primary(parent);
        if primary != id {
            return Some(primary);
        }
        parent = entry(parent)?.parent?;
    }
}

/// Parent map over the physical bodies: planets -> Sun, moons -> planet
pub fn dynamical_hierarchy() -> Hierarchy {
    let mut hierarchy = Hierarchy::new();
    for e in CATALOG.iter().filter(|e| e.body_type != BodyType::Barycenter) {
        hierarchy.insert(e.id, dynamical_center(e.id));
    }
    hierarchy
}

/// Parse an ISO-8601 UTC instant, with or without an offset suffix
pub fn parse_epoch(text: &str) -> Option<SimulationEpoch> {
    let text = text.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(SimulationEpoch::from_datetime(datetime.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| SimulationEpoch::from_datetime(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)))
}

pub fn default_epoch() -> SimulationEpoch {
    parse_epoch(DEFAULT_EPOCH).unwrap_or_default()
}

// =============================================================================
// SNAPSHOT CONSTRUCTION
// =============================================================================

fn soi_radius(e: &CatalogEntry, center: Option<&CatalogEntry>) -> f64 {
    let laplace = match (e.orbit, e.gm, center.and_then(|c| c.gm)) {
        (Some(orbit), Some(gm), Some(center_gm)) => orbit[0] * (gm / center_gm).powf(0.4),
        _ => SUN_SOI_KM,
    };
    laplace.max(e.radius * SOI_SURFACE_MARGIN)
}

/// Inertial (Sun-centered, ecliptic J2000) state of `id` at `julian_date`
fn inertial_state(
    id: BodyId,
    julian_date: f64,
    cache: &mut HashMap<BodyId, StateVector>,
) -> StateVector {
    if let Some(state) = cache.get(&id) {
        return *state;
    }

    let state = match (entry(id), dynamical_center(id)) {
        (Some(e), Some(center_id)) => {
            let center = inertial_state(center_id, julian_date, cache);
            let mu = entry(center_id).and_then(|c| c.gm).unwrap_or(0.0) + e.gm.unwrap_or(0.0);
            match e.orbit {
                Some(orbit) if mu > 0.0 => {
                    let [a, ecc, i, raan, argp, m0] = orbit;
                    let relative = OrbitalElements::from_degrees(a, ecc, i, raan, argp, m0)
                        .at_julian_date(julian_date, mu)
                        .to_state_vector(mu);
                    center.add(&relative)
                }
                _ => center,
            }
        }
        _ => StateVector::zero(),
    };

    cache.insert(id, state);
    state
}

/// Registry snapshot of every physical catalog body at `epoch`
pub fn default_snapshot(epoch: SimulationEpoch) -> Result<RegistrySnapshot> {
    let julian_date = epoch.julian_date();
    let mut cache = HashMap::new();

    let bodies: Vec<Body> = CATALOG
        .iter()
        .filter(|e| e.body_type != BodyType::Barycenter)
        .map(|e| {
            let center = dynamical_center(e.id).and_then(entry);
            let state = inertial_state(e.id, julian_date, &mut cache);
            let gm = e.gm.unwrap_or(0.0);
            Body {
                naif_id: e.id,
                name: e.name.to_string(),
                body_type: e.body_type,
                position: state.position,
                velocity: state.velocity,
                mass: gm / G_KM,
                gm,
                radius: e.radius,
                soi_radius: soi_radius(e, center),
                j2: e.j2,
                pole_axis: e.pole.map(|(ra, dec)| Vector3::from_equatorial_pole(ra, dec)),
                atmosphere: (e.id == EARTH).then_some(EARTH_ATMOSPHERE),
            }
        })
        .collect();

    RegistrySnapshot::new(bodies, dynamical_hierarchy(), epoch)
}

// =============================================================================
// TESTS
// =============================================================================
