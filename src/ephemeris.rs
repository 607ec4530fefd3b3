// Ephemeris - Body motion during a job, derived once from the job's snapshot
// Each body follows a two-body conic about its hierarchy parent; roots drift linearly

use std::collections::HashMap;

use crate::bodies::{BodyId, RegistrySnapshot};
use crate::physics_engine::{kepler_propagate, StateVector};

#[derive(Debug, Clone, Copy)]
enum Motion {
    /// No parent frame: straight-line drift from the snapshot state
    Root { state: StateVector },
    /// Relative state about `parent` at job start
    Relative {
        parent: BodyId,
        relative: StateVector,
        mu: f64,
    },
}

#[derive(Debug, Clone)]
pub struct Ephemeris {
    /// Parents always precede their children
    motions: Vec<(BodyId, Motion)>,
}

/// Inertial body states at one instant
#[derive(Debug, Clone, Default)]
pub struct EphemerisFrame {
    states: HashMap<BodyId, StateVector>,
}

impl EphemerisFrame {
    pub fn state(&self, id: BodyId) -> Option<StateVector> {
        self.states.get(&id).copied()
    }

    /// State of `id` expressed relative to `origin`
    pub fn relative(&self, id: BodyId, origin: BodyId) -> Option<StateVector> {
        Some(self.state(id)?.sub(&self.state(origin)?))
    }
}

impl Ephemeris {
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let depth = |id: BodyId| {
            let mut depth = 0usize;
            let mut cursor = snapshot.center_parent(id);
            while let Some(parent) = cursor {
                depth += 1;
                cursor = snapshot.center_parent(parent);
            }
            depth
        };

        let mut motions: Vec<(usize, BodyId, Motion)> = snapshot
            .bodies()
            .iter()
            .map(|body| {
                let motion = match snapshot
                    .center_parent(body.naif_id)
                    .and_then(|p| snapshot.body(p))
                {
                    Some(parent) => Motion::Relative {
                        parent: parent.naif_id,
                        relative: body.state().sub(&parent.state()),
                        mu: parent.gm + body.gm,
                    },
                    None => Motion::Root {
                        state: body.state(),
                    },
                };
                (depth(body.naif_id), body.naif_id, motion)
            })
            .collect();
        motions.sort_by_key(|(depth, id, _)| (*depth, *id));

        Self {
            motions: motions.into_iter().map(|(_, id, m)| (id, m)).collect(),
        }
    }

    /// Inertial states of every body `t` seconds after the snapshot epoch
    pub fn at(&self, t: f64) -> EphemerisFrame {
        let mut states = HashMap::with_capacity(self.motions.len());
        for (id, motion) in &self.motions {
            let state = match motion {
                Motion::Root { state } => drift(state, t),
                Motion::Relative {
                    parent,
                    relative,
                    mu,
                } => {
                    let moved = kepler_propagate(relative, *mu, t).unwrap_or_else(|| drift(relative, t));
                    match states.get(parent) {
                        Some(parent_state) => moved.add(parent_state),
                        None => moved,
                    }
                }
            };
            states.insert(*id, state);
        }
        EphemerisFrame { states }
    }
}

fn drift(state: &StateVector, t: f64) -> StateVector {
    StateVector::new(
        state.position.add(&state.velocity.scale(t)),
        state.velocity,
    )
}
