// SOI Frame Manager - Patched-conic reference body switching
// Bound(body) -> Bound(parent) on exit, Bound(child) on capture, Exited when no parent remains

use log::info;
use serde::{Deserialize, Serialize};

use crate::bodies::{BodyId, RegistrySnapshot};
use crate::ephemeris::EphemerisFrame;
use crate::physics_engine::{StateVector, Vector3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Integrating relative to this body
    Bound(BodyId),
    /// Left the outermost tracked body; terminal
    Exited,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SoiTransitionEvent {
    pub time: f64, // s from job start
    pub from_body: BodyId,
    /// `None` for the terminal exit
    pub to_body: Option<BodyId>,
    pub position: Vector3, // km, in the new frame (or the frame left, on exit)
    pub velocity: Vector3, // km/s
}

/// Result of a frame switch: the state re-expressed in the new frame
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: StateVector,
    pub event: SoiTransitionEvent,
}

#[derive(Debug, Clone)]
pub struct SoiFrameManager {
    state: FrameState,
}

impl SoiFrameManager {
    pub fn new(central: BodyId) -> Self {
        Self {
            state: FrameState::Bound(central),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn central(&self) -> Option<BodyId> {
        match self.state {
            FrameState::Bound(id) => Some(id),
            FrameState::Exited => None,
        }
    }

    pub fn is_exited(&self) -> bool {
        self.state == FrameState::Exited
    }

    /// Apply at most one transition for the post-step `state` at `time`.
    /// Exit is tested before capture.
    pub fn check(
        &mut self,
        time: f64,
        state: &StateVector,
        frame: &EphemerisFrame,
        snapshot: &RegistrySnapshot,
    ) -> Option<Transition> {
        let current = self.central()?;
        let central = snapshot.body(current)?;

        if state.position.magnitude() > central.soi_radius {
            return Some(self.exit(current, time, state, frame, snapshot));
        }
        self.capture(current, time, state, frame, snapshot)
    }

    fn exit(
        &mut self,
        current: BodyId,
        time: f64,
        state: &StateVector,
        frame: &EphemerisFrame,
        snapshot: &RegistrySnapshot,
    ) -> Transition {
        let handoff = snapshot
            .center_parent(current)
            .and_then(|parent| Some((parent, frame.relative(current, parent)?)));

        match handoff {
            Some((parent, offset)) => {
                let next = state.add(&offset);
                info!("SOI exit at t={:.1}s: {} -> {}", time, current, parent);
                self.state = FrameState::Bound(parent);
                Transition {
                    state: next,
                    event: event(time, current, Some(parent), &next),
                }
            }
            None => {
                info!("SOI exit at t={:.1}s: left {} with no parent frame", time, current);
                self.state = FrameState::Exited;
                Transition {
                    state: *state,
                    event: event(time, current, None, state),
                }
            }
        }
    }

    fn capture(
        &mut self,
        current: BodyId,
        time: f64,
        state: &StateVector,
        frame: &EphemerisFrame,
        snapshot: &RegistrySnapshot,
    ) -> Option<Transition> {
        let (child, offset, _) = snapshot
            .center_children(current)
            .filter_map(|child| {
                let offset = frame.relative(child.naif_id, current)?;
                let distance = state.position.sub(&offset.position).magnitude();
                (distance < child.soi_radius).then_some((child.naif_id, offset, distance))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))?;

        let next = state.sub(&offset);
        info!("SOI capture at t={:.1}s: {} -> {}", time, current, child);
        self.state = FrameState::Bound(child);
        Some(Transition {
            state: next,
            event: event(time, current, Some(child), &next),
        })
    }
}

fn event(time: f64, from_body: BodyId, to_body: Option<BodyId>, state: &StateVector) -> SoiTransitionEvent {
    SoiTransitionEvent {
        time,
        from_body,
        to_body,
        position: state.position,
        velocity: state.velocity,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::tests::{earth, point_body};
    use crate::bodies::{Body, BodyType, Hierarchy, SimulationEpoch};
    use crate::ephemeris::Ephemeris;
    use crate::physics_engine::{AU_KM, MU_SUN};

    fn sun() -> Body {
        point_body(10, BodyType::Star, MU_SUN, 1.5e10, Vector3::zero())
    }

    fn earth_at_au() -> Body {
        let mut body = earth();
        body.position = Vector3::new(AU_KM, 0.0, 0.0);
        body.velocity = Vector3::new(0.0, 29.78, 0.0);
        body
    }

    fn setup(bodies: Vec<Body>, hierarchy: Hierarchy) -> (RegistrySnapshot, EphemerisFrame) {
        let snapshot = RegistrySnapshot::new(bodies, hierarchy, SimulationEpoch::default()).unwrap();
        let frame = Ephemeris::from_snapshot(&snapshot).at(0.0);
        (snapshot, frame)
    }

    #[test]
    fn test_inside_soi_stays_bound() {
        let (snapshot, frame) = setup(vec![earth()], Hierarchy::new());
        let mut manager = SoiFrameManager::new(399);
        let state = StateVector::new(Vector3::new(7000.0, 0.0, 0.0), Vector3::new(0.0, 7.5, 0.0));
        assert!(manager.check(60.0, &state, &frame, &snapshot).is_none());
        assert_eq!(manager.state(), FrameState::Bound(399));
    }

    #[test]
    fn test_exit_hands_off_to_parent() {
        let (snapshot, frame) = setup(vec![sun(), earth_at_au()], Hierarchy::new().with_parent(399, 10));
        let mut manager = SoiFrameManager::new(399);
        let state = StateVector::new(Vector3::new(1.0e6, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));

        let transition = manager.check(100.0, &state, &frame, &snapshot).unwrap();
        assert_eq!(manager.state(), FrameState::Bound(10));
        assert_eq!(transition.event.from_body, 399);
        assert_eq!(transition.event.to_body, Some(10));

        // Same inertial point, now heliocentric
        assert!((transition.state.position.x - (AU_KM + 1.0e6)).abs() < 1e-6);
        assert!((transition.state.velocity.y - 29.78).abs() < 1e-9);
        assert_eq!(transition.event.position, transition.state.position);
    }

    #[test]
    fn test_exit_without_parent_is_terminal() {
        let (snapshot, frame) = setup(vec![earth()], Hierarchy::new());
        let mut manager = SoiFrameManager::new(399);
        let state = StateVector::new(Vector3::new(1.0e6, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0));

        let transition = manager.check(86_400.0, &state, &frame, &snapshot).unwrap();
        assert!(manager.is_exited());
        assert_eq!(transition.event.to_body, None);
        assert_eq!(transition.state.position, state.position);

        // Nothing further happens once exited
        assert!(manager.check(90_000.0, &state, &frame, &snapshot).is_none());
    }

    #[test]
    fn test_capture_into_child() {
        let (snapshot, frame) = setup(vec![sun(), earth_at_au()], Hierarchy::new().with_parent(399, 10));
        let mut manager = SoiFrameManager::new(10);
        let state = StateVector::new(Vector3::new(AU_KM + 10_000.0, 0.0, 0.0), Vector3::new(0.0, 30.0, 0.0));

        let transition = manager.check(0.0, &state, &frame, &snapshot).unwrap();
        assert_eq!(manager.central(), Some(399));
        assert!((transition.state.position.x - 10_000.0).abs() < 1e-6);
        assert!((transition.state.velocity.y - 0.22).abs() < 1e-9);
    }

    #[test]
    fn test_exit_takes_priority_over_capture() {
        let mut small_earth = earth();
        small_earth.soi_radius = 400_000.0;
        let moon = point_body(301, BodyType::Moon, 4902.8, 66_000.0, Vector3::new(384_400.0, 0.0, 0.0));
        let (snapshot, frame) = setup(
            vec![sun(), small_earth, moon],
            Hierarchy::new().with_parent(399, 10).with_parent(301, 399),
        );
        let mut manager = SoiFrameManager::new(399);

        // Outside Earth's SOI and inside the Moon's at once
        let state = StateVector::new(Vector3::new(430_000.0, 0.0, 0.0), Vector3::zero());
        let transition = manager.check(0.0, &state, &frame, &snapshot).unwrap();
        assert_eq!(transition.event.to_body, Some(10));
    }

    #[test]
    fn test_nearest_child_wins() {
        let a = point_body(1, BodyType::Planet, 10.0, 5_000.0, Vector3::new(10_000.0, 0.0, 0.0));
        let b = point_body(2, BodyType::Planet, 10.0, 5_000.0, Vector3::new(13_000.0, 0.0, 0.0));
        let (snapshot, frame) = setup(
            vec![sun(), a, b],
            Hierarchy::new().with_parent(1, 10).with_parent(2, 10),
        );
        let mut manager = SoiFrameManager::new(10);
        let state = StateVector::new(Vector3::new(12_000.0, 0.0, 0.0), Vector3::zero());

        manager.check(0.0, &state, &frame, &snapshot).unwrap();
        assert_eq!(manager.central(), Some(2));
    }

    #[test]
    fn test_event_json_shape() {
        let event = SoiTransitionEvent {
            time: 60.0,
            from_body: 399,
            to_body: None,
            position: Vector3::new(1.0, 2.0, 3.0),
            velocity: Vector3::zero(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["fromBody"], 399);
        assert!(json["toBody"].is_null());
        assert_eq!(json["position"][2], 3.0);
    }
}
