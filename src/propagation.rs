// Propagation Job - One request's step loop, chunk buffering and terminal events
// The job keeps the snapshot it was created with for its whole life

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::acceleration::{AccelerationModel, PerturbationBreakdown, SpacecraftProperties};
use crate::bodies::{BodyId, RegistrySnapshot};
use crate::ephemeris::{Ephemeris, EphemerisFrame};
use crate::error::{EngineError, Result};
use crate::integrator::{Integrator, IntegratorKind};
use crate::physics_engine::{StateVector, Vector3};
use crate::soi::{SoiFrameManager, SoiTransitionEvent};

/// Step counts within this fraction of a whole number are not padded with a sliver step
const STEP_COUNT_TOLERANCE: f64 = 1e-9;

/// Upper bound on points reserved up front for a chunk buffer; larger chunks grow on demand
const MAX_RESERVED_POINTS: usize = 4096;

// =============================================================================
// REQUEST & OUTPUT TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationRequest {
    pub satellite_id: String,
    pub position: Vector3, // km, relative to the central body
    pub velocity: Vector3, // km/s
    pub central_body_naif_id: BodyId,
    pub duration: f64,  // s
    pub time_step: f64, // s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_per_chunk: Option<usize>,
    /// Include every registry body as a third-body perturber
    pub propagate_solar_system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacecraft: Option<SpacecraftProperties>,
    #[serde(default)]
    pub include_perturbations: bool,
    #[serde(default)]
    pub integrator: IntegratorKind,
}

impl PropagationRequest {
    /// Checks that need no registry
    pub fn validate(&self) -> Result<()> {
        if self.satellite_id.trim().is_empty() {
            return Err(EngineError::invalid_request("satelliteId", "must not be empty"));
        }
        if !self.position.is_finite() {
            return Err(EngineError::invalid_request("position", "must be finite"));
        }
        if !self.velocity.is_finite() {
            return Err(EngineError::invalid_request("velocity", "must be finite"));
        }
        if !(self.duration > 0.0 && self.duration.is_finite()) {
            return Err(EngineError::invalid_request("duration", "must be finite and > 0"));
        }
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(EngineError::invalid_request("timeStep", "must be finite and > 0"));
        }
        if self.time_step > self.duration {
            return Err(EngineError::invalid_request("timeStep", "must not exceed duration"));
        }
        if self.points_per_chunk == Some(0) {
            return Err(EngineError::invalid_request("pointsPerChunk", "must be >= 1"));
        }
        if let Some(craft) = &self.spacecraft {
            let positive = |v: f64| v > 0.0 && v.is_finite();
            if !(positive(craft.drag_coefficient) && positive(craft.area_m2) && positive(craft.mass_kg)) {
                return Err(EngineError::invalid_request(
                    "spacecraft",
                    "dragCoefficient, areaM2 and massKg must be finite and > 0",
                ));
            }
        }
        Ok(())
    }

    /// Number of integration steps, the last possibly shorter than `time_step`
    pub fn step_count(&self) -> u64 {
        let ratio = self.duration / self.time_step;
        if (ratio - ratio.round()).abs() < STEP_COUNT_TOLERANCE * ratio.max(1.0) {
            ratio.round() as u64
        } else {
            ratio.ceil() as u64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub time: f64,         // s from job start
    pub position: Vector3, // km, relative to `central_body_naif_id`
    pub velocity: Vector3, // km/s
    pub central_body_naif_id: BodyId,
    #[serde(rename = "isSOIExit")]
    pub is_soi_exit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryChunk {
    pub points: Vec<TrajectoryPoint>,
    pub soi_transitions: Vec<SoiTransitionEvent>,
    pub progress: f64,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perturbations: Option<PerturbationBreakdown>,
}

#[derive(Debug)]
pub enum JobEvent {
    Chunk(TrajectoryChunk),
    Complete,
    Error(EngineError),
}

// =============================================================================
// CANCELLATION
// =============================================================================

/// Shared stop request, observed by the job between steps
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// =============================================================================
// PROPAGATION JOB
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

pub struct PropagationJob {
    satellite_id: String,
    snapshot: Arc<RegistrySnapshot>,
    ephemeris: Ephemeris,
    model: AccelerationModel,
    integrator: Box<dyn Integrator>,
    frames: SoiFrameManager,
    cancel: CancellationFlag,

    state: StateVector,
    duration: f64,
    time_step: f64,
    elapsed: f64,
    steps_taken: u64,
    total_steps: u64,

    chunk_size: usize,
    include_perturbations: bool,
    points: Vec<TrajectoryPoint>,
    transitions: Vec<SoiTransitionEvent>,
    chunks_emitted: usize,
    status: JobStatus,
}

impl PropagationJob {
    /// Validate `request` against `snapshot` and stage the initial point.
    /// Any error here means the job never starts.
    pub fn new(
        request: PropagationRequest,
        snapshot: Arc<RegistrySnapshot>,
        default_chunk_size: usize,
        max_steps: u64,
        cancel: CancellationFlag,
    ) -> Result<Self> {
        request.validate()?;

        let total_steps = request.step_count();
        if total_steps > max_steps {
            return Err(EngineError::invalid_request(
                "duration",
                format!("needs {} steps, limit is {}", total_steps, max_steps),
            ));
        }

        let central_id = request.central_body_naif_id;
        let central = snapshot
            .body(central_id)
            .ok_or(EngineError::CentralBodyNotFound(central_id))?;
        if !central.is_integration_center() {
            return Err(EngineError::InvalidCentralBody {
                id: central_id,
                gm: central.gm,
            });
        }

        let mut model = AccelerationModel::new(
            Arc::clone(&snapshot),
            request.spacecraft.unwrap_or_default(),
        );
        model.enable_third_body = request.propagate_solar_system;

        let state = StateVector::new(request.position, request.velocity);
        let chunk_size = request.points_per_chunk.unwrap_or(default_chunk_size).max(1);
        let integrator = request.integrator.build();

        info!(
            "Job {} started: {} steps of {}s about {} ({} integrator, order {}, third-body {})",
            request.satellite_id,
            total_steps,
            request.time_step,
            central_id,
            integrator.name(),
            integrator.order(),
            if request.propagate_solar_system { "on" } else { "off" }
        );

        let mut job = Self {
            ephemeris: Ephemeris::from_snapshot(&snapshot),
            integrator,
            frames: SoiFrameManager::new(central_id),
            snapshot,
            model,
            cancel,
            state,
            duration: request.duration,
            time_step: request.time_step,
            elapsed: 0.0,
            steps_taken: 0,
            total_steps,
            chunk_size,
            include_perturbations: request.include_perturbations,
            points: Vec::new(),
            transitions: Vec::new(),
            chunks_emitted: 0,
            status: JobStatus::Running,
            satellite_id: request.satellite_id,
        };
        job.points.reserve(job.buffer_capacity());
        job.push_point(central_id, false);
        Ok(job)
    }

    pub fn satellite_id(&self) -> &str {
        &self.satellite_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status != JobStatus::Running
    }

    pub fn progress(&self) -> f64 {
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Advance by one step and return whatever events that step produced.
    /// A cancelled job returns no events, now or later.
    pub fn step(&mut self) -> Vec<JobEvent> {
        if self.is_finished() {
            return Vec::new();
        }
        if self.cancel.is_cancelled() {
            info!("Job {} cancelled at t={:.1}s", self.satellite_id, self.elapsed);
            self.status = JobStatus::Cancelled;
            return Vec::new();
        }

        let Some(central_id) = self.frames.central() else {
            self.status = JobStatus::Completed;
            return Vec::new();
        };

        let t0 = self.elapsed;
        let is_last = self.steps_taken + 1 >= self.total_steps;
        let dt = if is_last { self.duration - t0 } else { self.time_step };

        let next = match self.integrate(central_id, t0, dt) {
            Some(next) => next,
            None => {
                let time = t0 + dt;
                warn!("Job {} diverged at t={:.1}s about {}", self.satellite_id, time, central_id);
                self.status = JobStatus::Failed;
                let mut events = Vec::with_capacity(2);
                if !self.points.is_empty() {
                    events.push(JobEvent::Chunk(self.take_chunk(false)));
                }
                events.push(JobEvent::Error(EngineError::NumericalDivergence {
                    time,
                    central_body: central_id,
                }));
                return events;
            }
        };

        self.steps_taken += 1;
        self.elapsed = if is_last {
            self.duration
        } else {
            self.steps_taken as f64 * self.time_step
        };
        self.state = next;

        let frame = self.ephemeris.at(self.elapsed);
        if let Some(transition) = self.frames.check(self.elapsed, &self.state, &frame, &self.snapshot) {
            self.state = transition.state;
            self.transitions.push(transition.event);
        }

        let exited = self.frames.is_exited();
        let point_center = self.frames.central().unwrap_or(central_id);
        self.push_point(point_center, exited);
        trace!("Job {} step {} t={:.1}s", self.satellite_id, self.steps_taken, self.elapsed);

        if is_last || exited {
            self.status = JobStatus::Completed;
            let chunk = self.take_chunk(true);
            info!(
                "Job {} complete after {} steps ({} chunks){}",
                self.satellite_id,
                self.steps_taken,
                self.chunks_emitted,
                if exited { ", left tracked hierarchy" } else { "" }
            );
            return vec![JobEvent::Chunk(chunk), JobEvent::Complete];
        }

        if self.points.len() >= self.chunk_size {
            return vec![JobEvent::Chunk(self.take_chunk(false))];
        }
        Vec::new()
    }

    /// Drive the job to its end, handing every event to `emit`
    pub fn run(mut self, mut emit: impl FnMut(JobEvent)) -> JobStatus {
        while !self.is_finished() {
            for event in self.step() {
                emit(event);
            }
        }
        self.status
    }

    fn integrate(&self, central_id: BodyId, t0: f64, dt: f64) -> Option<StateVector> {
        let central = self.snapshot.body(central_id)?;
        let third_body = self.model.enable_third_body;
        let derivative = |t: f64, s: &StateVector| {
            let frame = if third_body {
                self.ephemeris.at(t)
            } else {
                EphemerisFrame::default()
            };
            self.model.total(central, &frame, s)
        };
        self.integrator.checked_step(t0, &self.state, dt, &derivative)
    }

    fn push_point(&mut self, central_body: BodyId, is_soi_exit: bool) {
        self.points.push(TrajectoryPoint {
            time: self.elapsed,
            position: self.state.position,
            velocity: self.state.velocity,
            central_body_naif_id: central_body,
            is_soi_exit,
        });
    }

    /// Points the next chunk can still hold, never more than the job has left to produce
    fn buffer_capacity(&self) -> usize {
        let remaining = self.total_steps.saturating_sub(self.steps_taken).saturating_add(1);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        self.chunk_size.min(remaining).min(MAX_RESERVED_POINTS)
    }

    fn take_chunk(&mut self, is_complete: bool) -> TrajectoryChunk {
        let perturbations = if self.include_perturbations {
            self.points.last().and_then(|p| self.breakdown_at(p))
        } else {
            None
        };

        let next_capacity = self.buffer_capacity();
        let chunk = TrajectoryChunk {
            points: std::mem::replace(&mut self.points, Vec::with_capacity(next_capacity)),
            soi_transitions: std::mem::take(&mut self.transitions),
            progress: self.progress(),
            is_complete,
            perturbations,
        };
        self.chunks_emitted += 1;
        debug!(
            "Job {} chunk #{}: {} points, progress {:.3}",
            self.satellite_id,
            self.chunks_emitted,
            chunk.points.len(),
            chunk.progress
        );
        chunk
    }

    fn breakdown_at(&self, point: &TrajectoryPoint) -> Option<PerturbationBreakdown> {
        let central = self.snapshot.body(point.central_body_naif_id)?;
        let frame = self.ephemeris.at(point.time);
        let state = StateVector::new(point.position, point.velocity);
        Some(self.model.breakdown(central, &frame, &state))
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
    use crate::physics_engine::{circular_velocity, escape_velocity, AU_KM, MU_EARTH, MU_SUN};
    use std::f64::consts::PI;

    const LEO_RADIUS: f64 = 6771.0;

    fn snapshot_of(bodies: Vec<Body>) -> Arc<RegistrySnapshot> {
        Arc::new(RegistrySnapshot::new(bodies, Hierarchy::new(), SimulationEpoch::default()).unwrap())
    }

    fn leo_request(duration: f64, time_step: f64) -> PropagationRequest {
        PropagationRequest {
            satellite_id: "sat-1".to_string(),
            position: Vector3::new(LEO_RADIUS, 0.0, 0.0),
            velocity: Vector3::new(0.0, circular_velocity(MU_EARTH, LEO_RADIUS), 0.0),
            central_body_naif_id: 399,
            duration,
            time_step,
            points_per_chunk: None,
            propagate_solar_system: true,
            spacecraft: None,
            include_perturbations: false,
            integrator: IntegratorKind::Rk4,
        }
    }

    fn run_collect(request: PropagationRequest, snapshot: Arc<RegistrySnapshot>) -> (Vec<JobEvent>, JobStatus) {
        let job = PropagationJob::new(request, snapshot, 100, 5_000_000, CancellationFlag::new()).unwrap();
        let mut events = Vec::new();
        let status = job.run(|e| events.push(e));
        (events, status)
    }

    fn chunks(events: &[JobEvent]) -> Vec<&TrajectoryChunk> {
        events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Chunk(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn all_points(events: &[JobEvent]) -> Vec<TrajectoryPoint> {
        chunks(events).iter().flat_map(|c| c.points.clone()).collect()
    }

    #[test]
    fn test_circular_leo_emits_points_without_transitions() {
        let (events, status) = run_collect(leo_request(5400.0, 60.0), snapshot_of(vec![earth()]));
        assert_eq!(status, JobStatus::Completed);

        let points = all_points(&events);
        assert_eq!(points.len(), 91);
        assert!(chunks(&events).iter().all(|c| c.soi_transitions.is_empty()));
        assert!(points.iter().all(|p| !p.is_soi_exit && p.central_body_naif_id == 399));
        assert!(matches!(events.last(), Some(JobEvent::Complete)));

        // J2 makes the equatorial orbit slightly eccentric, nothing more
        for p in &points {
            assert!((p.position.magnitude() - LEO_RADIUS).abs() < 50.0);
        }
    }

    #[test]
    fn test_hyperbolic_escape_exits_soi() {
        let mut request = leo_request(30.0 * 86_400.0, 3600.0);
        request.velocity = Vector3::new(0.0, 1.1 * escape_velocity(MU_EARTH, LEO_RADIUS), 0.0);
        let (events, status) = run_collect(request, snapshot_of(vec![earth()]));
        assert_eq!(status, JobStatus::Completed);

        let chunk_list = chunks(&events);
        let transitions: Vec<&SoiTransitionEvent> =
            chunk_list.iter().flat_map(|c| c.soi_transitions.iter()).collect();
        assert!(!transitions.is_empty());
        assert_eq!(transitions[0].from_body, 399);
        assert_eq!(transitions[0].to_body, None);

        let points = all_points(&events);
        let last = points.last().unwrap();
        assert!(last.is_soi_exit);
        assert!(last.position.magnitude() > 924_000.0);
        assert_eq!(points.iter().filter(|p| p.is_soi_exit).count(), 1);
        assert!(points.iter().all(|p| p.position.is_finite()));

        // Stopped well before the requested 30 days
        assert!(last.time < 30.0 * 86_400.0);
        let final_chunk = chunk_list.last().unwrap();
        assert!(final_chunk.is_complete);
        assert!(final_chunk.progress < 1.0);
        assert!(matches!(events.last(), Some(JobEvent::Complete)));
    }

    #[test]
    fn test_escape_hands_off_to_parent_frame() {
        let mut sun = point_body(10, BodyType::Star, MU_SUN, 1.5e10, Vector3::new(-AU_KM, 0.0, 0.0));
        sun.velocity = Vector3::new(0.0, -29.78, 0.0);
        let snapshot = Arc::new(
            RegistrySnapshot::new(
                vec![sun, earth()],
                Hierarchy::new().with_parent(399, 10),
                SimulationEpoch::default(),
            )
            .unwrap(),
        );
        let mut request = leo_request(5.0 * 86_400.0, 3600.0);
        request.velocity = Vector3::new(0.0, 1.1 * escape_velocity(MU_EARTH, LEO_RADIUS), 0.0);
        request.propagate_solar_system = false;

        let (events, _) = run_collect(request, snapshot);
        let points = all_points(&events);
        let transition = chunks(&events)
            .iter()
            .flat_map(|c| c.soi_transitions.clone())
            .next()
            .unwrap();
        assert_eq!(transition.to_body, Some(10));

        // Points after the handoff are heliocentric and continuous with the crossing state
        let after = points.iter().find(|p| p.time == transition.time).unwrap();
        assert_eq!(after.central_body_naif_id, 10);
        assert_eq!(after.position, transition.position);
        assert!(points.last().unwrap().position.magnitude() > 1.4e8);
        assert!(!points.last().unwrap().is_soi_exit);
    }

    #[test]
    fn test_missing_central_body_is_rejected() {
        let mut request = leo_request(600.0, 60.0);
        request.central_body_naif_id = 12345;
        let err = PropagationJob::new(request, snapshot_of(vec![earth()]), 100, 1000, CancellationFlag::new())
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::CentralBodyNotFound(12345)));
        assert!(err.to_string().contains("12345"));
    }

    #[test]
    fn test_massless_central_body_is_rejected() {
        let bary = point_body(3, BodyType::Barycenter, 0.0, 1.0e6, Vector3::zero());
        let mut request = leo_request(600.0, 60.0);
        request.central_body_naif_id = 3;
        let err = PropagationJob::new(request, snapshot_of(vec![bary]), 100, 1000, CancellationFlag::new())
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::InvalidCentralBody { id: 3, .. }));
    }

    #[test]
    fn test_chunking_progress_is_monotonic() {
        let mut request = leo_request(5400.0, 60.0);
        request.points_per_chunk = Some(10);
        let (events, _) = run_collect(request, snapshot_of(vec![earth()]));

        let chunk_list = chunks(&events);
        assert_eq!(chunk_list.len(), 10);
        assert!(chunk_list[..9].iter().all(|c| c.points.len() == 10 && !c.is_complete));
        assert!(chunk_list[9].is_complete);
        for pair in chunk_list.windows(2) {
            assert!(pair[1].progress >= pair[0].progress);
        }
        assert_eq!(chunk_list[9].progress, 1.0);
        assert_eq!(events.iter().filter(|e| matches!(e, JobEvent::Complete)).count(), 1);
    }

    #[test]
    fn test_oversized_chunk_request_is_served_in_one_chunk() {
        let request: PropagationRequest = serde_json::from_str(
            r#"{
                "satelliteId": "sat-big", "position": [6771, 0, 0], "velocity": [0, 7.6726, 0],
                "centralBodyNaifId": 399, "duration": 600, "timeStep": 60,
                "pointsPerChunk": 1000000000000, "propagateSolarSystem": false
            }"#,
        )
        .unwrap();
        let job = PropagationJob::new(request, snapshot_of(vec![earth()]), 100, 5_000_000, CancellationFlag::new())
            .unwrap();
        assert!(job.points.capacity() < 64);

        let mut events = Vec::new();
        assert_eq!(job.run(|e| events.push(e)), JobStatus::Completed);
        let chunk_list = chunks(&events);
        assert_eq!(chunk_list.len(), 1);
        assert_eq!(chunk_list[0].points.len(), 11);
        assert!(chunk_list[0].is_complete);
    }

    #[test]
    fn test_final_step_lands_on_duration() {
        let (events, _) = run_collect(leo_request(100.0, 30.0), snapshot_of(vec![earth()]));
        let times: Vec<f64> = all_points(&events).iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 30.0, 60.0, 90.0, 100.0]);
    }

    #[test]
    fn test_j2_precesses_polar_orbit() {
        let a = LEO_RADIUS;
        let period = 2.0 * PI * (a.powi(3) / MU_EARTH).sqrt();
        let polar = |body: Body| {
            let mut request = leo_request(period, 60.0);
            request.velocity = Vector3::new(0.0, 0.0, circular_velocity(MU_EARTH, a));
            request.propagate_solar_system = false;
            let points = all_points(&run_collect(request, snapshot_of(vec![body])).0);
            let first = points.first().unwrap().position;
            let last = points.last().unwrap().position;
            last.sub(&first).magnitude()
        };

        let with_j2 = polar(earth());
        let mut spherical = earth();
        spherical.j2 = None;
        let without_j2 = polar(spherical);

        assert!(with_j2 > 1.0, "J2 drift {} km", with_j2);
        assert!(without_j2 < 0.5, "two-body drift {} km", without_j2);
        assert!(with_j2 > 10.0 * without_j2);
    }

    #[test]
    fn test_cancellation_stops_silently() {
        let cancel = CancellationFlag::new();
        let mut request = leo_request(5400.0, 60.0);
        request.points_per_chunk = Some(5);
        let mut job = PropagationJob::new(request, snapshot_of(vec![earth()]), 100, 1000, cancel.clone()).unwrap();

        let mut emitted = 0;
        for _ in 0..20 {
            emitted += job.step().len();
        }
        assert!(emitted > 0);

        cancel.cancel();
        assert!(job.step().is_empty());
        assert_eq!(job.status(), JobStatus::Cancelled);
        assert!(job.step().is_empty());
    }

    #[test]
    fn test_divergence_flushes_then_errors() {
        let mut request = leo_request(600.0, 60.0);
        request.velocity = Vector3::new(1e308, 0.0, 0.0);
        let (events, status) = run_collect(request, snapshot_of(vec![earth()]));

        assert_eq!(status, JobStatus::Failed);
        assert_eq!(events.len(), 2);
        match &events[0] {
            JobEvent::Chunk(c) => {
                assert!(!c.is_complete);
                assert_eq!(c.points.len(), 1);
            }
            other => panic!("expected chunk, got {:?}", other),
        }
        assert!(matches!(events[1], JobEvent::Error(EngineError::NumericalDivergence { central_body: 399, .. })));
    }

    #[test]
    fn test_request_validation() {
        let snapshot = snapshot_of(vec![earth()]);
        let check = |request: PropagationRequest, field: &str| {
            let err = PropagationJob::new(request, Arc::clone(&snapshot), 100, 1000, CancellationFlag::new())
                .err()
                .unwrap();
            match err {
                EngineError::InvalidRequest { field: f, .. } => assert_eq!(f, field),
                other => panic!("expected InvalidRequest, got {}", other),
            }
        };

        let mut r = leo_request(600.0, 60.0);
        r.time_step = 0.0;
        check(r, "timeStep");

        let mut r = leo_request(600.0, 60.0);
        r.time_step = 900.0;
        check(r, "timeStep");

        let mut r = leo_request(-1.0, 60.0);
        r.duration = -1.0;
        check(r, "duration");

        let mut r = leo_request(600.0, 60.0);
        r.position = Vector3::new(f64::NAN, 0.0, 0.0);
        check(r, "position");

        let mut r = leo_request(600.0, 60.0);
        r.points_per_chunk = Some(0);
        check(r, "pointsPerChunk");

        let mut r = leo_request(600.0, 60.0);
        r.satellite_id = " ".to_string();
        check(r, "satelliteId");

        let mut r = leo_request(600.0, 60.0);
        r.spacecraft = Some(SpacecraftProperties {
            mass_kg: 0.0,
            ..SpacecraftProperties::default()
        });
        check(r, "spacecraft");

        // 100000 steps against a 1000-step ceiling
        check(leo_request(100_000.0, 1.0), "duration");
    }

    #[test]
    fn test_perturbations_attached_when_requested() {
        let moon = point_body(301, BodyType::Moon, 4902.8, 66_000.0, Vector3::new(384_400.0, 0.0, 0.0));
        let mut request = leo_request(600.0, 60.0);
        request.include_perturbations = true;
        request.propagate_solar_system = false;
        let (events, _) = run_collect(request, snapshot_of(vec![earth(), moon]));

        let chunk = chunks(&events)[0];
        let breakdown = chunk.perturbations.as_ref().unwrap();
        assert_eq!(breakdown.central_body, 399);
        assert_eq!(breakdown.gravity.len(), 1);
        assert!(breakdown.j2.is_some());
    }

    #[test]
    fn test_request_json_defaults() {
        let json = r#"{
            "satelliteId": "iss", "position": [6771, 0, 0], "velocity": [0, 7.67, 0],
            "centralBodyNaifId": 399, "duration": 5400, "timeStep": 60,
            "propagateSolarSystem": false
        }"#;
        let request: PropagationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.points_per_chunk, None);
        assert!(request.spacecraft.is_none());
        assert!(!request.include_perturbations);
        assert_eq!(request.integrator, IntegratorKind::Rk4);
        assert_eq!(request.step_count(), 90);
    }

    #[test]
    fn test_point_json_uses_soi_exit_name() {
        let point = TrajectoryPoint {
            time: 0.0,
            position: Vector3::zero(),
            velocity: Vector3::zero(),
            central_body_naif_id: 399,
            is_soi_exit: true,
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["isSOIExit"], true);
        assert_eq!(json["centralBodyNaifId"], 399);
    }
}
