// Protocol - Inbound requests and outbound events, one JSON object per line
// Tagged on "type"; unknown types and missing fields surface as MalformedMessage

use serde::{Deserialize, Serialize};

use crate::bodies::{Body, Hierarchy, SimulationEpoch};
use crate::error::{EngineError, Result};
use crate::propagation::{JobEvent, PropagationRequest, TrajectoryChunk};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    /// Replace the registry snapshot used by jobs started from now on
    #[serde(rename_all = "camelCase")]
    UpdatePhysicsState {
        bodies: Vec<Body>,
        #[serde(default)]
        hierarchy: Hierarchy,
        current_time: SimulationEpoch, // Unix ms
    },
    Propagate(PropagationRequest),
    /// Stop the active job at its next step boundary
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    #[serde(rename_all = "camelCase")]
    Chunk {
        satellite_id: String,
        #[serde(flatten)]
        chunk: TrajectoryChunk,
    },
    #[serde(rename_all = "camelCase")]
    Complete { satellite_id: String },
    #[serde(rename_all = "camelCase")]
    Error {
        satellite_id: Option<String>,
        error: String,
    },
}

impl Outbound {
    pub fn error(satellite_id: Option<&str>, err: &EngineError) -> Self {
        Self::Error {
            satellite_id: satellite_id.map(str::to_string),
            error: err.to_string(),
        }
    }

    pub fn from_job_event(satellite_id: &str, event: JobEvent) -> Self {
        match event {
            JobEvent::Chunk(chunk) => Self::Chunk {
                satellite_id: satellite_id.to_string(),
                chunk,
            },
            JobEvent::Complete => Self::Complete {
                satellite_id: satellite_id.to_string(),
            },
            JobEvent::Error(err) => Self::error(Some(satellite_id), &err),
        }
    }

    pub fn satellite_id(&self) -> Option<&str> {
        match self {
            Self::Chunk { satellite_id, .. } | Self::Complete { satellite_id } => Some(satellite_id),
            Self::Error { satellite_id, .. } => satellite_id.as_deref(),
        }
    }

    /// `complete` and `error` end a request's stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }
}

pub fn decode_inbound(line: &str) -> Result<Inbound> {
    serde_json::from_str(line).map_err(EngineError::from)
}

pub fn encode_outbound(message: &Outbound) -> Result<String> {
    serde_json::to_string(message).map_err(EngineError::from)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics_engine::Vector3;
    use crate::propagation::TrajectoryPoint;
    use crate::soi::SoiTransitionEvent;

    #[test]
    fn test_decode_propagate() {
        let line = r#"{"type":"propagate","satelliteId":"sat-7","position":[6771,0,0],
            "velocity":[0,7.67,0],"centralBodyNaifId":399,"duration":5400,"timeStep":60,
            "pointsPerChunk":25,"propagateSolarSystem":true}"#;
        match decode_inbound(line).unwrap() {
            Inbound::Propagate(request) => {
                assert_eq!(request.satellite_id, "sat-7");
                assert_eq!(request.points_per_chunk, Some(25));
                assert!(request.propagate_solar_system);
                assert_eq!(request.position, Vector3::new(6771.0, 0.0, 0.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_update_with_hierarchy() {
        let line = r#"{"type":"updatePhysicsState","currentTime":1746921600000,
            "hierarchy":{"399":10,"10":null},
            "bodies":[{"naifId":10,"type":"star","position":[0,0,0],"velocity":[0,0,0],
                       "GM":132712440018,"radius":695700,"soiRadius":1.5e10}]}"#;
        match decode_inbound(line).unwrap() {
            Inbound::UpdatePhysicsState {
                bodies,
                hierarchy,
                current_time,
            } => {
                assert_eq!(bodies.len(), 1);
                assert_eq!(hierarchy.parent_of(399), Some(10));
                assert_eq!(hierarchy.parent_of(10), None);
                assert_eq!(current_time.unix_millis, 1_746_921_600_000.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_cancel_and_missing_hierarchy() {
        assert!(matches!(decode_inbound(r#"{"type":"cancel"}"#).unwrap(), Inbound::Cancel));

        let line = r#"{"type":"updatePhysicsState","bodies":[],"currentTime":0}"#;
        match decode_inbound(line).unwrap() {
            Inbound::UpdatePhysicsState { hierarchy, .. } => assert!(hierarchy.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_messages_name_the_problem() {
        let err = decode_inbound(r#"{"type":"propagate","satelliteId":"x"}"#).unwrap_err();
        assert!(matches!(err, EngineError::MalformedMessage(_)));
        assert!(err.to_string().contains("missing field"));

        let err = decode_inbound(r#"{"type":"warp"}"#).unwrap_err();
        assert!(err.to_string().contains("warp"));

        assert!(decode_inbound("not json").is_err());
    }

    #[test]
    fn test_encode_chunk_is_flat() {
        let chunk = TrajectoryChunk {
            points: vec![TrajectoryPoint {
                time: 60.0,
                position: Vector3::new(1.0, 2.0, 3.0),
                velocity: Vector3::zero(),
                central_body_naif_id: 399,
                is_soi_exit: false,
            }],
            soi_transitions: vec![SoiTransitionEvent {
                time: 60.0,
                from_body: 399,
                to_body: Some(10),
                position: Vector3::zero(),
                velocity: Vector3::zero(),
            }],
            progress: 0.5,
            is_complete: false,
            perturbations: None,
        };
        let message = Outbound::from_job_event("sat-1", JobEvent::Chunk(chunk));
        let json: serde_json::Value = serde_json::from_str(&encode_outbound(&message).unwrap()).unwrap();

        assert_eq!(json["type"], "chunk");
        assert_eq!(json["satelliteId"], "sat-1");
        assert_eq!(json["progress"], 0.5);
        assert_eq!(json["isComplete"], false);
        assert_eq!(json["points"][0]["position"][1], 2.0);
        assert_eq!(json["soiTransitions"][0]["toBody"], 10);
        assert!(json.get("perturbations").is_none());
        assert!(!message.is_terminal());
    }

    #[test]
    fn test_encode_terminal_events() {
        let complete = Outbound::from_job_event("sat-1", JobEvent::Complete);
        assert_eq!(encode_outbound(&complete).unwrap(), r#"{"type":"complete","satelliteId":"sat-1"}"#);
        assert!(complete.is_terminal());

        let error = Outbound::error(None, &EngineError::CentralBodyNotFound(999));
        let json: serde_json::Value = serde_json::from_str(&encode_outbound(&error).unwrap()).unwrap();
        assert_eq!(json["type"], "error");
        assert!(json["satelliteId"].is_null());
        assert_eq!(json["error"], "Central body 999 not found");
        assert_eq!(error.satellite_id(), None);
    }
}
