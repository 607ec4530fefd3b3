// SOI Propagator - Patched-conic trajectory propagation engine
// Library entry point: module tree and the stdio JSON-lines host

pub mod acceleration;
pub mod bodies;
pub mod catalog;
pub mod config;
pub mod ephemeris;
pub mod error;
pub mod integrator;
pub mod physics_engine;
pub mod propagation;
pub mod protocol;
pub mod soi;
pub mod state_manager;

pub use acceleration::{AccelerationModel, PerturbationBreakdown, SpacecraftProperties};
pub use bodies::{Body, BodyId, BodyRegistry, BodyType, Hierarchy, RegistrySnapshot, SimulationEpoch};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use propagation::{
    CancellationFlag, PropagationJob, PropagationRequest, TrajectoryChunk, TrajectoryPoint,
};
pub use protocol::{Inbound, Outbound};
pub use soi::{FrameState, SoiFrameManager, SoiTransitionEvent};
pub use state_manager::{Engine, EngineHandle, InboundSender};

use log::{debug, error, info};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Serve the engine over stdin/stdout until stdin closes and all work drains.
/// Each line in is one `Inbound` message, each line out one `Outbound` event.
pub async fn run(config: EngineConfig) -> Result<()> {
    let EngineHandle {
        inbound,
        mut outbound,
        task,
    } = Engine::spawn(config);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbound.recv().await {
            let mut line = protocol::encode_outbound(&message)?;
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
            if message.is_terminal() {
                debug!("Stream closed for {}", message.satellite_id().unwrap_or("<none>"));
            }
        }
        Ok::<(), EngineError>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if inbound.send_line(&line).is_err() {
            break;
        }
    }
    info!("Input closed, draining remaining work");
    drop(inbound);

    if let Err(e) = task.await {
        error!("Engine task failed: {}", e);
    }
    match writer.await {
        Ok(result) => result,
        Err(e) => {
            error!("Output task failed: {}", e);
            Ok(())
        }
    }
}
