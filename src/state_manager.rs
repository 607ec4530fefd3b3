// State Manager - The engine task: registry ownership, job queue and message pump
// Callers talk to it only through channels; one job runs at a time, later requests queue FIFO

use log::{debug, error, info, warn};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::bodies::BodyRegistry;
use crate::catalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::propagation::{CancellationFlag, PropagationJob, PropagationRequest};
use crate::protocol::{self, Inbound, Outbound};

// =============================================================================
// HANDLE (caller side)
// =============================================================================

/// What the engine reads from its inbox
#[derive(Debug)]
pub enum Command {
    Message(Inbound),
    /// Input that failed to decode, reported back in stream order
    Reject(EngineError),
}

/// Cloneable sending half of the engine inbox
#[derive(Debug, Clone)]
pub struct InboundSender(mpsc::UnboundedSender<Command>);

impl InboundSender {
    pub fn new(sender: mpsc::UnboundedSender<Command>) -> Self {
        Self(sender)
    }

    pub fn send(&self, message: Inbound) -> Result<()> {
        self.0
            .send(Command::Message(message))
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Decode one JSON line and forward it; a bad line becomes an `error` event
    pub fn send_line(&self, line: &str) -> Result<()> {
        let command = match protocol::decode_inbound(line) {
            Ok(message) => Command::Message(message),
            Err(e) => {
                warn!("Malformed inbound line: {}", e);
                Command::Reject(e)
            }
        };
        self.0.send(command).map_err(|_| EngineError::ChannelClosed)
    }
}

pub struct EngineHandle {
    pub inbound: InboundSender,
    pub outbound: mpsc::Receiver<Outbound>,
    pub task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn send(&self, message: Inbound) -> Result<()> {
        self.inbound.send(message)
    }

    pub fn send_line(&self, line: &str) -> Result<()> {
        self.inbound.send_line(line)
    }

    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }
}

// =============================================================================
// ENGINE (task side)
// =============================================================================

pub struct Engine {
    config: EngineConfig,
    registry: BodyRegistry,
    inbox: mpsc::UnboundedReceiver<Command>,
    outbox: mpsc::Sender<Outbound>,
    queue: VecDeque<PropagationRequest>,
    active: Option<PropagationJob>,
    inbox_closed: bool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        inbox: mpsc::UnboundedReceiver<Command>,
        outbox: mpsc::Sender<Outbound>,
    ) -> Self {
        let registry = BodyRegistry::new();
        if config.preload_catalog {
            match catalog::default_snapshot(config.catalog_epoch) {
                Ok(snapshot) => {
                    registry.replace(snapshot);
                    info!("Registry seeded with built-in catalog at {}", config.catalog_epoch);
                }
                Err(e) => warn!("Built-in catalog rejected, starting empty: {}", e),
            }
        }

        Self {
            config,
            registry,
            inbox,
            outbox,
            queue: VecDeque::new(),
            active: None,
            inbox_closed: false,
        }
    }

    /// Start the engine on the current tokio runtime
    pub fn spawn(config: EngineConfig) -> EngineHandle {
        let (inbound, inbox) = mpsc::unbounded_channel();
        let (outbox, outbound) = mpsc::channel(config.outbound_capacity.max(1));
        let engine = Self::new(config, inbox, outbox);
        let task = tokio::spawn(engine.run());
        EngineHandle {
            inbound: InboundSender::new(inbound),
            outbound,
            task,
        }
    }

    /// Runs until the inbox is closed with no work left, or the outbound side hangs up
    pub async fn run(mut self) {
        info!("Engine started");
        loop {
            let outcome = if self.active.is_some() {
                self.advance_active().await
            } else if let Some(request) = self.queue.pop_front() {
                self.start_job(request).await
            } else if self.inbox_closed {
                break;
            } else {
                match self.inbox.recv().await {
                    Some(message) => self.handle(message).await,
                    None => {
                        self.inbox_closed = true;
                        Ok(())
                    }
                }
            };

            if let Err(e) = outcome {
                debug!("Engine stopping: {}", e);
                break;
            }
        }
        info!("Engine stopped");
    }

    async fn handle(&mut self, command: Command) -> Result<()> {
        let message = match command {
            Command::Message(message) => message,
            Command::Reject(e) => return self.emit(Outbound::error(None, &e)).await,
        };

        match message {
            Inbound::UpdatePhysicsState {
                bodies,
                hierarchy,
                current_time,
            } => {
                if let Err(e) = self.registry.update(bodies, hierarchy, current_time) {
                    warn!("Registry update rejected: {}", e);
                    self.emit(Outbound::error(None, &e)).await?;
                }
            }
            Inbound::Propagate(request) => {
                if let Some(active) = &self.active {
                    info!(
                        "Job {} queued behind {} ({} waiting)",
                        request.satellite_id,
                        active.satellite_id(),
                        self.queue.len() + 1
                    );
                }
                self.queue.push_back(request);
            }
            Inbound::Cancel => match &self.active {
                Some(job) => job.cancellation().cancel(),
                None => debug!("Cancel with no active job ignored"),
            },
        }
        Ok(())
    }

    async fn start_job(&mut self, request: PropagationRequest) -> Result<()> {
        let satellite_id = request.satellite_id.clone();
        let snapshot = self.registry.snapshot();
        let (chunk_size, max_steps) = (self.config.default_points_per_chunk, self.config.max_steps);

        let created = guarded(|| {
            PropagationJob::new(request, snapshot, chunk_size, max_steps, CancellationFlag::new())
        })
        .and_then(|job| job);

        match created {
            Ok(job) => self.active = Some(job),
            Err(e) => {
                if e.is_configuration() {
                    warn!("Job {} rejected: {}", satellite_id, e);
                } else {
                    error!("Job {} failed to start: {}", satellite_id, e);
                }
                self.emit(Outbound::error(Some(satellite_id.as_str()), &e)).await?;
            }
        }
        Ok(())
    }

    /// One step of the active job, then a look at the inbox and a yield
    async fn advance_active(&mut self) -> Result<()> {
        let Some(mut job) = self.active.take() else {
            return Ok(());
        };
        let satellite_id = job.satellite_id().to_string();

        match guarded(|| job.step()) {
            Ok(events) => {
                for event in events {
                    self.emit(Outbound::from_job_event(&satellite_id, event)).await?;
                }
                if !job.is_finished() {
                    self.active = Some(job);
                }
            }
            Err(e) => {
                error!("Job {} aborted: {}", satellite_id, e);
                self.emit(Outbound::error(Some(satellite_id.as_str()), &e)).await?;
            }
        }

        self.drain_inbox().await?;
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn drain_inbox(&mut self) -> Result<()> {
        while !self.inbox_closed {
            match self.inbox.try_recv() {
                Ok(message) => self.handle(message).await?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.inbox_closed = true,
            }
        }
        Ok(())
    }

    async fn emit(&self, message: Outbound) -> Result<()> {
        self.outbox.send(message).await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Run `f`, converting a panic into `JobPanicked`
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| EngineError::JobPanicked(panic_message(payload)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
