//! Viewer session: the single dispatch loop that owns the packing state.
//!
//! Every inbound event is turned into a [`Command`] and queued on one mpsc
//! channel. The loop handles commands strictly one after another, so state
//! mutations never interleave and snapshots are published in mutation order.
//! Each viewer gets its own bounded outbound queue, written only by the loop.
//! A viewer that lets its queue fill up is dropped rather than left on stale
//! state; its connection closes and a reconnect starts from a fresh snapshot.
//! Packer runs are spawned off the loop and post their result back as a
//! command.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::bridge::{ExternalPacker, PackerReport};
use crate::config::SessionConfig;
use crate::model::{DimensionsPatch, PackerDimensions};
use crate::protocol::{ClientEvent, ProtocolError, ServerEvent};
use crate::store::StateStore;

pub type ViewerId = u64;

type Outbox = mpsc::Sender<Arc<ServerEvent>>;

const COMMAND_QUEUE: usize = 256;
const ALGORITHM_STARTED: &str = "Algorithm started running";

#[derive(Debug, Error)]
#[error("session dispatch loop has stopped")]
pub struct SessionClosed;

#[derive(Debug)]
enum Command {
    Join { viewer: ViewerId, outbox: Outbox },
    Leave { viewer: ViewerId },
    Event { viewer: ViewerId, event: ClientEvent },
    Reject { viewer: ViewerId, error: ProtocolError },
    PackingFinished { viewer: ViewerId, report: PackerReport },
}

/// Cloneable entry point used by connection handlers.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    next_viewer: Arc<AtomicU64>,
    viewer_queue: usize,
}

impl SessionHandle {
    /// Registers a new viewer; its first inbound message is the full state.
    pub async fn join(&self) -> Result<Viewer, SessionClosed> {
        let id = self.next_viewer.fetch_add(1, Ordering::Relaxed);
        let (outbox, inbox) = mpsc::channel(self.viewer_queue);
        self.send(Command::Join { viewer: id, outbox }).await?;
        Ok(Viewer { id, inbox })
    }

    /// Queues an inbound event from `viewer`.
    pub async fn submit(&self, viewer: ViewerId, event: ClientEvent) -> Result<(), SessionClosed> {
        self.send(Command::Event { viewer, event }).await
    }

    /// Reports an unparsable frame back to `viewer`.
    pub async fn reject(&self, viewer: ViewerId, error: ProtocolError) -> Result<(), SessionClosed> {
        self.send(Command::Reject { viewer, error }).await
    }

    pub async fn leave(&self, viewer: ViewerId) -> Result<(), SessionClosed> {
        self.send(Command::Leave { viewer }).await
    }

    async fn send(&self, command: Command) -> Result<(), SessionClosed> {
        self.commands.send(command).await.map_err(|_| SessionClosed)
    }
}

/// Receiving side of one viewer's outbound queue.
#[derive(Debug)]
pub struct Viewer {
    id: ViewerId,
    inbox: mpsc::Receiver<Arc<ServerEvent>>,
}

impl Viewer {
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// Next event for this viewer, `None` once the session dropped it.
    #[cfg(test)]
    async fn recv(&mut self) -> Option<Arc<ServerEvent>> {
        self.inbox.recv().await
    }

    pub fn into_stream(self) -> ReceiverStream<Arc<ServerEvent>> {
        ReceiverStream::new(self.inbox)
    }
}

/// State owned by the dispatch loop.
pub struct Session {
    store: StateStore,
    dimensions: PackerDimensions,
    packer: ExternalPacker,
    viewers: HashMap<ViewerId, Outbox>,
    commands: mpsc::Receiver<Command>,
    loopback: mpsc::WeakSender<Command>,
}

impl Session {
    /// Starts the dispatch loop on the current runtime.
    ///
    /// The loop ends once every [`SessionHandle`] is dropped and no packer
    /// run is pending.
    pub fn spawn(config: &SessionConfig, packer: ExternalPacker) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let session = Session {
            store: StateStore::new(),
            dimensions: config.initial_dimensions(),
            packer,
            viewers: HashMap::new(),
            commands: rx,
            loopback: tx.downgrade(),
        };

        let handle = SessionHandle {
            commands: tx,
            next_viewer: Arc::new(AtomicU64::new(1)),
            viewer_queue: config.viewer_queue(),
        };

        (handle, tokio::spawn(session.run()))
    }

    async fn run(mut self) {
        tracing::info!(dimensions = %self.dimensions, "session dispatch loop started");
        while let Some(command) = self.commands.recv().await {
            self.dispatch(command);
        }
        tracing::info!("session dispatch loop stopped");
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::Join { viewer, outbox } => {
                self.viewers.insert(viewer, outbox);
                tracing::info!(viewer, viewers = self.viewers.len(), "viewer joined");
                self.send_snapshot(viewer);
            }
            Command::Leave { viewer } => {
                if self.viewers.remove(&viewer).is_some() {
                    tracing::info!(viewer, viewers = self.viewers.len(), "viewer left");
                }
            }
            Command::Event { viewer, event } => self.handle_event(viewer, event),
            Command::Reject { viewer, error } => {
                tracing::warn!(viewer, %error, "rejected frame");
                self.send_to(viewer, ServerEvent::rejection(error.event(), &error));
            }
            Command::PackingFinished { viewer, report } => {
                self.send_to(viewer, ServerEvent::PackingAlgorithmResult(report));
            }
        }
    }

    fn handle_event(&mut self, viewer: ViewerId, event: ClientEvent) {
        tracing::debug!(viewer, event = event.name(), "handling event");

        match event {
            ClientEvent::Connect => self.send_snapshot(viewer),
            ClientEvent::AddBox(request) => {
                match self
                    .store
                    .replace_containers_and_place(request.containers, &request.item)
                {
                    Some((container, placement)) => tracing::debug!(
                        viewer,
                        container,
                        id = ?request.item.id(),
                        position = ?placement.position,
                        orientation = ?placement.orientation,
                        "box placed"
                    ),
                    None => tracing::debug!(
                        viewer,
                        width = request.item.width,
                        height = request.item.height,
                        length = request.item.length,
                        "box did not fit into any container"
                    ),
                }
                self.broadcast_snapshot();
            }
            ClientEvent::UpdateGeneration(draft) => match self.store.finalize_generation(draft) {
                Ok(()) => self.broadcast_snapshot(),
                Err(err) => {
                    tracing::warn!(viewer, error = %err, "generation rejected");
                    self.send_to(viewer, ServerEvent::rejection("update_generation", err));
                }
            },
            ClientEvent::RemainingVolume(request) => {
                let found = self
                    .store
                    .update_remaining_volume(&request.container_id, request.total_remaining_volume);
                if !found {
                    tracing::debug!(viewer, container_id = %request.container_id, "unknown container");
                }
                self.broadcast_snapshot();
            }
            ClientEvent::RunPackingAlgorithm(patch) => self.start_packing(viewer, &patch),
            ClientEvent::UpdateContainerDimensions(patch) => {
                match PackerDimensions::from_required(&patch) {
                    Ok(dimensions) => {
                        self.dimensions = dimensions;
                        tracing::info!(viewer, %dimensions, "container dimensions updated");
                    }
                    Err(err) => {
                        tracing::warn!(viewer, error = %err, "invalid container dimensions");
                        self.send_to(viewer, ServerEvent::rejection("update_container_dimensions", err));
                    }
                }
            }
        }
    }

    fn start_packing(&mut self, viewer: ViewerId, patch: &DimensionsPatch) {
        let dimensions = match self.dimensions.overlay(patch) {
            Ok(dimensions) => dimensions,
            Err(err) => {
                tracing::warn!(viewer, error = %err, "packing request rejected");
                self.send_to(
                    viewer,
                    ServerEvent::PackingAlgorithmResult(PackerReport::failure(err.to_string())),
                );
                return;
            }
        };
        self.dimensions = dimensions;

        let Some(loopback) = self.loopback.upgrade() else {
            return;
        };

        tracing::info!(viewer, %dimensions, "running packing algorithm");
        self.broadcast(ServerEvent::AlgorithmStarted {
            status: ALGORITHM_STARTED.to_string(),
        });

        let packer = self.packer.clone();
        tokio::spawn(async move {
            let report = packer.run_report(dimensions).await;
            if loopback
                .send(Command::PackingFinished { viewer, report })
                .await
                .is_err()
            {
                tracing::debug!(viewer, "session stopped before packer result arrived");
            }
        });
    }

    fn send_snapshot(&mut self, viewer: ViewerId) {
        let snapshot = ServerEvent::UpdateData(self.store.state().clone());
        self.send_to(viewer, snapshot);
    }

    fn broadcast_snapshot(&mut self) {
        self.broadcast(ServerEvent::UpdateData(self.store.state().clone()));
    }

    fn send_to(&mut self, viewer: ViewerId, event: ServerEvent) {
        let Some(outbox) = self.viewers.get(&viewer) else {
            return;
        };
        if !deliver(viewer, outbox, Arc::new(event)) {
            self.viewers.remove(&viewer);
        }
    }

    fn broadcast(&mut self, event: ServerEvent) {
        let event = Arc::new(event);
        self.viewers
            .retain(|&viewer, outbox| deliver(viewer, outbox, Arc::clone(&event)));
    }
}

/// Queues `event` for one viewer; `false` means the viewer must be dropped.
fn deliver(viewer: ViewerId, outbox: &Outbox, event: Arc<ServerEvent>) -> bool {
    match outbox.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(viewer, "viewer queue full, disconnecting viewer");
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(viewer, "viewer queue closed");
            false
        }
    }
}
