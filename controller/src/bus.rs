//! Serialized access to the outbound CAN bus.
//!
//! Three loops write to the bus (control, drivetrain, heartbeat), but a
//! mode entry or shoot sequence must land on the wire as one uninterrupted
//! block; a foreign frame between two of its writes can produce an unsafe
//! mechanical intermediate state. The bus is therefore owned by a single
//! writer task, and a whole sequence, settle delays included, is one queue
//! entry. Concurrent writers stall behind it for the duration.

use r1_protocol::can::{CanCommand, CanId};
use socketcan::{CanFrame, EmbeddedFrame, Id, StandardId};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error};

/// Queue depth for pending write requests. Has to absorb the heartbeats
/// that queue up behind a long entry sequence.
const QUEUE_DEPTH: usize = 64;

/// One step of a multi-write sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Put a frame on the bus.
    Frame(CanCommand),
    /// Let the mechanics settle before the next frame.
    Settle(Duration),
}

impl Step {
    pub(crate) fn frame(id: CanId, payload: impl Into<Vec<u8>>) -> Self {
        Self::Frame(CanCommand::new(id, payload))
    }

    pub(crate) fn settle(interval: Duration) -> Self {
        Self::Settle(interval)
    }
}

/// A queued write request, executed in full before the next one is taken.
#[derive(Debug)]
struct Request {
    steps: Vec<Step>,
    done: Option<oneshot::Sender<()>>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum BusError {
    #[error("bus writer is no longer running")]
    WriterGone,
}

/// Cloneable handle through which every loop reaches the writer task.
#[derive(Debug, Clone)]
pub(crate) struct Bus {
    tx: mpsc::Sender<Request>,
}

impl Bus {
    /// Spawns the writer task around a sink and returns the shared handle.
    pub(crate) fn spawn<S>(sink: S) -> Self
    where
        S: FrameSink + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(writer_task(sink, rx));
        Self { tx }
    }

    /// Queues a single fire-and-forget frame.
    pub(crate) async fn send(
        &self,
        id: CanId,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), BusError> {
        self.tx
            .send(Request {
                steps: vec![Step::frame(id, payload)],
                done: None,
            })
            .await
            .map_err(|_| BusError::WriterGone)
    }

    /// Runs a sequence of writes and settle delays as one indivisible bus
    /// block, returning once the final step has completed. The caller is
    /// blocked for the sequence's full duration.
    pub(crate) async fn run_sequence(&self, steps: Vec<Step>) -> Result<(), BusError> {
        let (done_tx, done_rx) = oneshot::channel();

        self.tx
            .send(Request {
                steps,
                done: Some(done_tx),
            })
            .await
            .map_err(|_| BusError::WriterGone)?;

        done_rx.await.map_err(|_| BusError::WriterGone)
    }
}

/// Where frames ultimately go. Production writes to a socketcan socket;
/// tests record frames in arrival order.
pub(crate) trait FrameSink {
    fn send(
        &mut self,
        command: &CanCommand,
    ) -> impl std::future::Future<Output = std::io::Result<()>> + Send;
}

async fn writer_task<S: FrameSink>(mut sink: S, mut rx: mpsc::Receiver<Request>) {
    debug!("Bus writer running");

    while let Some(request) = rx.recv().await {
        for step in &request.steps {
            match step {
                Step::Frame(command) => {
                    // A failed write is logged and skipped; there is no
                    // retry path anywhere on this bus.
                    if let Err(e) = sink.send(command).await {
                        error!("CAN write failed: {e}");
                    }
                }
                Step::Settle(interval) => tokio::time::sleep(*interval).await,
            }
        }

        if let Some(done) = request.done {
            let _ = done.send(());
        }
    }

    debug!("Bus writer stopped");
}

/// Production sink: one owned socketcan socket.
pub(crate) struct CanSink {
    socket: socketcan::tokio::CanSocket,
}

impl CanSink {
    pub(crate) fn open(interface: &str) -> std::io::Result<Self> {
        Ok(Self {
            socket: socketcan::tokio::CanSocket::open(interface)?,
        })
    }
}

impl FrameSink for CanSink {
    async fn send(&mut self, command: &CanCommand) -> std::io::Result<()> {
        // Registry ids are 11 bit and payloads are at most three bytes, so
        // frame construction cannot fail for well-formed commands.
        let id = StandardId::new(command.id.address()).expect("registry id fits 11 bits");
        let frame = CanFrame::new(id, &command.payload).expect("registry payload fits one frame");

        self.socket.write_frame(frame).await
    }
}

/// Spawns the inbound listener on its own socket.
///
/// Error frames are logged and otherwise ignored (a bus fault is non-fatal
/// and never retried); recognised response ids are published for the
/// optional mechanism readiness wait; everything else is discarded.
pub(crate) fn spawn_listener(interface: &str) -> std::io::Result<broadcast::Sender<CanId>> {
    let socket = socketcan::tokio::CanSocket::open(interface)?;
    let (tx, _) = broadcast::channel(16);

    tokio::spawn(listener_task(socket, tx.clone()));

    Ok(tx)
}

async fn listener_task(mut socket: socketcan::tokio::CanSocket, tx: broadcast::Sender<CanId>) {
    debug!("Bus listener running");

    loop {
        match socket.read_frame().await {
            Ok(CanFrame::Data(frame)) => {
                if let Id::Standard(raw) = frame.id() {
                    if let Some(id) = CanId::from_address(raw.as_raw()) {
                        // Nobody listening is fine; the handshake wait is
                        // optional and usually disabled.
                        let _ = tx.send(id);
                    }
                }
            }
            Ok(CanFrame::Remote(_)) => {}
            Ok(CanFrame::Error(frame)) => error!("CAN bus fault: {frame:?}"),
            Err(e) => error!("CAN receive failed: {e}"),
        }
    }
}
