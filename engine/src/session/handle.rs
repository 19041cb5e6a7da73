use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::Instrument;

use super::actor::SessionActor;
use super::commands::SessionCommand;
use super::{
    SearchRequest, SessionConfig, SessionEvent, SessionSnapshot, SessionState, Submission,
    SubmissionId,
};
use crate::stockfish::EngineLauncher;

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 1024;

/// Cheap, cloneable handle to a session actor.
#[derive(Clone)]
pub struct EngineSession {
    label: Arc<str>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    next_id: Arc<AtomicU64>,
}

impl EngineSession {
    /// Spawn the actor and begin launching the engine. Must be called from
    /// within a tokio runtime.
    pub fn start(launcher: Arc<dyn EngineLauncher>, config: SessionConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let label: Arc<str> = Arc::from(config.label.as_str());
        let span = tracing::info_span!("engine_session", label = %label);
        let actor = SessionActor::new(launcher, config, cmd_rx, event_tx.clone(), snapshot_tx);
        tokio::spawn(actor.run().instrument(span));

        Self {
            label,
            cmd_tx,
            event_tx,
            snapshot_rx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queue a search. The returned [`Submission`] resolves when the engine
    /// announces its best move, or with the reason the search was rejected.
    pub async fn submit(&self, request: SearchRequest) -> Submission {
        let id = SubmissionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        tracing::debug!(
            session = %self.label,
            %id,
            fen = %request.fingerprint,
            "Submitting search"
        );
        // A closed actor drops `tx`, which resolves the submission as closed.
        let _ = self
            .cmd_tx
            .send(SessionCommand::Submit {
                id,
                request,
                reply: tx,
            })
            .await;
        Submission::new(id, rx)
    }

    /// Interrupt the running search and drop any pending one. The session
    /// stays `Analyzing` until the engine confirms with `bestmove`.
    pub async fn stop(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Stop).await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot_rx.borrow().state
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Send `quit`, release the process and reject outstanding submissions.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(SessionCommand::Shutdown { reply: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}
