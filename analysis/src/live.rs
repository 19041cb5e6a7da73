//! Interactive single-position analysis.
//!
//! The newest request always wins. Lines from the previous position stay
//! visible until the first update for the new one arrives.

use std::sync::Arc;

use engine::{
    EngineLine, EngineSession, Evaluation, SearchRequest, SearchResult, SessionEvent,
    SubmissionError, SubmissionId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::Instrument;

use crate::cache::EvaluationCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOptions {
    pub depth: u32,
    pub line_count: u8,
}

/// What a live consumer displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
    /// Most recently requested position.
    pub fingerprint: Option<String>,
    /// Ranked lines, ascending.
    pub lines: Vec<EngineLine>,
    /// Primary line of `lines`.
    pub evaluation: Option<Evaluation>,
    pub is_ready: bool,
    pub is_analyzing: bool,
    pub last_error: Option<String>,
}

enum LiveCommand {
    Analyze(SearchRequest),
    Stop,
}

type Outcome = (SubmissionId, Result<SearchResult, SubmissionError>);

/// Handle to the live analysis actor.
#[derive(Clone)]
pub struct LiveAnalysis {
    cmd_tx: mpsc::Sender<LiveCommand>,
    state_tx: Arc<watch::Sender<LiveState>>,
    max_depth: u32,
}

impl LiveAnalysis {
    pub fn new(session: EngineSession, cache: EvaluationCache, max_depth: u32) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let events = session.subscribe();
        let state_tx = Arc::new(watch::Sender::new(LiveState {
            is_ready: session.state().is_ready(),
            ..Default::default()
        }));

        let actor = LiveActor {
            session,
            cache,
            state_tx: state_tx.clone(),
            current: None,
        };
        tokio::spawn(
            actor
                .run(cmd_rx, events)
                .instrument(tracing::info_span!("live_analysis")),
        );

        Self {
            cmd_tx,
            state_tx,
            max_depth: max_depth.max(1),
        }
    }

    /// Analyze `fingerprint`, replacing whatever was being analyzed.
    pub async fn analyze(&self, fingerprint: impl Into<String>, options: LiveOptions) {
        let depth = options.depth.min(self.max_depth);
        let request = SearchRequest::new(fingerprint, depth, options.line_count);
        let _ = self.cmd_tx.send(LiveCommand::Analyze(request)).await;
    }

    /// Stop analyzing. `is_analyzing` drops immediately; the engine
    /// confirms in the background. Safe to call repeatedly.
    pub async fn stop(&self) {
        self.state_tx.send_if_modified(|state| {
            let changed = state.is_analyzing;
            state.is_analyzing = false;
            changed
        });
        let _ = self.cmd_tx.send(LiveCommand::Stop).await;
    }

    pub fn state(&self) -> LiveState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveState> {
        self.state_tx.subscribe()
    }

    pub fn stream(&self) -> WatchStream<LiveState> {
        WatchStream::new(self.subscribe())
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }
}

struct Current {
    request: SearchRequest,
    submission: SubmissionId,
}

struct LiveActor {
    session: EngineSession,
    cache: EvaluationCache,
    state_tx: Arc<watch::Sender<LiveState>>,
    /// The request the consumer is waiting on. `None` after a stop.
    current: Option<Current>,
}

impl LiveActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<LiveCommand>,
        mut events: broadcast::Receiver<SessionEvent>,
    ) {
        tracing::debug!("Live analysis started");
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<Outcome>(32);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(LiveCommand::Analyze(request)) => self.analyze(request, &outcome_tx).await,
                    Some(LiveCommand::Stop) => self.stop().await,
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(RecvError::Lagged(skipped)) => self.resync(skipped),
                    Err(RecvError::Closed) => break,
                },
                Some((id, outcome)) = outcome_rx.recv() => {
                    self.handle_outcome(id, outcome, &outcome_tx).await;
                }
            }
        }
        tracing::debug!("Live analysis exited");
    }

    async fn analyze(&mut self, request: SearchRequest, outcome_tx: &mpsc::Sender<Outcome>) {
        tracing::debug!(
            fen = %request.fingerprint,
            depth = request.depth,
            "Live analysis requested"
        );
        self.state_tx.send_modify(|state| {
            state.fingerprint = Some(request.fingerprint.clone());
            state.is_analyzing = true;
            state.last_error = None;
        });
        self.submit(request, outcome_tx).await;
    }

    async fn submit(&mut self, request: SearchRequest, outcome_tx: &mpsc::Sender<Outcome>) {
        let submission = self.session.submit(request.clone()).await;
        let id = submission.id();
        self.current = Some(Current {
            request,
            submission: id,
        });

        let outcome_tx = outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = submission.await;
            let _ = outcome_tx.send((id, outcome)).await;
        });
    }

    async fn stop(&mut self) {
        self.current = None;
        self.state_tx.send_if_modified(|state| {
            let changed = state.is_analyzing;
            state.is_analyzing = false;
            changed
        });
        self.session.stop().await;
    }

    fn is_current(&self, id: SubmissionId) -> bool {
        self.current.as_ref().is_some_and(|c| c.submission == id)
    }

    fn set_ready(&self, ready: bool) {
        self.state_tx.send_if_modified(|state| {
            let changed = state.is_ready != ready;
            state.is_ready = ready;
            changed
        });
    }

    /// Skipped events may include a state change, so readiness is read
    /// back from the session itself.
    fn resync(&self, skipped: u64) {
        tracing::warn!(skipped, "Live analysis lagged behind engine events");
        self.set_ready(self.session.state().is_ready());
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StateChanged(session_state) => {
                self.set_ready(session_state.is_ready())
            }
            SessionEvent::Lines {
                submission, lines, ..
            } if self.is_current(submission) => {
                self.state_tx.send_modify(|state| {
                    state.evaluation = lines.first().map(|line| line.evaluation.clone());
                    state.lines = lines;
                });
            }
            _ => {}
        }
    }

    async fn handle_outcome(
        &mut self,
        id: SubmissionId,
        outcome: Result<SearchResult, SubmissionError>,
        outcome_tx: &mpsc::Sender<Outcome>,
    ) {
        if !self.is_current(id) {
            return;
        }

        match outcome {
            Ok(result) => {
                tracing::debug!(
                    fen = %result.fingerprint,
                    depth = result.evaluation.depth,
                    "Live analysis complete"
                );
                self.cache
                    .insert(result.fingerprint.clone(), result.evaluation.clone());
                self.current = None;
                self.state_tx.send_modify(|state| {
                    if !result.lines.is_empty() {
                        state.lines = result.lines;
                    }
                    state.evaluation = Some(result.evaluation);
                    state.is_analyzing = false;
                });
            }
            Err(SubmissionError::EngineFailed) => {
                if let Some(current) = self.current.take() {
                    let fen = &current.request.fingerprint;
                    tracing::info!(%fen, "Engine failed, resubmitting");
                    self.submit(current.request, outcome_tx).await;
                }
            }
            Err(reason) => {
                tracing::debug!(%reason, "Live analysis ended");
                self.current = None;
                let error = match reason {
                    SubmissionError::Stopped | SubmissionError::Superseded => None,
                    other => Some(other.to_string()),
                };
                self.state_tx.send_modify(|state| {
                    state.is_analyzing = false;
                    state.last_error = error;
                });
            }
        }
    }
}
