use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep_until, Instant};

use super::commands::SessionCommand;
use super::{
    SearchRequest, SearchResult, SessionConfig, SessionEvent, SessionSnapshot, SessionState,
    SubmissionError, SubmissionId, SubmissionReply,
};
use crate::evaluation::{EngineLine, LineTable};
use crate::stockfish::{EngineIo, EngineLauncher};
use crate::uci::{parse_uci_message, EngineCommand, EngineInfo, UciMessage};
use crate::{EngineError, UciMessageDirection};

const MAX_THREADS: u32 = 16;
const MAX_HASH_MB: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    Idle,
    AwaitingUciOk,
    AwaitingReadyOk,
    Done,
}

struct PendingSearch {
    id: SubmissionId,
    request: SearchRequest,
    reply: SubmissionReply,
}

impl PendingSearch {
    fn reject(self, reason: SubmissionError) {
        tracing::debug!(id = %self.id, %reason, "Rejecting submission");
        let _ = self.reply.send(Err(reason));
    }
}

/// Accumulator for the search the engine is currently running. Discarded
/// on `bestmove`.
struct ActiveSearch {
    id: SubmissionId,
    request: SearchRequest,
    reply: SubmissionReply,
    table: LineTable,
    stop_sent: bool,
}

enum Wake {
    Command(Option<SessionCommand>),
    Line(Option<String>),
    Restart,
    HandshakeTimeout,
}

pub(crate) struct SessionActor {
    launcher: Arc<dyn EngineLauncher>,
    config: SessionConfig,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,

    state: SessionState,
    io: Option<EngineIo>,
    handshake: Handshake,
    handshake_deadline: Option<Instant>,
    restart_at: Option<Instant>,
    configured_multipv: u8,

    active: Option<ActiveSearch>,
    pending: Option<PendingSearch>,
    last_fingerprint: Option<String>,
    last_lines: Vec<EngineLine>,
}

impl SessionActor {
    pub(crate) fn new(
        launcher: Arc<dyn EngineLauncher>,
        config: SessionConfig,
        cmd_rx: mpsc::Receiver<SessionCommand>,
        event_tx: broadcast::Sender<SessionEvent>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        let configured_multipv = config.multipv.max(1);
        Self {
            launcher,
            config,
            cmd_rx,
            event_tx,
            snapshot_tx,
            state: SessionState::Uninitialized,
            io: None,
            handshake: Handshake::Idle,
            handshake_deadline: None,
            restart_at: None,
            configured_multipv,
            active: None,
            pending: None,
            last_fingerprint: None,
            last_lines: Vec::new(),
        }
    }

    /// Owns all mutable session state. Commands, engine output and timers
    /// are processed one at a time.
    pub(crate) async fn run(mut self) {
        tracing::info!("Engine session actor started");
        self.launch().await;

        loop {
            let wake = tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => Wake::Command(cmd),
                line = next_line(&mut self.io) => Wake::Line(line),
                _ = sleep_until_opt(self.handshake_deadline) => Wake::HandshakeTimeout,
                _ = sleep_until_opt(self.restart_at) => Wake::Restart,
            };

            match wake {
                Wake::Command(Some(SessionCommand::Submit { id, request, reply })) => {
                    self.submit(PendingSearch { id, request, reply }).await;
                }
                Wake::Command(Some(SessionCommand::Stop)) => self.stop().await,
                Wake::Command(Some(SessionCommand::Shutdown { reply })) => {
                    self.shutdown().await;
                    let _ = reply.send(());
                    break;
                }
                Wake::Command(None) => {
                    self.shutdown().await;
                    break;
                }
                Wake::Line(Some(line)) => self.handle_line(line).await,
                Wake::Line(None) => self.fail("engine output closed"),
                Wake::HandshakeTimeout => {
                    self.handshake_deadline = None;
                    self.fail("handshake timed out");
                }
                Wake::Restart => {
                    self.restart_at = None;
                    tracing::info!("Restarting engine");
                    self.launch().await;
                }
            }
        }

        tracing::info!("Engine session actor exited");
    }

    async fn launch(&mut self) {
        self.set_state(SessionState::Initializing);
        match self.launcher.launch().await {
            Ok(io) => {
                self.io = Some(io);
                self.handshake = Handshake::AwaitingUciOk;
                self.handshake_deadline = Some(Instant::now() + self.config.handshake_timeout);
                if let Err(e) = self.send(EngineCommand::Uci).await {
                    self.fail(&e.to_string());
                }
            }
            Err(e) => {
                tracing::error!("Failed to launch engine: {}", e);
                self.fail(&e.to_string());
            }
        }
    }

    async fn submit(&mut self, search: PendingSearch) {
        if let Err(e) = cozy_chess::Board::from_fen(&search.request.fingerprint, false) {
            let reason = format!("{} ({:?})", search.request.fingerprint, e);
            tracing::warn!("Rejecting unparseable position: {}", reason);
            search.reject(SubmissionError::InvalidPosition(reason));
            return;
        }

        match self.state {
            SessionState::Ready => self.start_search(search).await,
            SessionState::Analyzing => {
                self.set_pending(search);
                self.request_stop().await;
            }
            _ => {
                tracing::debug!(state = ?self.state, "Engine not ready, queueing submission");
                self.set_pending(search);
            }
        }
    }

    fn set_pending(&mut self, search: PendingSearch) {
        if let Some(previous) = self.pending.replace(search) {
            previous.reject(SubmissionError::Superseded);
        }
    }

    async fn stop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.reject(SubmissionError::Stopped);
        }
        self.request_stop().await;
    }

    async fn request_stop(&mut self) {
        let needs_stop = self.active.as_ref().is_some_and(|a| !a.stop_sent);
        if !needs_stop {
            return;
        }
        match self.send(EngineCommand::Stop).await {
            Ok(()) => {
                if let Some(active) = self.active.as_mut() {
                    active.stop_sent = true;
                }
            }
            Err(e) => self.fail(&e.to_string()),
        }
    }

    async fn start_search(&mut self, search: PendingSearch) {
        if let Err(e) = self.send_search_commands(&search.request).await {
            // Keep the request so it runs once the engine is back.
            if self.pending.is_none() {
                self.pending = Some(search);
            } else {
                search.reject(SubmissionError::Superseded);
            }
            self.fail(&e.to_string());
            return;
        }

        tracing::debug!(id = %search.id, depth = search.request.depth, "Search started");
        self.last_fingerprint = Some(search.request.fingerprint.clone());
        self.active = Some(ActiveSearch {
            id: search.id,
            request: search.request,
            reply: search.reply,
            table: LineTable::new(),
            stop_sent: false,
        });
        self.set_state(SessionState::Analyzing);
    }

    async fn send_search_commands(&mut self, request: &SearchRequest) -> Result<(), EngineError> {
        if request.line_count != self.configured_multipv {
            self.send(EngineCommand::set_option("MultiPV", request.line_count))
                .await?;
            self.configured_multipv = request.line_count;
        }
        self.send(EngineCommand::NewGame).await?;
        self.send(EngineCommand::SetPosition {
            fen: request.fingerprint.clone(),
        })
        .await?;
        self.send(EngineCommand::Go {
            depth: request.depth,
        })
        .await
    }

    async fn flush_pending(&mut self) {
        if self.state == SessionState::Ready {
            if let Some(search) = self.pending.take() {
                self.start_search(search).await;
            }
        }
    }

    async fn handle_line(&mut self, line: String) {
        tracing::trace!("UCI << {}", line);
        let message = parse_uci_message(&line);
        let _ = self.event_tx.send(SessionEvent::Protocol {
            direction: UciMessageDirection::FromEngine,
            message: line,
        });

        match message {
            Ok(UciMessage::UciOk) if self.handshake == Handshake::AwaitingUciOk => {
                if let Err(e) = self.configure().await {
                    self.fail(&e.to_string());
                }
            }
            Ok(UciMessage::ReadyOk) if self.handshake == Handshake::AwaitingReadyOk => {
                self.handshake = Handshake::Done;
                self.handshake_deadline = None;
                tracing::info!("Engine ready");
                self.set_state(SessionState::Ready);
                self.flush_pending().await;
            }
            Ok(UciMessage::Info(info)) => self.handle_info(&info),
            Ok(UciMessage::BestMove { mv, .. }) => self.handle_best_move(mv).await,
            Ok(other) => tracing::trace!("Ignoring UCI message: {:?}", other),
            Err(e) => tracing::trace!("Failed to parse UCI message: {}", e),
        }
    }

    async fn configure(&mut self) -> Result<(), EngineError> {
        self.send(EngineCommand::set_option("MultiPV", self.configured_multipv))
            .await?;
        if let Some(threads) = self.config.threads {
            let threads = threads.clamp(1, MAX_THREADS);
            tracing::info!("Setting Threads to {}", threads);
            self.send(EngineCommand::set_option("Threads", threads)).await?;
        }
        if let Some(hash_mb) = self.config.hash_mb {
            let hash_mb = hash_mb.clamp(1, MAX_HASH_MB);
            tracing::info!("Setting Hash to {} MB", hash_mb);
            self.send(EngineCommand::set_option("Hash", hash_mb)).await?;
        }
        self.handshake = Handshake::AwaitingReadyOk;
        self.send(EngineCommand::IsReady).await
    }

    fn handle_info(&mut self, info: &EngineInfo) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !active.table.apply(info) {
            return;
        }
        let lines = active.table.snapshot();
        let _ = self.event_tx.send(SessionEvent::Lines {
            submission: active.id,
            fingerprint: active.request.fingerprint.clone(),
            lines: lines.clone(),
        });
        self.last_lines = lines;
        self.publish();
    }

    async fn handle_best_move(&mut self, best_move: Option<String>) {
        let Some(active) = self.active.take() else {
            tracing::debug!("Ignoring bestmove with no active search");
            return;
        };
        tracing::debug!(id = %active.id, ?best_move, stopped = active.stop_sent, "Search finished");

        let _ = self.event_tx.send(SessionEvent::BestMove {
            submission: active.id,
            best_move: best_move.clone(),
        });

        let result = if active.stop_sent {
            Err(SubmissionError::Stopped)
        } else {
            let mut evaluation = active
                .table
                .primary()
                .map(|line| line.evaluation.clone())
                .unwrap_or_default();
            if let Some(mv) = best_move {
                evaluation.best_move = mv;
            }
            Ok(SearchResult {
                id: active.id,
                fingerprint: active.request.fingerprint,
                evaluation,
                lines: active.table.snapshot(),
            })
        };
        let _ = active.reply.send(result);

        self.set_state(SessionState::Ready);
        self.flush_pending().await;
    }

    /// Drop the process and schedule one relaunch. Line tables are kept.
    fn fail(&mut self, reason: &str) {
        if self.restart_at.is_some() {
            return;
        }
        tracing::warn!("Engine failure: {}", reason);

        if let Some(io) = self.io.take() {
            tokio::spawn(io.close());
        }
        self.handshake = Handshake::Idle;
        self.handshake_deadline = None;
        self.restart_at = Some(Instant::now() + self.config.restart_backoff);
        self.set_state(SessionState::Errored);

        if let Some(active) = self.active.take() {
            let _ = active.reply.send(Err(SubmissionError::EngineFailed));
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("Engine session shutting down");
        if let Some(active) = self.active.take() {
            let _ = active.reply.send(Err(SubmissionError::SessionClosed));
        }
        if let Some(pending) = self.pending.take() {
            pending.reject(SubmissionError::SessionClosed);
        }
        if self.io.is_some() {
            let _ = self.send(EngineCommand::Quit).await;
        }
        if let Some(io) = self.io.take() {
            io.close().await;
        }
        self.restart_at = None;
        self.handshake_deadline = None;
        self.set_state(SessionState::Uninitialized);
    }

    async fn send(&mut self, command: EngineCommand) -> Result<(), EngineError> {
        let io = self.io.as_ref().ok_or(EngineError::TransportClosed)?;
        let line = command.to_uci_string();
        tracing::trace!("UCI >> {}", line);
        io.commands
            .send(line.clone())
            .await
            .map_err(|_| EngineError::TransportClosed)?;
        let _ = self.event_tx.send(SessionEvent::Protocol {
            direction: UciMessageDirection::ToEngine,
            message: line,
        });
        Ok(())
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?state, "Session state changed");
        self.state = state;
        let _ = self.event_tx.send(SessionEvent::StateChanged(state));
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: self.state,
            fingerprint: self.last_fingerprint.clone(),
            lines: self.last_lines.clone(),
        });
    }
}

async fn next_line(io: &mut Option<EngineIo>) -> Option<String> {
    match io {
        Some(io) => io.lines.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
