//! Full-game sweep: evaluate every position of a game in order and label
//! each move.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chess::{Game, PieceColor, PlayedMove, Position, PositionStatus};
use engine::{EngineSession, Evaluation, SearchRequest, SubmissionError};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::Instrument;

use crate::cache::EvaluationCache;
use crate::classify::{classify, cp_loss, MoveClassification};
use crate::error::AnalysisError;

/// Principal variations kept on classified moves.
const MAX_PV_MOVES: usize = 12;

/// A game to sweep: a start position and its moves in SAN or engine
/// notation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Standard start when `None`.
    pub start_fen: Option<String>,
    pub moves: Vec<String>,
}

impl GameRecord {
    pub fn new(start_fen: Option<String>, moves: Vec<String>) -> Self {
        Self { start_fen, moves }
    }
}

impl From<&Game> for GameRecord {
    fn from(game: &Game) -> Self {
        Self {
            start_fen: Some(game.start_position().fingerprint()),
            moves: game.history().iter().map(|entry| entry.uci.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedMove {
    /// 1-based.
    pub ply: u32,
    pub san: String,
    pub uci: String,
    pub mover: PieceColor,
    /// Position after the move.
    pub fingerprint: String,
    /// Positive favors White.
    pub evaluation: Option<Evaluation>,
    pub classification: Option<MoveClassification>,
    pub best_move_uci: Option<String>,
    pub best_move_san: Option<String>,
    pub cp_loss: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisProgress {
    pub current_move: usize,
    pub total_moves: usize,
    pub is_analyzing: bool,
    pub is_complete: bool,
    pub error: Option<String>,
}

struct Step {
    before: Position,
    after: Position,
    played: PlayedMove,
}

struct Sweep {
    cancel: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

struct Inner {
    session: EngineSession,
    cache: EvaluationCache,
    depth: u32,
    progress: watch::Sender<AnalysisProgress>,
    moves: watch::Sender<Arc<Vec<ClassifiedMove>>>,
    sweep: Mutex<Option<Sweep>>,
    /// Held for the length of one engine search. The session stops a
    /// running search when another is submitted, so sweep positions and
    /// `analyze_position` take turns instead.
    search_turn: Mutex<()>,
}

/// Handle to the game pipeline. Clones share one sweep.
#[derive(Clone)]
pub struct GameAnalysis {
    inner: Arc<Inner>,
}

impl GameAnalysis {
    pub fn new(session: EngineSession, cache: EvaluationCache, depth: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                cache,
                depth: depth.max(1),
                progress: watch::Sender::new(AnalysisProgress::default()),
                moves: watch::Sender::new(Arc::new(Vec::new())),
                sweep: Mutex::new(None),
                search_turn: Mutex::new(()),
            }),
        }
    }

    /// Start sweeping `record`, cancelling any sweep already running.
    ///
    /// Every move is replayed up front; an illegal move fails the call
    /// and leaves the previous results alone.
    pub async fn analyze_game(&self, record: GameRecord) -> Result<(), AnalysisError> {
        let (start, steps) = replay(&record)?;
        let total = steps.len();

        let mut slot = self.inner.sweep.lock().await;
        if let Some(previous) = slot.take() {
            tracing::debug!("Cancelling previous sweep");
            previous.cancel.store(true, Ordering::SeqCst);
            self.inner.session.stop().await;
            if let Err(e) = previous.task.await {
                tracing::error!("Previous sweep task failed: {}", e);
            }
        }

        self.inner.moves.send_replace(Arc::new(Vec::with_capacity(total)));
        self.inner.progress.send_replace(AnalysisProgress {
            current_move: 0,
            total_moves: total,
            is_analyzing: true,
            is_complete: false,
            error: None,
        });

        let cancel = Arc::new(AtomicBool::new(false));
        let span = tracing::info_span!("game_sweep", total_moves = total);
        let task = tokio::spawn(
            run_sweep(self.inner.clone(), start, steps, cancel.clone()).instrument(span),
        );
        *slot = Some(Sweep { cancel, task });
        Ok(())
    }

    /// Cancel the running sweep. The position being searched is stopped;
    /// moves already classified are kept.
    pub async fn stop_analysis(&self) {
        if let Some(sweep) = self.inner.sweep.lock().await.as_ref() {
            sweep.cancel.store(true, Ordering::SeqCst);
        }
        self.inner.session.stop().await;
    }

    /// Evaluate one position, from the cache when possible. A running
    /// sweep is not disturbed; this waits for its current search.
    pub async fn analyze_position(&self, fingerprint: &str) -> Result<Evaluation, AnalysisError> {
        let never = AtomicBool::new(false);
        match Position::from_fen(fingerprint) {
            Ok(position) => evaluate(&self.inner, &position, &never).await,
            Err(_) => evaluate_fingerprint(&self.inner, fingerprint, &never).await,
        }
    }

    /// Wait until no sweep is running.
    pub async fn wait(&self) {
        let mut progress = self.subscribe_progress();
        let _ = progress.wait_for(|p| !p.is_analyzing).await;
    }

    pub fn progress(&self) -> AnalysisProgress {
        self.inner.progress.borrow().clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<AnalysisProgress> {
        self.inner.progress.subscribe()
    }

    pub fn progress_stream(&self) -> WatchStream<AnalysisProgress> {
        WatchStream::new(self.subscribe_progress())
    }

    /// Moves classified so far by the current sweep.
    pub fn moves(&self) -> Arc<Vec<ClassifiedMove>> {
        self.inner.moves.borrow().clone()
    }

    pub fn subscribe_moves(&self) -> watch::Receiver<Arc<Vec<ClassifiedMove>>> {
        self.inner.moves.subscribe()
    }
}

fn replay(record: &GameRecord) -> Result<(Position, Vec<Step>), AnalysisError> {
    let start = match &record.start_fen {
        Some(fen) => Position::from_fen(fen)?,
        None => Position::starting(),
    };

    let mut steps = Vec::with_capacity(record.moves.len());
    let mut current = start.clone();
    for (i, notation) in record.moves.iter().enumerate() {
        let (after, played) =
            current
                .play_notation(notation)
                .map_err(|source| AnalysisError::IllegalMove {
                    ply: i + 1,
                    notation: notation.clone(),
                    source,
                })?;
        steps.push(Step {
            before: current,
            after: after.clone(),
            played,
        });
        current = after;
    }
    Ok((start, steps))
}

async fn run_sweep(inner: Arc<Inner>, start: Position, steps: Vec<Step>, cancel: Arc<AtomicBool>) {
    tracing::info!("Sweep started");
    let total = steps.len();

    let mut before = match evaluate(&inner, &start, &cancel).await {
        Ok(eval) => eval,
        Err(e) => {
            finish(&inner, false, sweep_error(&e));
            return;
        }
    };

    let mut error = None;
    let mut classified_count = 0;
    for (i, step) in steps.into_iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        let after = match evaluate(&inner, &step.after, &cancel).await {
            Ok(eval) => eval,
            Err(e) => {
                error = sweep_error(&e);
                break;
            }
        };

        let best_played = !before.best_move.is_empty() && step.played.uci == before.best_move;
        let classification = classify(&before, &after, best_played);
        let normalized = match step.played.mover {
            PieceColor::White => after.negated(),
            PieceColor::Black => after.clone(),
        };
        let best_move_uci = Some(before.best_move.clone()).filter(|mv| !mv.is_empty());
        let best_move_san = best_move_uci
            .as_deref()
            .and_then(|mv| step.before.uci_to_san(mv));

        tracing::debug!(
            ply = i + 1,
            san = %step.played.san,
            %classification,
            "Move classified"
        );

        let classified = ClassifiedMove {
            ply: (i + 1) as u32,
            san: step.played.san,
            uci: step.played.uci,
            mover: step.played.mover,
            fingerprint: step.played.fingerprint,
            evaluation: Some(normalized.with_pv_limit(MAX_PV_MOVES)),
            classification: Some(classification),
            best_move_uci,
            best_move_san,
            cp_loss: cp_loss(&before, &after),
        };
        inner.moves.send_modify(|moves| Arc::make_mut(moves).push(classified));
        inner.progress.send_modify(|p| p.current_move = i + 1);
        classified_count += 1;

        before = after;
    }

    finish(&inner, classified_count == total, error);
}

fn finish(inner: &Inner, complete: bool, error: Option<String>) {
    tracing::info!(complete, error = ?error, "Sweep finished");
    inner.progress.send_modify(|p| {
        p.is_analyzing = false;
        p.is_complete = complete;
        p.error = error;
    });
}

/// Stops are part of cancelling and are not reported.
fn sweep_error(error: &AnalysisError) -> Option<String> {
    if error.is_stopped() {
        None
    } else {
        tracing::warn!("Sweep aborted: {}", error);
        Some(error.to_string())
    }
}

/// Terminal positions never reach the engine.
fn terminal_evaluation(position: &Position) -> Option<Evaluation> {
    match position.status() {
        PositionStatus::Checkmate => Some(Evaluation::mate_in(0, 0)),
        PositionStatus::Stalemate => Some(Evaluation::centipawns(0, 0)),
        PositionStatus::Ongoing => None,
    }
}

async fn evaluate(
    inner: &Inner,
    position: &Position,
    cancel: &AtomicBool,
) -> Result<Evaluation, AnalysisError> {
    let fingerprint = position.fingerprint();
    if let Some(hit) = inner.cache.get(&fingerprint) {
        tracing::trace!(fen = %fingerprint, "Cache hit");
        return Ok(hit);
    }
    if let Some(eval) = terminal_evaluation(position) {
        inner.cache.insert(fingerprint, eval.clone());
        return Ok(eval);
    }
    evaluate_fingerprint(inner, &fingerprint, cancel).await
}

async fn evaluate_fingerprint(
    inner: &Inner,
    fingerprint: &str,
    cancel: &AtomicBool,
) -> Result<Evaluation, AnalysisError> {
    if let Some(hit) = inner.cache.get(fingerprint) {
        return Ok(hit);
    }

    let _turn = inner.search_turn.lock().await;
    if cancel.load(Ordering::SeqCst) {
        return Err(SubmissionError::Stopped.into());
    }
    // Filled while waiting for the turn.
    if let Some(hit) = inner.cache.get(fingerprint) {
        return Ok(hit);
    }

    let request = SearchRequest::new(fingerprint, inner.depth, 1);
    let mut retried = false;
    loop {
        match inner.session.submit(request.clone()).await.await {
            Ok(result) => {
                inner.cache.insert(fingerprint, result.evaluation.clone());
                return Ok(result.evaluation);
            }
            Err(SubmissionError::EngineFailed) if !retried && !cancel.load(Ordering::SeqCst) => {
                tracing::info!(fen = %fingerprint, "Engine failed mid-search, retrying once");
                retried = true;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
