//! Scripted in-process oracle for tests.
//!
//! [`MockLauncher`] speaks enough of the protocol to drive an
//! [`EngineSession`](crate::EngineSession): it answers the handshake, streams
//! `info` lines for each `go`, and announces a best move. Tests can script
//! evaluations per position, hold searches until `stop`, fail launches and
//! kill the running oracle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Notify};

use crate::stockfish::{EngineIo, EngineLauncher};
use crate::EngineError;

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockScore {
    Centipawns(i32),
    Mate(i32),
}

/// What the mock reports for a position, from the side to move's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEval {
    pub score: MockScore,
    pub pv: Vec<String>,
}

impl MockEval {
    pub fn cp(score: i32, pv: &[&str]) -> Self {
        Self {
            score: MockScore::Centipawns(score),
            pv: pv.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn mate(moves: i32, pv: &[&str]) -> Self {
        Self {
            score: MockScore::Mate(moves),
            pv: pv.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn score_token(&self, rank: u8) -> String {
        match self.score {
            MockScore::Centipawns(cp) => format!("cp {}", cp - 15 * (rank as i32 - 1)),
            MockScore::Mate(n) => format!("mate {}", n),
        }
    }
}

struct MockShared {
    evals: Mutex<HashMap<String, MockEval>>,
    default_eval: Mutex<MockEval>,
    received: Mutex<Vec<String>>,
    launches: AtomicUsize,
    failing_launches: AtomicUsize,
    searches: AtomicUsize,
    auto_complete_limit: Mutex<Option<usize>>,
    ignore_handshake: AtomicBool,
    kills: Mutex<Vec<oneshot::Sender<()>>>,
    release: Notify,
}

/// Launcher for the scripted oracle. Clones share all state.
#[derive(Clone)]
pub struct MockLauncher {
    shared: Arc<MockShared>,
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared {
                evals: Mutex::new(HashMap::new()),
                default_eval: Mutex::new(MockEval::cp(20, &["e2e4", "e7e5"])),
                received: Mutex::new(Vec::new()),
                launches: AtomicUsize::new(0),
                failing_launches: AtomicUsize::new(0),
                searches: AtomicUsize::new(0),
                auto_complete_limit: Mutex::new(None),
                ignore_handshake: AtomicBool::new(false),
                kills: Mutex::new(Vec::new()),
                release: Notify::new(),
            }),
        }
    }

    /// Script the evaluation reported for `fen`.
    pub fn with_eval(self, fen: &str, eval: MockEval) -> Self {
        self.set_eval(fen, eval);
        self
    }

    pub fn set_eval(&self, fen: &str, eval: MockEval) {
        self.shared
            .evals
            .lock()
            .unwrap()
            .insert(fen.to_string(), eval);
    }

    /// Evaluation for positions without a scripted one.
    pub fn set_default_eval(&self, eval: MockEval) {
        *self.shared.default_eval.lock().unwrap() = eval;
    }

    /// Every command line received, across all launches, in order.
    pub fn received(&self) -> Vec<String> {
        self.shared.received.lock().unwrap().clone()
    }

    pub fn count_received(&self, prefix: &str) -> usize {
        self.shared
            .received
            .lock()
            .unwrap()
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .count()
    }

    pub fn launches(&self) -> usize {
        self.shared.launches.load(Ordering::SeqCst)
    }

    /// Make the next `n` launches fail.
    pub fn fail_next_launches(&self, n: usize) {
        self.shared.failing_launches.store(n, Ordering::SeqCst);
    }

    /// Only the first `limit` searches over the mock's lifetime announce a
    /// best move on their own; later ones wait for `stop` or [`release`].
    ///
    /// [`release`]: MockLauncher::release
    pub fn set_auto_complete_limit(&self, limit: Option<usize>) {
        *self.shared.auto_complete_limit.lock().unwrap() = limit;
    }

    /// Finish the held search and stop holding new ones.
    pub fn release(&self) {
        self.set_auto_complete_limit(None);
        self.shared.release.notify_one();
    }

    /// Never answer `uci`.
    pub fn ignore_handshake(&self, ignore: bool) {
        self.shared.ignore_handshake.store(ignore, Ordering::SeqCst);
    }

    /// Kill every running oracle as if the process died.
    pub fn crash(&self) {
        for kill in self.shared.kills.lock().unwrap().drain(..) {
            let _ = kill.send(());
        }
    }
}

#[async_trait]
impl EngineLauncher for MockLauncher {
    async fn launch(&self) -> Result<EngineIo, EngineError> {
        self.shared.launches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .shared
            .failing_launches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(EngineError::Launch("mock launch failure".to_string()));
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (line_tx, line_rx) = mpsc::channel(256);
        let (kill_tx, kill_rx) = oneshot::channel();
        self.shared.kills.lock().unwrap().push(kill_tx);

        tokio::spawn(run_oracle(self.shared.clone(), cmd_rx, line_tx, kill_rx));
        Ok(EngineIo::new(cmd_tx, line_rx, None))
    }
}

async fn run_oracle(
    shared: Arc<MockShared>,
    mut commands: mpsc::Receiver<String>,
    lines: mpsc::Sender<String>,
    mut kill: oneshot::Receiver<()>,
) {
    let mut position = STARTPOS.to_string();
    let mut multipv: u8 = 1;
    let mut held: Option<String> = None;

    loop {
        let outgoing: Vec<String> = tokio::select! {
            _ = &mut kill => break,
            _ = shared.release.notified(), if held.is_some() => held.take().into_iter().collect(),
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                shared.received.lock().unwrap().push(cmd.clone());
                let mut words = cmd.split_whitespace();
                match words.next() {
                    Some("uci") if !shared.ignore_handshake.load(Ordering::SeqCst) => {
                        vec!["id name MockFish".to_string(), "uciok".to_string()]
                    }
                    Some("isready") => vec!["readyok".to_string()],
                    Some("setoption") => {
                        if let Some(rest) = cmd.strip_prefix("setoption name MultiPV value ") {
                            multipv = rest.trim().parse().unwrap_or(1);
                        }
                        Vec::new()
                    }
                    Some("position") => {
                        position = match cmd.strip_prefix("position fen ") {
                            Some(fen) => fen.trim().to_string(),
                            None => STARTPOS.to_string(),
                        };
                        Vec::new()
                    }
                    Some("go") => {
                        let depth = cmd
                            .strip_prefix("go depth ")
                            .and_then(|d| d.trim().parse::<u32>().ok())
                            .unwrap_or(10);
                        let (mut out, best) = search(&shared, &position, depth, multipv);
                        let started = shared.searches.fetch_add(1, Ordering::SeqCst) + 1;
                        let limit = *shared.auto_complete_limit.lock().unwrap();
                        if limit.is_some_and(|limit| started > limit) {
                            held = Some(best);
                        } else {
                            out.push(best);
                        }
                        out
                    }
                    Some("stop") => held.take().into_iter().collect(),
                    Some("quit") => break,
                    _ => Vec::new(),
                }
            }
        };

        for line in outgoing {
            if lines.send(line).await.is_err() {
                return;
            }
        }
    }
}

fn search(shared: &MockShared, position: &str, depth: u32, multipv: u8) -> (Vec<String>, String) {
    let eval = shared
        .evals
        .lock()
        .unwrap()
        .get(position)
        .cloned()
        .unwrap_or_else(|| shared.default_eval.lock().unwrap().clone());

    let pv = eval.pv.join(" ");
    let mut out = vec!["info string NNUE evaluation using mock.nnue".to_string()];
    for d in [1, depth] {
        for rank in 1..=multipv.max(1) {
            out.push(format!(
                "info depth {d} seldepth {d} multipv {rank} score {} nodes {} nps 100000 pv {pv}",
                eval.score_token(rank),
                1000 * d as u64
            ));
        }
    }
    let best = match eval.pv.first() {
        Some(mv) => format!("bestmove {mv}"),
        None => "bestmove (none)".to_string(),
    };
    (out, best)
}
