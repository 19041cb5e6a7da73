//! Driving an external UCI analysis engine.
//!
//! [`uci`] turns engine output into structured updates and formats outbound
//! commands. [`session`] owns one engine process through its whole lifecycle
//! (handshake, configuration, searches, crash recovery) and serializes the
//! command stream so that a new search is never issued before the previous
//! one has been confirmed finished.

pub mod evaluation;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod session;
pub mod stockfish;
pub mod uci;

pub use evaluation::{mate_sentinel, EngineLine, Evaluation, LineTable, MATE_SCORE};
pub use session::{
    EngineSession, SearchRequest, SearchResult, SessionConfig, SessionEvent, SessionSnapshot,
    SessionState, Submission, SubmissionError, SubmissionId,
};
pub use stockfish::{find_stockfish_path, EngineIo, EngineLauncher, StockfishLauncher};
pub use uci::{parse_info_line, parse_uci_message, EngineCommand, EngineInfo, UciError, UciMessage};

/// Errors raised while starting or talking to an engine process.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine executable not found")]
    NotFound,
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Engine has no stdin")]
    NoStdin,
    #[error("Engine has no stdout")]
    NoStdout,
    #[error("Engine launch failed: {0}")]
    Launch(String),
    #[error("Engine transport closed")]
    TransportClosed,
}

/// Direction of a raw protocol line, for debug traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UciMessageDirection {
    ToEngine,
    FromEngine,
}
