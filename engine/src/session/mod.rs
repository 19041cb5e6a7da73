//! One oracle process, owned by an actor task.
//!
//! State machine: `Uninitialized -> Initializing -> Ready <-> Analyzing`, with
//! `Errored` reachable from anywhere. An errored session relaunches after
//! [`SessionConfig::restart_backoff`]; only one relaunch is ever scheduled.
//!
//! Submissions are serialized inside the actor. A submission that arrives
//! while a search is running stops that search and waits in a single pending
//! slot until the engine confirms with `bestmove`. A newer submission
//! replaces the pending one, which resolves with
//! [`SubmissionError::Superseded`].

mod actor;
mod commands;
mod handle;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::evaluation::{EngineLine, Evaluation};
use crate::UciMessageDirection;

pub use handle::EngineSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Analyzing,
    Errored,
}

impl SessionState {
    /// True when the engine accepts searches without waiting for a restart.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Analyzing)
    }
}

/// Latest published view of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Fingerprint of the most recent search.
    pub fingerprint: Option<String>,
    /// Most recent line table. Survives stops and crashes.
    pub lines: Vec<EngineLine>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name used in logs.
    pub label: String,
    /// Line count configured during the handshake.
    pub multipv: u8,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub restart_backoff: Duration,
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            label: "engine".to_string(),
            multipv: 1,
            threads: None,
            hash_mb: None,
            restart_backoff: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub fingerprint: String,
    pub depth: u32,
    pub line_count: u8,
}

impl SearchRequest {
    pub fn new(fingerprint: impl Into<String>, depth: u32, line_count: u8) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            depth: depth.max(1),
            line_count: line_count.max(1),
        }
    }
}

/// Final state of a search that ran to its depth.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: SubmissionId,
    pub fingerprint: String,
    /// Primary line, with `best_move` taken from the `bestmove` announcement.
    pub evaluation: Evaluation,
    pub lines: Vec<EngineLine>,
}

/// Why a submission did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("Replaced by a newer submission before it started")]
    Superseded,
    #[error("Search was stopped")]
    Stopped,
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
    #[error("Engine failed during the search")]
    EngineFailed,
    #[error("Engine session closed")]
    SessionClosed,
}

pub(crate) type SubmissionReply = oneshot::Sender<Result<SearchResult, SubmissionError>>;

/// Resolves exactly once, when the session finishes or rejects the search.
#[derive(Debug)]
pub struct Submission {
    id: SubmissionId,
    reply: oneshot::Receiver<Result<SearchResult, SubmissionError>>,
}

impl Submission {
    pub(crate) fn new(
        id: SubmissionId,
        reply: oneshot::Receiver<Result<SearchResult, SubmissionError>>,
    ) -> Self {
        Self { id, reply }
    }

    pub fn id(&self) -> SubmissionId {
        self.id
    }
}

impl Future for Submission {
    type Output = Result<SearchResult, SubmissionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.reply).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(SubmissionError::SessionClosed),
        })
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Line table after an update, ascending by rank.
    Lines {
        submission: SubmissionId,
        fingerprint: String,
        lines: Vec<EngineLine>,
    },
    BestMove {
        submission: SubmissionId,
        best_move: Option<String>,
    },
    Protocol {
        direction: UciMessageDirection,
        message: String,
    },
}
