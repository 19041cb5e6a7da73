use engine::{EngineError, SubmissionError};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Search failed: {0}")]
    Search(#[from] SubmissionError),
    #[error("Invalid position: {0}")]
    Position(#[from] chess::ChessError),
    #[error("Move {ply} ({notation}) could not be played: {source}")]
    IllegalMove {
        ply: usize,
        notation: String,
        #[source]
        source: chess::ChessError,
    },
}

impl AnalysisError {
    /// True when the search ended because someone asked it to.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Search(SubmissionError::Stopped))
    }
}
