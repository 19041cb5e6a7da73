use cozy_chess::{Board, Move};
use serde::{Deserialize, Serialize};

use crate::fen::{format_fen, parse_fen, FenError};
use crate::san::{format_san, parse_san};
use crate::types::PieceColor;
use crate::uci::{format_uci_move, legal_moves, parse_uci_move};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChessError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Invalid move notation: {0}")]
    InvalidNotation(String),
    #[error(transparent)]
    Fen(#[from] FenError),
}

/// Whether the side to move still has a legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Ongoing,
    /// The side to move is mated.
    Checkmate,
    Stalemate,
}

/// A move that was replayed against a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedMove {
    pub san: String,
    /// Engine (coordinate) notation, e.g. "e2e4" or "e1g1".
    pub uci: String,
    pub mover: PieceColor,
    /// Fingerprint of the resulting position.
    pub fingerprint: String,
}

/// A reachable chess position.
#[derive(Debug, Clone)]
pub struct Position {
    board: Board,
}

impl Position {
    pub fn starting() -> Self {
        Self {
            board: Board::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        Ok(Self {
            board: parse_fen(fen)?,
        })
    }

    /// Canonical key for this position (full FEN).
    pub fn fingerprint(&self) -> String {
        format_fen(&self.board)
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.board.side_to_move().into()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.board)
    }

    pub fn status(&self) -> PositionStatus {
        if !self.legal_moves().is_empty() {
            PositionStatus::Ongoing
        } else if self.board.checkers().is_empty() {
            PositionStatus::Stalemate
        } else {
            PositionStatus::Checkmate
        }
    }

    /// Replay a SAN move and return the resulting position.
    pub fn play_san(&self, san: &str) -> Result<(Position, PlayedMove), ChessError> {
        let mv = parse_san(&self.board, san)?;
        Ok(self.play_legal(mv))
    }

    /// Replay a move given in engine notation.
    pub fn play_uci(&self, uci: &str) -> Result<(Position, PlayedMove), ChessError> {
        let mv = parse_uci_move(&self.board, uci)?;
        Ok(self.play_legal(mv))
    }

    /// Replay SAN, falling back to engine notation.
    pub fn play_notation(&self, notation: &str) -> Result<(Position, PlayedMove), ChessError> {
        match self.play_san(notation) {
            Ok(played) => Ok(played),
            Err(san_err) => self.play_uci(notation).map_err(|_| san_err),
        }
    }

    /// Render an engine move as SAN. Returns `None` if the move is not legal here.
    pub fn uci_to_san(&self, uci: &str) -> Option<String> {
        let mv = parse_uci_move(&self.board, uci).ok()?;
        Some(format_san(&self.board, mv))
    }

    fn play_legal(&self, mv: Move) -> (Position, PlayedMove) {
        let san = format_san(&self.board, mv);
        let uci = format_uci_move(&self.board, mv);
        let mover = self.side_to_move();

        let mut board = self.board.clone();
        board.play_unchecked(mv);
        let next = Position { board };

        let played = PlayedMove {
            san,
            uci,
            mover,
            fingerprint: next.fingerprint(),
        };
        (next, played)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::starting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::STARTING_FEN;

    #[test]
    fn test_starting_fingerprint() {
        assert_eq!(Position::starting().fingerprint(), STARTING_FEN);
        assert_eq!(Position::starting().side_to_move(), PieceColor::White);
    }

    #[test]
    fn test_play_san_reports_move() {
        let (next, played) = Position::starting().play_san("e4").unwrap();
        assert_eq!(played.san, "e4");
        assert_eq!(played.uci, "e2e4");
        assert_eq!(played.mover, PieceColor::White);
        assert!(played
            .fingerprint
            .starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq"));
        assert_eq!(played.fingerprint, next.fingerprint());
        assert_eq!(next.side_to_move(), PieceColor::Black);
    }

    #[test]
    fn test_play_notation_accepts_uci() {
        let (_, played) = Position::starting().play_notation("g1f3").unwrap();
        assert_eq!(played.san, "Nf3");
    }

    #[test]
    fn test_illegal_move_fails() {
        assert!(matches!(
            Position::starting().play_san("Ke2"),
            Err(ChessError::IllegalMove(_))
        ));
    }

    #[test]
    fn test_status() {
        let mate = Position::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        )
        .unwrap();
        assert_eq!(mate.status(), PositionStatus::Checkmate);

        let stalemate = Position::from_fen("k7/8/1Q6/8/8/8/8/2K5 b - - 0 1").unwrap();
        assert_eq!(stalemate.status(), PositionStatus::Stalemate);

        assert_eq!(Position::starting().status(), PositionStatus::Ongoing);
    }

    #[test]
    fn test_uci_to_san() {
        assert_eq!(Position::starting().uci_to_san("b1c3").as_deref(), Some("Nc3"));
        assert_eq!(Position::starting().uci_to_san("b1b3"), None);
    }

    #[test]
    fn test_invalid_fen() {
        assert!(matches!(
            Position::from_fen("nonsense"),
            Err(ChessError::Fen(_))
        ));
    }
}
