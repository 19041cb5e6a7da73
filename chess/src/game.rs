use serde::{Deserialize, Serialize};

use crate::position::{ChessError, Position};
use crate::types::PieceColor;

/// One replayed move in a game's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 1-indexed: ply 1 is the first move of the game.
    pub ply: u32,
    pub san: String,
    pub uci: String,
    pub mover: PieceColor,
    /// FEN after this move
    pub fen: String,
}

/// A start position plus the moves replayed from it.
#[derive(Debug, Clone)]
pub struct Game {
    start: Position,
    position: Position,
    history: Vec<HistoryEntry>,
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self::from_position(Position::starting())
    }

    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        Ok(Self::from_position(Position::from_fen(fen)?))
    }

    pub fn from_position(start: Position) -> Self {
        Self {
            position: start.clone(),
            start,
            history: Vec::new(),
        }
    }

    /// Replay a full move list, failing on the first illegal move.
    pub fn from_san_moves<S: AsRef<str>>(
        start_fen: Option<&str>,
        moves: &[S],
    ) -> Result<Self, ChessError> {
        let mut game = match start_fen {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        for san in moves {
            game.make_move(san.as_ref())?;
        }
        Ok(game)
    }

    /// Play a move given in SAN (or engine notation).
    pub fn make_move(&mut self, notation: &str) -> Result<&HistoryEntry, ChessError> {
        let (next, played) = self.position.play_notation(notation)?;
        self.position = next;
        self.history.push(HistoryEntry {
            ply: self.history.len() as u32 + 1,
            san: played.san,
            uci: played.uci,
            mover: played.mover,
            fen: played.fingerprint,
        });
        Ok(&self.history[self.history.len() - 1])
    }

    pub fn start_position(&self) -> &Position {
        &self.start
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.position.side_to_move()
    }

    pub fn to_fen(&self) -> String {
        self.position.fingerprint()
    }

    /// SAN of every move played so far.
    pub fn san_moves(&self) -> Vec<String> {
        self.history.iter().map(|e| e.san.clone()).collect()
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionStatus;

    #[test]
    fn test_fools_mate_history() {
        let game = Game::from_san_moves(None, &["f3", "e5", "g4", "Qh4#"]).unwrap();
        let history = game.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].ply, 1);
        assert_eq!(history[0].mover, PieceColor::White);
        assert_eq!(history[3].mover, PieceColor::Black);
        assert_eq!(history[3].uci, "d8h4");
        assert_eq!(history[3].fen, game.to_fen());
        assert_eq!(game.position().status(), PositionStatus::Checkmate);
    }

    #[test]
    fn test_stops_on_illegal_move() {
        let err = Game::from_san_moves(None, &["e4", "e5", "Ke3"]).unwrap_err();
        assert_eq!(err, ChessError::IllegalMove("Ke3".to_string()));
    }

    #[test]
    fn test_custom_start() {
        let game =
            Game::from_san_moves(Some("4k3/8/8/8/8/8/8/R3K3 w Q - 0 1"), &["O-O-O"]).unwrap();
        assert_eq!(game.history()[0].uci, "e1c1");
        assert_eq!(game.side_to_move(), PieceColor::Black);
        assert_eq!(game.san_moves(), vec!["O-O-O".to_string()]);
    }
}
