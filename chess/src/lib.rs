//! Rules layer for the analysis subsystem: position fingerprints, move replay
//! in SAN and engine notation, and game history. Built on cozy-chess.

pub mod fen;
pub mod game;
pub mod position;
pub mod san;
pub mod types;
pub mod uci;

pub use fen::{FenError, STARTING_FEN};
pub use game::{Game, HistoryEntry};
pub use position::{ChessError, PlayedMove, Position, PositionStatus};
pub use types::{PieceColor, PieceKind};
