//! Compact coordinate notation ("e2e4", "e7e8q") as spoken by UCI engines.
//!
//! cozy-chess encodes castling as the king capturing its own rook (e1h1);
//! engines expect the king's two-square destination (e1g1). Everything
//! crossing the engine boundary goes through this module.

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use crate::position::ChessError;
use crate::types::PieceKind;

/// Format a legal move of `board` in engine notation.
pub fn format_uci_move(board: &Board, mv: Move) -> String {
    let to = if is_castling(board, mv) {
        castling_king_destination(mv)
    } else {
        mv.to
    };
    let mut s = format!("{}{}", format_square(mv.from), format_square(to));
    if let Some(promo) = mv.promotion {
        s.push(PieceKind::from(promo).to_char_lower());
    }
    s
}

/// Parse engine notation into a legal move of `board`.
///
/// Accepts both the standard castling form (e1g1) and cozy's king-takes-rook
/// form (e1h1).
pub fn parse_uci_move(board: &Board, s: &str) -> Result<Move, ChessError> {
    let s = s.trim();
    if !(4..=5).contains(&s.len()) || !s.is_ascii() {
        return Err(ChessError::InvalidNotation(s.to_string()));
    }

    let from = parse_square(&s[0..2])?;
    let to = parse_square(&s[2..4])?;
    let promotion = match s.get(4..5) {
        Some(p) => {
            let kind = p
                .chars()
                .next()
                .and_then(PieceKind::from_char)
                .filter(|k| !matches!(k, PieceKind::Pawn | PieceKind::King))
                .ok_or_else(|| ChessError::InvalidNotation(s.to_string()))?;
            Some(Piece::from(kind))
        }
        None => None,
    };

    let legal = legal_moves(board);
    let mv = convert_uci_castling_to_cozy(
        Move {
            from,
            to,
            promotion,
        },
        board,
        &legal,
    );

    if legal.contains(&mv) {
        Ok(mv)
    } else {
        Err(ChessError::IllegalMove(s.to_string()))
    }
}

/// Map a two-square king move onto the matching legal castling move.
fn convert_uci_castling_to_cozy(mv: Move, board: &Board, legal_moves: &[Move]) -> Move {
    if board.piece_on(mv.from) != Some(Piece::King) || mv.promotion.is_some() {
        return mv;
    }
    if mv.from.rank() != mv.to.rank() {
        return mv;
    }

    let rook_file = match (mv.from.file(), mv.to.file()) {
        (File::E, File::G) => File::H,
        (File::E, File::C) => File::A,
        _ => return mv,
    };

    let converted = Move {
        from: mv.from,
        to: Square::new(rook_file, mv.from.rank()),
        promotion: None,
    };
    if legal_moves.contains(&converted) {
        converted
    } else {
        mv
    }
}

pub(crate) fn is_castling(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King)
        && board.piece_on(mv.to) == Some(Piece::Rook)
        && board.color_on(mv.to) == board.color_on(mv.from)
}

/// True when the castling move goes towards the h-file.
pub(crate) fn is_kingside(mv: Move) -> bool {
    (mv.to.file() as usize) > (mv.from.file() as usize)
}

fn castling_king_destination(mv: Move) -> Square {
    let file = if is_kingside(mv) { File::G } else { File::C };
    Square::new(file, mv.from.rank())
}

pub(crate) fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

pub(crate) fn parse_square(s: &str) -> Result<Square, ChessError> {
    let mut chars = s.chars();
    let (Some(f), Some(r), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(ChessError::InvalidNotation(s.to_string()));
    };
    let file = file_from_char(f).ok_or_else(|| ChessError::InvalidNotation(s.to_string()))?;
    let rank = rank_from_char(r).ok_or_else(|| ChessError::InvalidNotation(s.to_string()))?;
    Ok(Square::new(file, rank))
}

pub(crate) fn format_square(sq: Square) -> String {
    format!("{}{}", file_to_char(sq.file()), rank_to_char(sq.rank()))
}

pub(crate) fn file_to_char(file: File) -> char {
    match file {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    }
}

pub(crate) fn rank_to_char(rank: Rank) -> char {
    match rank {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    }
}

pub(crate) fn file_from_char(c: char) -> Option<File> {
    match c {
        'a' => Some(File::A),
        'b' => Some(File::B),
        'c' => Some(File::C),
        'd' => Some(File::D),
        'e' => Some(File::E),
        'f' => Some(File::F),
        'g' => Some(File::G),
        'h' => Some(File::H),
        _ => None,
    }
}

pub(crate) fn rank_from_char(c: char) -> Option<Rank> {
    match c {
        '1' => Some(Rank::First),
        '2' => Some(Rank::Second),
        '3' => Some(Rank::Third),
        '4' => Some(Rank::Fourth),
        '5' => Some(Rank::Fifth),
        '6' => Some(Rank::Sixth),
        '7' => Some(Rank::Seventh),
        '8' => Some(Rank::Eighth),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pawn_push_round_trip() {
        let board = Board::default();
        let mv = parse_uci_move(&board, "e2e4").unwrap();
        assert_eq!(format_uci_move(&board, mv), "e2e4");
    }

    #[test]
    fn test_castling_uses_king_destination() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let short = parse_uci_move(&board, "e1g1").unwrap();
        assert_eq!(short.to, Square::new(File::H, Rank::First));
        assert_eq!(format_uci_move(&board, short), "e1g1");

        let long = parse_uci_move(&board, "e1c1").unwrap();
        assert_eq!(format_uci_move(&board, long), "e1c1");
    }

    #[test]
    fn test_accepts_king_takes_rook_form() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1".parse().unwrap();
        let mv = parse_uci_move(&board, "e8h8").unwrap();
        assert_eq!(format_uci_move(&board, mv), "e8g8");
    }

    #[test]
    fn test_promotion() {
        let board: Board = "8/P7/8/8/8/8/8/4K2k w - - 0 1".parse().unwrap();
        let mv = parse_uci_move(&board, "a7a8q").unwrap();
        assert_eq!(mv.promotion, Some(Piece::Queen));
        assert_eq!(format_uci_move(&board, mv), "a7a8q");
    }

    #[test]
    fn test_rejects_illegal_and_malformed() {
        let board = Board::default();
        assert!(matches!(
            parse_uci_move(&board, "e2e5"),
            Err(ChessError::IllegalMove(_))
        ));
        assert!(matches!(
            parse_uci_move(&board, "zz"),
            Err(ChessError::InvalidNotation(_))
        ));
        assert!(matches!(
            parse_uci_move(&board, "a7a8k"),
            Err(ChessError::InvalidNotation(_))
        ));
    }
}
