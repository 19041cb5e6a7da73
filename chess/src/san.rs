//! Standard Algebraic Notation.

use cozy_chess::{Board, Move, Piece};

use crate::position::ChessError;
use crate::types::PieceKind;
use crate::uci::{file_to_char, format_square, is_castling, is_kingside, legal_moves, rank_to_char};

/// Format a legal move of `board` as SAN, including the check/mate suffix.
pub fn format_san(board: &Board, mv: Move) -> String {
    let mut san = format_san_body(board, mv);

    let mut after = board.clone();
    after.play_unchecked(mv);
    if !after.checkers().is_empty() {
        if legal_moves(&after).is_empty() {
            san.push('#');
        } else {
            san.push('+');
        }
    }
    san
}

/// Parse SAN against `board`.
///
/// Annotation suffixes (`+`, `#`, `!`, `?`) are ignored and `0-0` is accepted
/// for castling.
pub fn parse_san(board: &Board, san: &str) -> Result<Move, ChessError> {
    let wanted = normalize(san);
    if wanted.is_empty() {
        return Err(ChessError::InvalidNotation(san.to_string()));
    }

    legal_moves(board)
        .into_iter()
        .find(|&mv| format_san_body(board, mv) == wanted)
        .ok_or_else(|| ChessError::IllegalMove(san.to_string()))
}

fn normalize(san: &str) -> String {
    san.trim()
        .trim_end_matches(['+', '#', '!', '?'])
        .replace('0', "O")
}

/// SAN without the check suffix.
fn format_san_body(board: &Board, mv: Move) -> String {
    if is_castling(board, mv) {
        return if is_kingside(mv) { "O-O" } else { "O-O-O" }.to_string();
    }

    let Some(piece) = board.piece_on(mv.from) else {
        return format_square(mv.to);
    };
    let is_capture = board.color_on(mv.to).is_some()
        || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

    let mut san = String::new();
    match PieceKind::from(piece).san_letter() {
        Some(letter) => {
            san.push(letter);
            san.push_str(&disambiguation(board, mv, piece));
        }
        None => {
            if is_capture {
                san.push(file_to_char(mv.from.file()));
            }
        }
    }

    if is_capture {
        san.push('x');
    }
    san.push_str(&format_square(mv.to));

    if let Some(promo) = mv.promotion {
        san.push('=');
        if let Some(letter) = PieceKind::from(promo).san_letter() {
            san.push(letter);
        }
    }

    san
}

fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    if piece == Piece::King {
        return String::new();
    }

    let rivals: Vec<Move> = legal_moves(board)
        .into_iter()
        .filter(|other| {
            other.to == mv.to && other.from != mv.from && board.piece_on(other.from) == Some(piece)
        })
        .collect();

    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|r| r.from.file() != mv.from.file()) {
        return file_to_char(mv.from.file()).to_string();
    }
    if rivals.iter().all(|r| r.from.rank() != mv.from.rank()) {
        return rank_to_char(mv.from.rank()).to_string();
    }
    format_square(mv.from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::STARTING_FEN;
    use crate::uci::parse_uci_move;

    fn board(fen: &str) -> Board {
        fen.parse().unwrap()
    }

    fn san_of(fen: &str, uci: &str) -> String {
        let b = board(fen);
        let mv = parse_uci_move(&b, uci).unwrap();
        format_san(&b, mv)
    }

    #[test]
    fn test_pawn_push() {
        assert_eq!(san_of(STARTING_FEN, "e2e4"), "e4");
    }

    #[test]
    fn test_knight() {
        assert_eq!(san_of(STARTING_FEN, "g1f3"), "Nf3");
    }

    #[test]
    fn test_pawn_capture() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2";
        assert_eq!(san_of(fen, "e4d5"), "exd5");
    }

    #[test]
    fn test_en_passant_capture() {
        let fen = "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3";
        assert_eq!(san_of(fen, "e5f6"), "exf6");
    }

    #[test]
    fn test_castling() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        assert_eq!(san_of(fen, "e1g1"), "O-O");
        assert_eq!(san_of(fen, "e1c1"), "O-O-O");
    }

    #[test]
    fn test_promotion_with_check() {
        let fen = "8/P7/8/8/8/8/8/4K2k w - - 0 1";
        assert_eq!(san_of(fen, "a7a8q"), "a8=Q+");
    }

    #[test]
    fn test_file_disambiguation() {
        // Knights on b1 and f3 can both reach d2.
        let fen = "4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1";
        assert_eq!(san_of(fen, "b1d2"), "Nbd2");
        assert_eq!(san_of(fen, "f3d2"), "Nfd2");
    }

    #[test]
    fn test_rank_disambiguation() {
        // Rooks on a1 and a5 can both reach a3.
        let fen = "4k3/8/8/R7/8/8/8/R3K3 w - - 0 1";
        assert_eq!(san_of(fen, "a1a3"), "R1a3");
        assert_eq!(san_of(fen, "a5a3"), "R5a3");
    }

    #[test]
    fn test_checkmate_suffix() {
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3 0 2";
        assert_eq!(san_of(fen, "d8h4"), "Qh4#");
    }

    #[test]
    fn test_parse_ignores_annotations() {
        let b = board(STARTING_FEN);
        let mv = parse_san(&b, "Nf3!?").unwrap();
        assert_eq!(format_san(&b, mv), "Nf3");
    }

    #[test]
    fn test_parse_zero_castling() {
        let b = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let mv = parse_san(&b, "0-0").unwrap();
        assert_eq!(format_san(&b, mv), "O-O");
    }

    #[test]
    fn test_parse_rejects_illegal() {
        let b = board(STARTING_FEN);
        assert!(matches!(parse_san(&b, "e5"), Err(ChessError::IllegalMove(_))));
        assert!(matches!(parse_san(&b, "+"), Err(ChessError::InvalidNotation(_))));
    }

    proptest::proptest! {
        #[test]
        fn prop_san_identifies_the_move(choices in proptest::collection::vec(0usize..256, 0..40)) {
            let mut b = board(STARTING_FEN);
            for choice in choices {
                let moves = legal_moves(&b);
                if moves.is_empty() {
                    break;
                }
                let mv = moves[choice % moves.len()];
                let san = format_san(&b, mv);
                proptest::prop_assert_eq!(parse_san(&b, &san).unwrap(), mv);
                b.play_unchecked(mv);
            }
        }
    }
}
