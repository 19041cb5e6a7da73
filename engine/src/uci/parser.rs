use super::UciError;
use crate::evaluation::mate_sentinel;

/// Incoming message from UCI engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    /// `mv` is `None` for `bestmove (none)` (no legal move in the position).
    BestMove {
        mv: Option<String>,
        ponder: Option<String>,
    },
    Info(EngineInfo),
    /// An `info` line that carries no evaluation (`info string ...`,
    /// `currmove` progress, and so on).
    Diagnostic(String),
}

/// Partial evaluation update extracted from one `info` line.
///
/// Only the fields present on the line are set. `score` and `mate` are
/// always set together: a mate score also carries the ±10000 sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    /// 1-based rank of the line. Single-line engines never send it.
    pub multipv: u8,
    pub score: Option<i32>,
    pub mate: Option<i32>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
    /// Principal variation in engine notation; empty if the line had none.
    pub pv: Vec<String>,
}

impl Default for EngineInfo {
    fn default() -> Self {
        Self {
            depth: None,
            seldepth: None,
            multipv: 1,
            score: None,
            mate: None,
            nodes: None,
            nps: None,
            time_ms: None,
            pv: Vec::new(),
        }
    }
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"bestmove") => {
            let mv = match tokens.get(1) {
                Some(&"(none)") => None,
                Some(mv) if is_engine_move(mv) => Some(mv.to_string()),
                _ => return Err(UciError::MalformedMessage(line.to_string())),
            };
            let ponder = match (tokens.get(2), tokens.get(3)) {
                (Some(&"ponder"), Some(p)) if is_engine_move(p) => Some(p.to_string()),
                _ => None,
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }

        Some(&"info") => Ok(match parse_info_line(line) {
            Some(info) => UciMessage::Info(info),
            None => UciMessage::Diagnostic(line.trim().to_string()),
        }),

        _ => Err(UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse an evaluation `info` line.
///
/// Returns `None` unless the line starts with `info` and carries a `pv` or a
/// `score` field. `info string` lines are always rejected. A malformed
/// numeric value drops that field only.
pub fn parse_info_line(line: &str) -> Option<EngineInfo> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return None;
    }
    let tokens: Vec<&str> = tokens.collect();
    if tokens.contains(&"string") {
        return None;
    }

    // The pv runs to the end of the line, so it is split off first.
    let (fields, pv) = match tokens.iter().position(|t| *t == "pv") {
        Some(at) => (&tokens[..at], Some(&tokens[at + 1..])),
        None => (&tokens[..], None),
    };
    if pv.is_none() && !fields.contains(&"score") {
        return None;
    }

    let mut info = EngineInfo::default();
    let mut i = 0;

    while i < fields.len() {
        match fields[i] {
            "depth" => {
                if let Some(v) = number(fields, i + 1) {
                    info.depth = Some(v);
                }
                i += 2;
            }
            "seldepth" => {
                if let Some(v) = number(fields, i + 1) {
                    info.seldepth = Some(v);
                }
                i += 2;
            }
            "multipv" => {
                if let Some(v) = number::<u8>(fields, i + 1).filter(|v| *v >= 1) {
                    info.multipv = v;
                }
                i += 2;
            }
            "nodes" => {
                if let Some(v) = number(fields, i + 1) {
                    info.nodes = Some(v);
                }
                i += 2;
            }
            "nps" => {
                if let Some(v) = number(fields, i + 1) {
                    info.nps = Some(v);
                }
                i += 2;
            }
            "time" => {
                if let Some(v) = number(fields, i + 1) {
                    info.time_ms = Some(v);
                }
                i += 2;
            }
            "score" => {
                match (fields.get(i + 1).copied(), number::<i32>(fields, i + 2)) {
                    (Some("cp"), Some(cp)) => {
                        info.score = Some(cp);
                        info.mate = None;
                    }
                    (Some("mate"), Some(mate)) => {
                        info.mate = Some(mate);
                        info.score = Some(mate_sentinel(mate));
                    }
                    _ => {}
                }
                i += 3;
            }
            _ => {
                // lowerbound/upperbound, currmove, hashfull, tbhits, ...
                i += 1;
            }
        }
    }

    if let Some(moves) = pv {
        info.pv = moves.iter().map(|m| m.to_string()).collect();
    }

    Some(info)
}

fn number<T: std::str::FromStr>(tokens: &[&str], at: usize) -> Option<T> {
    tokens.get(at).and_then(|s| s.parse().ok())
}

/// Loose shape check for engine notation ("e2e4", "e7e8q").
fn is_engine_move(s: &str) -> bool {
    let b = s.as_bytes();
    (b.len() == 4 || b.len() == 5)
        && matches!(b[0], b'a'..=b'h')
        && matches!(b[1], b'1'..=b'8')
        && matches!(b[2], b'a'..=b'h')
        && matches!(b[3], b'1'..=b'8')
        && (b.len() == 4 || matches!(b[4], b'q' | b'r' | b'b' | b'n'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::MATE_SCORE;
    use proptest::prelude::*;

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        assert_eq!(
            msg,
            UciMessage::BestMove {
                mv: Some("e2e4".into()),
                ponder: Some("e7e5".into()),
            }
        );
    }

    #[test]
    fn test_parse_bestmove_none() {
        let msg = parse_uci_message("bestmove (none)").unwrap();
        assert_eq!(
            msg,
            UciMessage::BestMove {
                mv: None,
                ponder: None
            }
        );
        assert!(parse_uci_message("bestmove").is_err());
        assert!(parse_uci_message("bestmove zz99").is_err());
    }

    #[test]
    fn test_parse_handshake_tokens() {
        assert_eq!(parse_uci_message("uciok").unwrap(), UciMessage::UciOk);
        assert_eq!(parse_uci_message("readyok").unwrap(), UciMessage::ReadyOk);
        assert_eq!(
            parse_uci_message("id name Stockfish 16").unwrap(),
            UciMessage::Id {
                name: "name".into(),
                value: "Stockfish 16".into()
            }
        );
        assert!(matches!(
            parse_uci_message("option name Hash type spin"),
            Err(UciError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_parse_info() {
        let info = parse_info_line(
            "info depth 12 seldepth 17 multipv 2 score cp 35 nodes 15234 nps 900000 time 17 pv e2e4 e7e5 g1f3",
        )
        .unwrap();
        assert_eq!(info.depth, Some(12));
        assert_eq!(info.seldepth, Some(17));
        assert_eq!(info.multipv, 2);
        assert_eq!(info.score, Some(35));
        assert_eq!(info.mate, None);
        assert_eq!(info.nodes, Some(15234));
        assert_eq!(info.nps, Some(900000));
        assert_eq!(info.time_ms, Some(17));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_multipv_defaults_to_one() {
        let info = parse_info_line("info depth 3 score cp -12 pv d2d4").unwrap();
        assert_eq!(info.multipv, 1);
    }

    #[test]
    fn test_mate_scores_use_sentinel() {
        let info = parse_info_line("info depth 20 score mate 3 pv h5f7").unwrap();
        assert_eq!(info.mate, Some(3));
        assert_eq!(info.score, Some(MATE_SCORE));

        let info = parse_info_line("info depth 20 score mate -2 pv g8h8").unwrap();
        assert_eq!(info.mate, Some(-2));
        assert_eq!(info.score, Some(-MATE_SCORE));

        // Side to move is already mated.
        let info = parse_info_line("info depth 0 score mate 0").unwrap();
        assert_eq!(info.mate, Some(0));
        assert_eq!(info.score, Some(-MATE_SCORE));
    }

    #[test]
    fn test_score_bounds_are_skipped() {
        let info =
            parse_info_line("info depth 9 score cp 20 lowerbound nodes 100 pv e2e4").unwrap();
        assert_eq!(info.score, Some(20));
        assert_eq!(info.nodes, Some(100));
    }

    #[test]
    fn test_pv_only_line_is_an_update() {
        let info = parse_info_line("info depth 5 pv e2e4 e7e5").unwrap();
        assert_eq!(info.score, None);
        assert_eq!(info.pv, vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn test_non_evaluation_lines() {
        assert!(parse_info_line("info depth 5 currmove e2e4 currmovenumber 1").is_none());
        assert!(parse_info_line("info string NNUE evaluation using nn.nnue enabled").is_none());
        assert!(parse_info_line("info string score cp 10 pv e2e4").is_none());
        assert!(parse_info_line("bestmove e2e4").is_none());
        assert!(matches!(
            parse_uci_message("info string hello").unwrap(),
            UciMessage::Diagnostic(_)
        ));
    }

    #[test]
    fn test_malformed_field_is_skipped_not_line() {
        let info =
            parse_info_line("info depth x12 multipv 0 score cp 4o nodes 77 pv e2e4").unwrap();
        assert_eq!(info.depth, None);
        assert_eq!(info.multipv, 1);
        assert_eq!(info.score, None);
        assert_eq!(info.nodes, Some(77));
        assert_eq!(info.pv, vec!["e2e4"]);
    }

    #[test]
    fn test_pv_captures_rest_of_line() {
        let info = parse_info_line("info score cp 1 pv e2e4 depth 3").unwrap();
        assert_eq!(info.depth, None);
        assert_eq!(info.pv, vec!["e2e4", "depth", "3"]);
    }

    proptest! {
        #[test]
        fn prop_centipawn_lines_keep_score(
            depth in 0u32..64,
            cp in -5000i32..5000,
            pv in proptest::collection::vec("[a-h][1-8][a-h][1-8]", 1..8),
        ) {
            let line = format!("info depth {} score cp {} pv {}", depth, cp, pv.join(" "));
            let info = parse_info_line(&line).unwrap();
            prop_assert_eq!(info.score, Some(cp));
            prop_assert_eq!(info.mate, None);
            prop_assert_eq!(info.pv, pv);
        }

        #[test]
        fn prop_mate_lines_use_sentinel(mate in -50i32..50) {
            prop_assume!(mate != 0);
            let line = format!("info depth 30 score mate {} pv e2e4", mate);
            let info = parse_info_line(&line).unwrap();
            let expected = if mate > 0 { MATE_SCORE } else { -MATE_SCORE };
            prop_assert_eq!(info.score, Some(expected));
            prop_assert_eq!(info.mate, Some(mate));
        }
    }
}
