//! Evaluation snapshots and the per-search line table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::uci::EngineInfo;

/// Sentinel magnitude carried in `score` when a forced mate is known.
/// Used for ordering only; it is not a centipawn value.
pub const MATE_SCORE: i32 = 10_000;

/// Sentinel score for a mate count from the side to move's point of view.
/// `mate 0` means the side to move is already mated.
pub fn mate_sentinel(mate: i32) -> i32 {
    if mate > 0 {
        MATE_SCORE
    } else {
        -MATE_SCORE
    }
}

/// Analysis state for one position at one search depth.
///
/// `score` is in centipawns, positive = side to move is better.
/// `mate`: positive N = side to move mates in N, negative N = side to move
/// gets mated in N.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: i32,
    pub mate: Option<i32>,
    pub depth: u32,
    /// Engine notation; empty until known.
    pub best_move: String,
    pub principal_variation: Vec<String>,
}

impl Evaluation {
    pub fn centipawns(score: i32, depth: u32) -> Self {
        Self {
            score,
            depth,
            ..Default::default()
        }
    }

    pub fn mate_in(mate: i32, depth: u32) -> Self {
        Self {
            score: mate_sentinel(mate),
            mate: Some(mate),
            depth,
            ..Default::default()
        }
    }

    pub fn is_mate(&self) -> bool {
        self.mate.is_some()
    }

    /// `Some(true)` if the side to move delivers the forced mate,
    /// `Some(false)` if it is on the receiving end, `None` without a mate.
    pub fn mate_favors_side_to_move(&self) -> Option<bool> {
        self.mate.map(|_| self.score > 0)
    }

    /// Flip perspective to the other side.
    pub fn negated(&self) -> Self {
        Self {
            score: -self.score,
            mate: self.mate.map(|m| -m),
            ..self.clone()
        }
    }

    /// Keep at most `max` moves of the principal variation.
    pub fn with_pv_limit(mut self, max: usize) -> Self {
        self.principal_variation.truncate(max);
        self
    }

    pub fn display(&self) -> String {
        match self.mate {
            Some(m) if self.score > 0 => format!("+M{}", m.abs()),
            Some(m) => format!("-M{}", m.abs()),
            None => format!("{:+.2}", self.score as f64 / 100.0),
        }
    }
}

impl std::fmt::Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// One ranked variation during a (multi-variation) search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLine {
    /// 1 = primary line.
    pub rank: u8,
    pub evaluation: Evaluation,
    pub seldepth: Option<u32>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
}

impl EngineLine {
    fn from_info(info: &EngineInfo) -> Option<Self> {
        let score = info.score?;
        Some(Self {
            rank: info.multipv,
            evaluation: Evaluation {
                score,
                mate: info.mate,
                depth: info.depth.unwrap_or(0),
                best_move: info.pv.first().cloned().unwrap_or_default(),
                principal_variation: info.pv.clone(),
            },
            seldepth: info.seldepth,
            nodes: info.nodes,
            nps: info.nps,
        })
    }

    /// Merge a partial update. Updates from a shallower depth are dropped.
    fn merge(&mut self, info: &EngineInfo) -> bool {
        let eval = &mut self.evaluation;
        if info.depth.is_some_and(|d| d < eval.depth) {
            return false;
        }

        if let Some(depth) = info.depth {
            eval.depth = depth;
        }
        if let Some(score) = info.score {
            eval.score = score;
            eval.mate = info.mate;
        }
        if let Some(first) = info.pv.first() {
            eval.best_move = first.clone();
            eval.principal_variation = info.pv.clone();
        }
        self.seldepth = info.seldepth.or(self.seldepth);
        self.nodes = info.nodes.or(self.nodes);
        self.nps = info.nps.or(self.nps);
        true
    }
}

/// Lines of the current search keyed by rank.
#[derive(Debug, Clone, Default)]
pub struct LineTable {
    lines: BTreeMap<u8, EngineLine>,
}

impl LineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an `info` update. Returns true if the table changed.
    pub fn apply(&mut self, info: &EngineInfo) -> bool {
        match self.lines.get_mut(&info.multipv) {
            Some(line) => line.merge(info),
            None => match EngineLine::from_info(info) {
                Some(line) => {
                    self.lines.insert(line.rank, line);
                    true
                }
                // A pv without a score says nothing about an unseen rank.
                None => false,
            },
        }
    }

    /// All lines, ascending by rank.
    pub fn snapshot(&self) -> Vec<EngineLine> {
        self.lines.values().cloned().collect()
    }

    pub fn primary(&self) -> Option<&EngineLine> {
        self.lines.get(&1)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::parse_info_line;

    fn info(line: &str) -> EngineInfo {
        parse_info_line(line).unwrap()
    }

    #[test]
    fn test_negated_flips_score_and_mate() {
        let eval = Evaluation::mate_in(3, 20);
        let flipped = eval.negated();
        assert_eq!(flipped.mate, Some(-3));
        assert_eq!(flipped.score, -MATE_SCORE);
        assert_eq!(flipped.mate_favors_side_to_move(), Some(false));

        let cp = Evaluation::centipawns(-40, 12).negated();
        assert_eq!(cp.score, 40);
        assert_eq!(cp.mate, None);
    }

    #[test]
    fn test_mated_position_keeps_perspective_through_negation() {
        let mated = Evaluation::mate_in(0, 0);
        assert_eq!(mated.mate_favors_side_to_move(), Some(false));
        assert_eq!(mated.negated().mate_favors_side_to_move(), Some(true));
    }

    #[test]
    fn test_display() {
        assert_eq!(Evaluation::centipawns(35, 1).display(), "+0.35");
        assert_eq!(Evaluation::centipawns(-120, 1).display(), "-1.20");
        assert_eq!(Evaluation::mate_in(4, 1).display(), "+M4");
        assert_eq!(Evaluation::mate_in(-2, 1).display(), "-M2");
    }

    #[test]
    fn test_pv_limit() {
        let mut eval = Evaluation::centipawns(0, 1);
        eval.principal_variation = vec!["e2e4".into(), "e7e5".into(), "g1f3".into()];
        assert_eq!(eval.with_pv_limit(2).principal_variation.len(), 2);
    }

    #[test]
    fn test_table_sorted_by_rank() {
        let mut table = LineTable::new();
        assert!(table.apply(&info("info depth 8 multipv 3 score cp -10 pv a2a3")));
        assert!(table.apply(&info("info depth 8 multipv 1 score cp 30 pv e2e4 e7e5")));
        assert!(table.apply(&info("info depth 8 multipv 2 score cp 12 pv d2d4")));

        let ranks: Vec<u8> = table.snapshot().iter().map(|l| l.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        let primary = table.primary().unwrap();
        assert_eq!(primary.evaluation.best_move, "e2e4");
        assert_eq!(primary.evaluation.score, 30);
    }

    #[test]
    fn test_shallower_update_never_overwrites() {
        let mut table = LineTable::new();
        table.apply(&info("info depth 14 score cp 25 pv e2e4"));
        assert!(!table.apply(&info("info depth 9 score cp -300 pv f2f3")));

        let primary = table.primary().unwrap();
        assert_eq!(primary.evaluation.depth, 14);
        assert_eq!(primary.evaluation.score, 25);
        assert_eq!(primary.evaluation.best_move, "e2e4");
    }

    #[test]
    fn test_partial_update_merges() {
        let mut table = LineTable::new();
        table.apply(&info("info depth 10 score mate 2 nodes 50 pv h5f7"));
        assert!(table.apply(&info("info depth 11 pv d1h5 g6h5")));

        let line = &table.snapshot()[0];
        assert_eq!(line.evaluation.depth, 11);
        assert_eq!(line.evaluation.mate, Some(2));
        assert_eq!(line.evaluation.best_move, "d1h5");
        assert_eq!(line.nodes, Some(50));

        // A pv-only update for a rank never seen is ignored.
        assert!(!table.apply(&info("info depth 11 multipv 2 pv a2a4")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_centipawn_update_clears_mate() {
        let mut table = LineTable::new();
        table.apply(&info("info depth 10 score mate 5 pv h5f7"));
        table.apply(&info("info depth 11 score cp 250 pv h5f7"));
        let eval = &table.primary().unwrap().evaluation;
        assert_eq!(eval.mate, None);
        assert_eq!(eval.score, 250);
    }

    #[test]
    fn test_evaluation_serializes() {
        let eval = Evaluation::mate_in(2, 18);
        let json = serde_json::to_string(&eval).unwrap();
        let back: Evaluation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, eval);
    }
}
