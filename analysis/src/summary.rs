use std::collections::BTreeMap;

use chess::PieceColor;
use serde::{Deserialize, Serialize};

use crate::classify::MoveClassification;
use crate::pipeline::ClassifiedMove;

/// Per-move losses above this are clamped so a single mate swing does not
/// swamp the average.
const MAX_COUNTED_LOSS: i32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideSummary {
    pub moves: usize,
    pub average_cp_loss: f64,
    /// 0-100.
    pub accuracy: f64,
    pub counts: BTreeMap<MoveClassification, usize>,
}

impl SideSummary {
    pub fn count(&self, label: MoveClassification) -> usize {
        self.counts.get(&label).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub white: SideSummary,
    pub black: SideSummary,
}

impl GameSummary {
    pub fn from_moves(moves: &[ClassifiedMove]) -> Self {
        Self {
            white: summarize(moves, PieceColor::White),
            black: summarize(moves, PieceColor::Black),
        }
    }

    pub fn side(&self, color: PieceColor) -> &SideSummary {
        match color {
            PieceColor::White => &self.white,
            PieceColor::Black => &self.black,
        }
    }
}

fn summarize(moves: &[ClassifiedMove], color: PieceColor) -> SideSummary {
    let own: Vec<&ClassifiedMove> = moves.iter().filter(|m| m.mover == color).collect();

    let mut counts = BTreeMap::new();
    for label in own.iter().filter_map(|m| m.classification) {
        *counts.entry(label).or_insert(0) += 1;
    }

    let losses: Vec<i32> = own.iter().map(|m| m.cp_loss).collect();
    SideSummary {
        moves: own.len(),
        average_cp_loss: average_loss(&losses),
        accuracy: compute_accuracy(&losses),
        counts,
    }
}

fn average_loss(losses: &[i32]) -> f64 {
    if losses.is_empty() {
        return 0.0;
    }
    let total: f64 = losses
        .iter()
        .map(|loss| (*loss).clamp(0, MAX_COUNTED_LOSS) as f64)
        .sum();
    total / losses.len() as f64
}

/// Accuracy percentage from per-move centipawn losses.
///
/// `103.1668 * exp(-0.006 * avg_cp_loss) - 3.1668`, clamped to [0, 100].
/// Roughly: ACPL 10 gives 94%, ACPL 35 gives 80%, ACPL 100 gives 54%.
/// A side with no moves scores 100.
pub fn compute_accuracy(losses: &[i32]) -> f64 {
    if losses.is_empty() {
        return 100.0;
    }
    let accuracy = 103.1668 * (-0.006 * average_loss(losses)).exp() - 3.1668;
    accuracy.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::Evaluation;

    fn classified(ply: u32, label: MoveClassification, cp_loss: i32) -> ClassifiedMove {
        let mover = if ply % 2 == 1 {
            PieceColor::White
        } else {
            PieceColor::Black
        };
        ClassifiedMove {
            ply,
            san: "e4".into(),
            uci: "e2e4".into(),
            mover,
            fingerprint: String::new(),
            evaluation: Some(Evaluation::centipawns(0, 10)),
            classification: Some(label),
            best_move_uci: None,
            best_move_san: None,
            cp_loss,
        }
    }

    #[test]
    fn test_perfect_play() {
        assert!((compute_accuracy(&[0, 0, 0]) - 100.0).abs() < 0.01);
        assert!((compute_accuracy(&[-20, -5]) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_accuracy_curve() {
        let acc = compute_accuracy(&[10]);
        assert!((acc - 94.0).abs() < 1.0, "got {acc}");
        let acc = compute_accuracy(&[100]);
        assert!((acc - 53.5).abs() < 1.0, "got {acc}");
    }

    #[test]
    fn test_mate_outlier_capped() {
        let acc = compute_accuracy(&[20_000, 0]);
        let expected = compute_accuracy(&[1000, 0]);
        assert!((acc - expected).abs() < f64::EPSILON);
        assert!(acc >= 0.0);
    }

    #[test]
    fn test_empty_side_is_perfect() {
        assert_eq!(compute_accuracy(&[]), 100.0);
        let summary = GameSummary::from_moves(&[]);
        assert_eq!(summary.white.moves, 0);
        assert_eq!(summary.black.accuracy, 100.0);
    }

    #[test]
    fn test_summary_splits_by_side() {
        let moves = vec![
            classified(1, MoveClassification::Best, 0),
            classified(2, MoveClassification::Blunder, 350),
            classified(3, MoveClassification::Inaccuracy, 80),
            classified(4, MoveClassification::Best, 0),
        ];
        let summary = GameSummary::from_moves(&moves);

        assert_eq!(summary.white.moves, 2);
        assert_eq!(summary.white.count(MoveClassification::Best), 1);
        assert_eq!(summary.white.count(MoveClassification::Inaccuracy), 1);
        assert_eq!(summary.black.count(MoveClassification::Blunder), 1);
        assert!((summary.white.average_cp_loss - 40.0).abs() < f64::EPSILON);
        assert!(summary.white.accuracy > summary.black.accuracy);
        assert_eq!(summary.side(PieceColor::Black).moves, 2);
    }

    #[test]
    fn test_summary_serializes_labels_as_keys() {
        let summary = GameSummary::from_moves(&[classified(1, MoveClassification::MissedWin, 300)]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["white"]["counts"]["missed_win"], 1);
    }
}
