use engine::Evaluation;
use serde::{Deserialize, Serialize};

/// Quality label for a played move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveClassification {
    /// Finds a forced mate, or turns a lost mate race around.
    Brilliant,
    /// Reserved; no rule produces it yet.
    Great,
    /// The engine's top choice.
    Best,
    /// Within 10 cp of best.
    Excellent,
    /// Within 50 cp of best.
    Good,
    /// Reserved; no rule produces it yet.
    Book,
    /// 51-100 cp worse than best.
    Inaccuracy,
    /// 101-200 cp worse than best.
    Mistake,
    /// More than 200 cp lost, or a forced mate thrown away or allowed.
    Blunder,
    /// Reserved; no rule produces it yet.
    MissedWin,
}

impl MoveClassification {
    pub const ALL: [MoveClassification; 10] = [
        Self::Brilliant,
        Self::Great,
        Self::Best,
        Self::Excellent,
        Self::Good,
        Self::Book,
        Self::Inaccuracy,
        Self::Mistake,
        Self::Blunder,
        Self::MissedWin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brilliant => "brilliant",
            Self::Great => "great",
            Self::Best => "best",
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Book => "book",
            Self::Inaccuracy => "inaccuracy",
            Self::Mistake => "mistake",
            Self::Blunder => "blunder",
            Self::MissedWin => "missed_win",
        }
    }

    /// NAG (Numeric Annotation Glyph) for PGN export.
    pub fn to_nag(self) -> Option<u8> {
        match self {
            Self::Brilliant => Some(3), // !!
            Self::Great => Some(1),     // !
            Self::Inaccuracy => Some(6), // ?!
            Self::Mistake => Some(2),    // ?
            Self::Blunder | Self::MissedWin => Some(4), // ??
            Self::Best | Self::Excellent | Self::Good | Self::Book => None,
        }
    }
}

impl std::fmt::Display for MoveClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Centipawns the mover gave up.
///
/// `before` is from the mover's perspective, `after` from the opponent's,
/// so `after` is negated back before comparing.
pub fn cp_loss(before: &Evaluation, after: &Evaluation) -> i32 {
    before.score - (-after.score)
}

/// Label a move from the evaluations around it. Mate transitions are
/// decided first; the centipawn ladder applies only when neither side
/// has a forced mate.
pub fn classify(
    before: &Evaluation,
    after: &Evaluation,
    best_move_played: bool,
) -> MoveClassification {
    // `after` is from the opponent's view: a positive score there is a
    // mate for the opponent.
    let mover_mates_before = before.mate_favors_side_to_move();
    let opponent_mates_after = after.mate_favors_side_to_move();

    match (mover_mates_before, opponent_mates_after) {
        (Some(_), None) => return MoveClassification::Blunder,
        (None, Some(true)) => return MoveClassification::Blunder,
        (None, Some(false)) => return MoveClassification::Brilliant,
        (Some(true), Some(true)) => return MoveClassification::Blunder,
        (Some(false), Some(false)) => return MoveClassification::Brilliant,
        (Some(_), Some(_)) | (None, None) => {}
    }

    match cp_loss(before, after) {
        loss if loss <= 0 && best_move_played => MoveClassification::Best,
        loss if loss <= 10 => {
            if best_move_played {
                MoveClassification::Best
            } else {
                MoveClassification::Excellent
            }
        }
        loss if loss <= 50 => MoveClassification::Good,
        loss if loss <= 100 => MoveClassification::Inaccuracy,
        loss if loss <= 200 => MoveClassification::Mistake,
        _ => MoveClassification::Blunder,
    }
}
