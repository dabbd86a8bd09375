//! Engine evaluation scores.

use serde::{Deserialize, Serialize};

use crate::types::PieceColor;

/// Engine evaluation score, from the side to move's point of view.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N,
/// negative N = side-to-move gets mated in N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisScore {
    Centipawns(i32),
    Mate(i32),
}

impl AnalysisScore {
    pub fn display(&self) -> String {
        match self {
            Self::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) => {
                if *m > 0 {
                    format!("+M{}", m)
                } else {
                    format!("-M{}", m.abs())
                }
            }
        }
    }

    /// Negate the score (flip perspective).
    pub fn negate(&self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(-cp),
            Self::Mate(m) => Self::Mate(-m),
        }
    }

    /// Re-express a side-to-move score from White's perspective.
    pub fn for_white(&self, side_to_move: PieceColor) -> Self {
        match side_to_move {
            PieceColor::White => *self,
            PieceColor::Black => self.negate(),
        }
    }
}

impl std::fmt::Display for AnalysisScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
