//! The seam between the session and whatever decides legality.

use cozy_chess::{Move, Square};
use serde::Serialize;

use crate::converters::format_square;
use crate::position::Position;
use crate::types::{PieceColor, PieceKind};

/// A move the rules engine accepted, with the metadata it derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub from: Square,
    /// Destination as the user expressed it (king two squares when castling).
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub piece: PieceKind,
    pub color: PieceColor,
    pub captured: Option<PieceKind>,
    pub san: String,
    pub position_after: Position,
}

impl AppliedMove {
    /// UCI text for the move (e.g. "e1g1", "e7e8q").
    pub fn uci(&self) -> String {
        crate::uci::format_uci_move(Move {
            from: self.from,
            to: self.to,
            promotion: self.promotion.map(Into::into),
        })
    }
}

/// Legal destinations per origin square, in board order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DestinationMap {
    entries: Vec<(String, Vec<String>)>,
}

impl DestinationMap {
    /// Build from moves already expressed in UCI (king-two-squares) form.
    pub fn from_moves(moves: impl IntoIterator<Item = Move>) -> Self {
        let mut map = Self::default();
        for mv in moves {
            map.insert(mv.from, mv.to);
        }
        map
    }

    fn insert(&mut self, from: Square, to: Square) {
        let from = format_square(from);
        let to = format_square(to);
        match self.entries.iter_mut().find(|(origin, _)| *origin == from) {
            Some((_, destinations)) => {
                if !destinations.contains(&to) {
                    destinations.push(to);
                }
            }
            None => self.entries.push((from, vec![to])),
        }
    }

    pub fn destinations(&self, from: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(origin, _)| origin == from)
            .map(|(_, destinations)| destinations.as_slice())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (origin, destination) pairs.
    pub fn move_count(&self) -> usize {
        self.entries.iter().map(|(_, d)| d.len()).sum()
    }
}

/// Legality and move application, as consumed by the session.
///
/// `construct` builds a fresh trial state so a rejected position never touches
/// the live one.
pub trait RulesEngine: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    fn construct(position: &Position) -> Result<Self, Self::Error>;

    fn legal_moves(&self) -> DestinationMap;

    /// Apply a move. `None` means illegal and leaves the state untouched.
    fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Option<AppliedMove>;

    /// Take back the most recent move. Returns false when there is none.
    fn undo_last(&mut self) -> bool;

    fn current_position(&self) -> Position;

    fn side_to_move(&self) -> PieceColor;

    fn is_checkmate(&self) -> bool;

    fn is_stalemate(&self) -> bool;

    fn is_draw(&self) -> bool;

    fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }
}
