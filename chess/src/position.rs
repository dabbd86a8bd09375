//! Normalized FEN positions and structural validation.
//!
//! Structural validation only checks that a string *looks* like a FEN: eight
//! ranks of width eight, known piece letters, well-formed trailing fields.
//! Whether the position is playable (kings present, side not to move in check,
//! ...) is the rules engine's call.

use serde::{Deserialize, Serialize};

use crate::types::PieceColor;

pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Defaults for FEN fields 2..=6, used to pad truncated input.
const DEFAULT_TRAILING_FIELDS: [&str; 5] = ["w", "-", "-", "0", "1"];

/// A FEN string normalized to exactly six whitespace-separated fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    /// Normalize raw text into a six-field position without validating it.
    ///
    /// Missing trailing fields are filled with `w - - 0 1`. Fields beyond the
    /// sixth are dropped.
    pub fn normalize(raw: &str) -> Result<Self, PositionError> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() {
            return Err(PositionError::Empty);
        }
        if fields.len() > 6 {
            tracing::debug!("Dropping {} extra FEN fields", fields.len() - 6);
        }

        let mut normalized: Vec<&str> = fields.into_iter().take(6).collect();
        let present = normalized.len();
        normalized.extend_from_slice(&DEFAULT_TRAILING_FIELDS[present - 1..]);

        Ok(Self(normalized.join(" ")))
    }

    /// Normalize and structurally validate in one step.
    pub fn parse(raw: &str) -> Result<Self, PositionError> {
        let position = Self::normalize(raw)?;
        position.validate_structure()?;
        Ok(position)
    }

    pub fn starting() -> Self {
        Self(STARTING_POSITION.to_string())
    }

    /// Wrap a FEN produced by cozy-chess, which is always complete.
    pub(crate) fn from_board(board: &cozy_chess::Board) -> Self {
        Self(board.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The six FEN fields, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.split_whitespace()
    }

    fn field(&self, index: usize) -> &str {
        self.fields().nth(index).unwrap_or_default()
    }

    pub fn placement(&self) -> &str {
        self.field(0)
    }

    /// Side to move as written in the position. Anything but `b` reads as White.
    pub fn side_to_move(&self) -> PieceColor {
        match self.field(1) {
            "b" => PieceColor::Black,
            _ => PieceColor::White,
        }
    }

    /// Full-move number, 1 when the field is unreadable.
    pub fn fullmove_number(&self) -> u32 {
        self.field(5).parse().unwrap_or(1)
    }

    /// Check the FEN grammar of every field. Says nothing about legality.
    pub fn validate_structure(&self) -> Result<(), PositionError> {
        validate_placement(self.placement())?;

        let side = self.field(1);
        if !matches!(side, "w" | "b") {
            return Err(PositionError::SideToMove(side.to_string()));
        }

        let castling = self.field(2);
        if !is_valid_castling(castling) {
            return Err(PositionError::Castling(castling.to_string()));
        }

        let en_passant = self.field(3);
        if !is_valid_en_passant(en_passant) {
            return Err(PositionError::EnPassant(en_passant.to_string()));
        }

        let halfmove = self.field(4);
        if halfmove.parse::<u32>().is_err() {
            return Err(PositionError::Clock(halfmove.to_string()));
        }
        let fullmove = self.field(5);
        if !matches!(fullmove.parse::<u32>(), Ok(n) if n >= 1) {
            return Err(PositionError::Clock(fullmove.to_string()));
        }

        Ok(())
    }
}

fn validate_placement(placement: &str) -> Result<(), PositionError> {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(PositionError::RankCount(ranks.len()));
    }

    for (idx, rank) in ranks.iter().enumerate() {
        let mut width = 0u32;
        for c in rank.chars() {
            match c {
                '1'..='8' => width += c.to_digit(10).unwrap_or_default(),
                'p' | 'n' | 'b' | 'r' | 'q' | 'k' | 'P' | 'N' | 'B' | 'R' | 'Q' | 'K' => {
                    width += 1
                }
                other => return Err(PositionError::InvalidPiece(other)),
            }
        }
        if width != 8 {
            return Err(PositionError::RankWidth {
                rank: 8 - idx,
                width,
            });
        }
    }

    Ok(())
}

fn is_valid_castling(field: &str) -> bool {
    if field == "-" {
        return true;
    }
    if field.is_empty() || field.len() > 4 {
        return false;
    }
    let mut seen = Vec::with_capacity(4);
    for c in field.chars() {
        if !matches!(c, 'K' | 'Q' | 'k' | 'q') || seen.contains(&c) {
            return false;
        }
        seen.push(c);
    }
    true
}

fn is_valid_en_passant(field: &str) -> bool {
    if field == "-" {
        return true;
    }
    let bytes = field.as_bytes();
    bytes.len() == 2 && (b'a'..=b'h').contains(&bytes[0]) && matches!(bytes[1], b'3' | b'6')
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Position {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Position {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A position string that is structurally malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("Empty position")]
    Empty,
    #[error("Expected 8 ranks, found {0}")]
    RankCount(usize),
    #[error("Rank {rank} covers {width} squares instead of 8")]
    RankWidth { rank: usize, width: u32 },
    #[error("Invalid piece character: {0}")]
    InvalidPiece(char),
    #[error("Invalid side to move: {0}")]
    SideToMove(String),
    #[error("Invalid castling rights: {0}")]
    Castling(String),
    #[error("Invalid en passant square: {0}")]
    EnPassant(String),
    #[error("Invalid move counter: {0}")]
    Clock(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pads_placement_only() {
        let pos = Position::normalize("8/8/8/8/8/8/8/8").unwrap();
        assert_eq!(pos.as_str(), "8/8/8/8/8/8/8/8 w - - 0 1");
    }

    #[test]
    fn test_pads_partial_fields() {
        let pos = Position::normalize("  4k3/8/8/8/8/8/8/4K3   b  KQ ").unwrap();
        assert_eq!(pos.as_str(), "4k3/8/8/8/8/8/8/4K3 b KQ - 0 1");
        assert_eq!(pos.side_to_move(), PieceColor::Black);
    }

    #[test]
    fn test_keeps_full_fen() {
        let pos = Position::normalize(STARTING_POSITION).unwrap();
        assert_eq!(pos, Position::starting());
    }

    #[test]
    fn test_drops_extra_fields() {
        let pos = Position::normalize("8/8/8/8/8/8/8/8 w - - 0 1 extra").unwrap();
        assert_eq!(pos.fields().count(), 6);
    }

    #[test]
    fn test_fullmove_number() {
        assert_eq!(Position::starting().fullmove_number(), 1);
        let pos = Position::normalize("4k3/8/8/8/8/8/8/4K3 b - - 12 40").unwrap();
        assert_eq!(pos.fullmove_number(), 40);
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(Position::normalize("   "), Err(PositionError::Empty));
    }

    #[test]
    fn test_empty_board_is_structurally_valid() {
        let pos = Position::parse("8/8/8/8/8/8/8/8 w - - 0 1").unwrap();
        assert_eq!(pos.placement(), "8/8/8/8/8/8/8/8");
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            Position::parse("8/8/8/8/8/8/8"),
            Err(PositionError::RankCount(7))
        );
        assert_eq!(
            Position::parse("9/8/8/8/8/8/8/8"),
            Err(PositionError::InvalidPiece('9'))
        );
        assert_eq!(
            Position::parse("7/8/8/8/8/8/8/8"),
            Err(PositionError::RankWidth { rank: 8, width: 7 })
        );
        assert_eq!(
            Position::parse("8/8/8/8/8/8/8/8 x"),
            Err(PositionError::SideToMove("x".to_string()))
        );
        assert_eq!(
            Position::parse("8/8/8/8/8/8/8/8 w KK"),
            Err(PositionError::Castling("KK".to_string()))
        );
        assert_eq!(
            Position::parse("8/8/8/8/8/8/8/8 w - e4"),
            Err(PositionError::EnPassant("e4".to_string()))
        );
        assert_eq!(
            Position::parse("8/8/8/8/8/8/8/8 w - - 0 0"),
            Err(PositionError::Clock("0".to_string()))
        );
    }

    #[test]
    fn test_serde_is_plain_string() {
        let json = serde_json::to_string(&Position::starting()).unwrap();
        assert_eq!(json, format!("\"{}\"", STARTING_POSITION));
    }

    proptest! {
        #[test]
        fn prop_normalized_has_six_fields(present in 1usize..=6) {
            let source: Vec<&str> = STARTING_POSITION.split(' ').take(present).collect();
            let pos = Position::normalize(&source.join(" ")).unwrap();
            let fields: Vec<&str> = pos.fields().collect();
            prop_assert_eq!(fields.len(), 6);
            for (i, field) in fields.iter().enumerate() {
                if i < present {
                    prop_assert_eq!(*field, source[i]);
                } else {
                    prop_assert_eq!(*field, DEFAULT_TRAILING_FIELDS[i - 1]);
                }
            }
        }

        #[test]
        fn prop_normalize_is_idempotent(present in 1usize..=6) {
            let source: Vec<&str> = STARTING_POSITION.split(' ').take(present).collect();
            let once = Position::normalize(&source.join(" ")).unwrap();
            let twice = Position::normalize(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
