//! Lightweight board representation for text rendering.

use crate::position::Position;
use crate::types::{PieceColor, PieceKind};

/// An 8x8 board for display purposes only.
#[derive(Debug, Clone, Default)]
pub struct DisplayBoard {
    squares: [[Option<(PieceKind, PieceColor)>; 8]; 8],
}

impl DisplayBoard {
    /// Read the placement field of a position.
    pub fn from_position(position: &Position) -> Result<Self, DisplayBoardError> {
        let mut squares = [[None; 8]; 8];
        let ranks: Vec<&str> = position.placement().split('/').collect();
        if ranks.len() != 8 {
            return Err(DisplayBoardError::InvalidPlacement);
        }

        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx;
            let mut file = 0usize;
            for c in rank_str.chars() {
                if file > 7 {
                    return Err(DisplayBoardError::InvalidPlacement);
                }
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                } else {
                    let color = if c.is_uppercase() {
                        PieceColor::White
                    } else {
                        PieceColor::Black
                    };
                    let kind = PieceKind::from_char(c).ok_or(DisplayBoardError::InvalidPiece(c))?;
                    squares[rank][file] = Some((kind, color));
                    file += 1;
                }
            }
        }

        Ok(DisplayBoard { squares })
    }

    pub fn piece_at(&self, file: u8, rank: u8) -> Option<(PieceKind, PieceColor)> {
        if file > 7 || rank > 7 {
            return None;
        }
        self.squares[rank as usize][file as usize]
    }

    /// Render as text rows, rank 8 first, with coordinates.
    pub fn render(&self, orientation: PieceColor) -> String {
        let ranks: Vec<u8> = match orientation {
            PieceColor::White => (0..8).rev().collect(),
            PieceColor::Black => (0..8).collect(),
        };
        let files: Vec<u8> = match orientation {
            PieceColor::White => (0..8).collect(),
            PieceColor::Black => (0..8).rev().collect(),
        };

        let mut out = String::new();
        for rank in &ranks {
            out.push_str(&format!("{} ", rank + 1));
            for file in &files {
                let c = self
                    .piece_at(*file, *rank)
                    .map(|(kind, color)| kind.fen_char(color))
                    .unwrap_or('.');
                out.push(' ');
                out.push(c);
            }
            out.push('\n');
        }
        out.push_str("  ");
        for file in &files {
            out.push(' ');
            out.push((b'a' + file) as char);
        }
        out.push('\n');
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayBoardError {
    #[error("Invalid piece placement")]
    InvalidPlacement,
    #[error("Invalid piece character: {0}")]
    InvalidPiece(char),
}
