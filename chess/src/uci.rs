//! UCI move text: strict parsing, formatting, and castling translation.

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use crate::converters::{format_piece, format_square, parse_promotion, parse_square};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UciMoveError {
    #[error("Not a UCI move: {0}")]
    Shape(String),
}

/// Parse a move token shaped `[a-h][1-8][a-h][1-8][qrbn]?`.
///
/// Anything else, including longer tokens and uppercase promotion letters, is
/// rejected.
pub fn parse_uci_move(s: &str) -> Result<Move, UciMoveError> {
    let shape_err = || UciMoveError::Shape(s.to_string());

    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(shape_err());
    }

    let from = parse_square(&s[0..2]).ok_or_else(shape_err)?;
    let to = parse_square(&s[2..4]).ok_or_else(shape_err)?;
    let promotion = match s[4..].chars().next() {
        Some(c) => Some(parse_promotion(c).ok_or_else(shape_err)?),
        None => None,
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

/// Format a move in UCI notation (e.g., "e2e4", "e7e8q")
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}

/// Convert UCI castling notation to cozy_chess notation.
///
/// UCI moves the king two squares (e1g1); cozy_chess moves the king onto its
/// own rook (e1h1). Only converts when the translated move is actually legal.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let from_e_file = matches!(mv.from.file(), File::E);
    let to_g_or_c = matches!(mv.to.file(), File::G | File::C);

    if !(back_rank && from_e_file && to_g_or_c && mv.promotion.is_none()) {
        return mv;
    }
    if mv.from.rank() != mv.to.rank() {
        return mv;
    }

    let rook_file = match mv.to.file() {
        File::G => File::H,
        _ => File::A,
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

/// Convert a cozy_chess king-takes-rook castling move into UCI king-two-squares
/// form. Other moves pass through.
pub fn convert_cozy_castling_to_uci(board: &Board, mv: Move) -> Move {
    if !is_cozy_castling(board, mv) {
        return mv;
    }
    let file = if (mv.to.file() as u8) > (mv.from.file() as u8) {
        File::G
    } else {
        File::C
    };
    Move {
        from: mv.from,
        to: Square::new(file, mv.from.rank()),
        promotion: None,
    }
}

/// A king "capturing" its own piece is how cozy_chess encodes castling.
pub fn is_cozy_castling(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.to) == Some(board.side_to_move())
}
