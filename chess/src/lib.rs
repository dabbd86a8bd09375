//! Chess domain types for the analyzer.
//!
//! Positions are carried around as normalized FEN strings ([`Position`]).
//! Legality is delegated to cozy-chess behind the [`RulesEngine`] trait so the
//! session layer never touches cozy-chess board internals directly.

pub mod analysis;
pub mod board_display;
pub mod converters;
pub mod game;
pub mod position;
pub mod rules;
pub mod types;
pub mod uci;

pub use analysis::AnalysisScore;
pub use board_display::{DisplayBoard, DisplayBoardError};
pub use converters::*;
pub use game::{Game, GameError};
pub use position::{Position, PositionError, STARTING_POSITION};
pub use rules::{AppliedMove, DestinationMap, RulesEngine};
pub use types::{PieceColor, PieceKind};
pub use uci::{
    convert_cozy_castling_to_uci, convert_uci_castling_to_cozy, format_uci_move, parse_uci_move,
    UciMoveError,
};
