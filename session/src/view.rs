//! What the session pushes to the board widget.

use chess::{format_square, format_uci_move, AnalysisScore, DestinationMap, PieceColor, Position};
use engine::AnalysisResult;

use crate::status::StatusMessage;

/// Enablement of the navigation controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub can_previous: bool,
    pub can_next: bool,
    /// 1-based cursor and length of the loaded list.
    pub list_position: Option<(usize, usize)>,
    pub moves_played: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Ongoing,
    Checkmate,
    Stalemate,
    Draw,
}

/// Last move highlight, in UCI square names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMove {
    pub from: String,
    pub to: String,
    pub san: String,
}

/// Everything the widget needs after a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardUpdate {
    pub position: Position,
    pub side_to_move: PieceColor,
    pub destinations: DestinationMap,
    pub last_move: Option<LastMove>,
    pub nav: NavState,
    pub game_state: GameState,
    pub is_favorite: bool,
    /// Status message still within its display interval.
    pub status: Option<StatusMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrow {
    pub from: String,
    pub to: String,
    /// 1-based PV rank.
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopMove {
    pub uci: String,
    /// From White's point of view.
    pub score: Option<AnalysisScore>,
    pub depth: u32,
}

/// An analysis result prepared for display. Scores are converted to White's
/// perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisDisplay {
    pub score: Option<AnalysisScore>,
    pub depth: Option<u32>,
    pub arrows: Vec<Arrow>,
    pub top_moves: Vec<TopMove>,
    pub error: Option<String>,
}

impl AnalysisDisplay {
    pub fn from_result(result: &AnalysisResult, side_to_move: PieceColor) -> Self {
        let mut arrows = Vec::new();
        let mut top_moves = Vec::new();

        for line in &result.lines {
            let Some(mv) = line.best_move() else {
                continue;
            };
            arrows.push(Arrow {
                from: format_square(mv.from),
                to: format_square(mv.to),
                rank: line.rank,
            });
            top_moves.push(TopMove {
                uci: format_uci_move(mv),
                score: line.score.map(|s| s.for_white(side_to_move)),
                depth: line.depth,
            });
        }

        Self {
            score: result.score.map(|s| s.for_white(side_to_move)),
            depth: result.depth,
            arrows,
            top_moves,
            error: result.error.clone(),
        }
    }

    /// Evaluation text such as `+0.35` or `-M2`.
    pub fn score_text(&self) -> String {
        self.score
            .map(|s| s.display())
            .unwrap_or_else(|| "?".to_string())
    }
}

/// The board widget the session drives.
pub trait BoardView {
    /// Called on every state change, including after a rejected move so the
    /// widget can revert its speculative drag.
    fn render(&mut self, update: &BoardUpdate);
    fn show_analysis(&mut self, analysis: &AnalysisDisplay);
    fn clear_analysis(&mut self);
    fn show_status(&mut self, status: &StatusMessage);
}
