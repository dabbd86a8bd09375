//! Plain-text board widget for the terminal.

use std::io::Write;

use chess::{DisplayBoard, PieceColor};
use session::{
    AnalysisDisplay, BoardUpdate, BoardView, GameState, StatusKind, StatusMessage,
};

/// Writes board updates, analysis, and status lines to `out`.
pub struct TerminalBoard<W: Write> {
    out: W,
    orientation: PieceColor,
    /// Print the board on every render. Off for batch output.
    show_board: bool,
}

impl<W: Write> TerminalBoard<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            orientation: PieceColor::White,
            show_board: true,
        }
    }

    pub fn with_board(mut self, show_board: bool) -> Self {
        self.show_board = show_board;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write> BoardView for TerminalBoard<W> {
    fn render(&mut self, update: &BoardUpdate) {
        let mut text = String::new();

        if self.show_board {
            match DisplayBoard::from_position(&update.position) {
                Ok(board) => text.push_str(&board.render(self.orientation)),
                Err(e) => tracing::warn!("Cannot draw {}: {}", update.position, e),
            }
        }
        text.push_str(&format!("FEN: {}\n", update.position));

        let mut info = format!("{} to move", capitalize(update.side_to_move.as_str()));
        if let Some(last) = &update.last_move {
            info.push_str(&format!(" | last: {}", last.san));
        }
        if let Some((index, len)) = update.nav.list_position {
            info.push_str(&format!(" | position {}/{}", index, len));
        }
        if update.is_favorite {
            info.push_str(" | *favorite*");
        }
        text.push_str(&info);
        text.push('\n');

        if let Some(state) = game_state_text(update.game_state, update.side_to_move) {
            text.push_str(state);
            text.push('\n');
        }
        self.emit(&text);
    }

    fn show_analysis(&mut self, analysis: &AnalysisDisplay) {
        if let Some(error) = &analysis.error {
            self.emit(&format!("Analysis error: {}\n", error));
            return;
        }

        let depth = analysis
            .depth
            .map(|d| format!(" (depth {})", d))
            .unwrap_or_default();
        let mut text = format!("Eval: {}{}\n", analysis.score_text(), depth);
        for (i, top) in analysis.top_moves.iter().enumerate() {
            let score = top.score.map(|s| s.display()).unwrap_or_else(|| "?".to_string());
            text.push_str(&format!("  {}. {} {}\n", i + 1, top.uci, score));
        }
        self.emit(&text);
    }

    fn clear_analysis(&mut self) {}

    fn show_status(&mut self, status: &StatusMessage) {
        let tag = match status.kind {
            StatusKind::Info => "info",
            StatusKind::Error => "error",
        };
        self.emit(&format!("[{}] {}\n", tag, status.text));
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn game_state_text(state: GameState, side_to_move: PieceColor) -> Option<&'static str> {
    match (state, side_to_move) {
        (GameState::Ongoing, _) => None,
        (GameState::Checkmate, PieceColor::White) => Some("Checkmate, Black wins"),
        (GameState::Checkmate, PieceColor::Black) => Some("Checkmate, White wins"),
        (GameState::Stalemate, _) => Some("Stalemate"),
        (GameState::Draw, _) => Some("Draw"),
    }
}

/// Moves in numbered pairs: `1. e4 e5 2. Nf3`. Starts at `first_move` with
/// `black_first` when the position began with Black to move.
pub fn format_move_list(sans: &[&str], first_move: u32, black_first: bool) -> String {
    let mut parts = Vec::new();
    let mut number = first_move;
    let mut white_turn = !black_first;

    for (i, san) in sans.iter().enumerate() {
        if white_turn {
            parts.push(format!("{}. {}", number, san));
        } else if i == 0 {
            parts.push(format!("{}... {}", number, san));
        } else {
            parts.push(san.to_string());
        }
        if !white_turn {
            number += 1;
        }
        white_turn = !white_turn;
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{AnalysisScore, DestinationMap, Position};
    use session::{Arrow, LastMove, NavState, TopMove};
    use std::time::Instant;

    fn update(position: Position) -> BoardUpdate {
        BoardUpdate {
            side_to_move: position.side_to_move(),
            position,
            destinations: DestinationMap::default(),
            last_move: None,
            nav: NavState::default(),
            game_state: GameState::Ongoing,
            is_favorite: false,
            status: None,
        }
    }

    fn output(board: TerminalBoard<Vec<u8>>) -> String {
        String::from_utf8(board.into_inner()).unwrap()
    }

    #[test]
    fn test_render_draws_board_and_summary() {
        let mut board = TerminalBoard::new(Vec::new());
        let mut u = update(Position::starting());
        u.nav.list_position = Some((2, 5));
        u.last_move = Some(LastMove {
            from: "g1".to_string(),
            to: "f3".to_string(),
            san: "Nf3".to_string(),
        });
        board.render(&u);

        let text = output(board);
        assert!(text.starts_with("8  r n b q k b n r\n"));
        assert!(text.contains("   a b c d e f g h\n"));
        assert!(text.contains("White to move | last: Nf3 | position 2/5"));
    }

    #[test]
    fn test_render_without_board_reports_mate() {
        let mut board = TerminalBoard::new(Vec::new()).with_board(false);
        let position =
            Position::parse("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        let mut u = update(position);
        u.game_state = GameState::Checkmate;
        board.render(&u);

        let text = output(board);
        assert!(text.starts_with("FEN: rnb1kbnr"));
        assert!(text.contains("Checkmate, Black wins"));
    }

    #[test]
    fn test_analysis_lines() {
        let mut board = TerminalBoard::new(Vec::new());
        board.show_analysis(&AnalysisDisplay {
            score: Some(AnalysisScore::Centipawns(35)),
            depth: Some(20),
            arrows: vec![Arrow {
                from: "e2".to_string(),
                to: "e4".to_string(),
                rank: 1,
            }],
            top_moves: vec![
                TopMove {
                    uci: "e2e4".to_string(),
                    score: Some(AnalysisScore::Centipawns(35)),
                    depth: 20,
                },
                TopMove {
                    uci: "d2d4".to_string(),
                    score: Some(AnalysisScore::Mate(-2)),
                    depth: 20,
                },
            ],
            error: None,
        });

        assert_eq!(
            output(board),
            "Eval: +0.35 (depth 20)\n  1. e2e4 +0.35\n  2. d2d4 -M2\n"
        );
    }

    #[test]
    fn test_status_tags() {
        let mut board = TerminalBoard::new(Vec::new());
        board.show_status(&StatusMessage {
            kind: StatusKind::Error,
            text: "No valid position found".to_string(),
            posted_at: Instant::now(),
        });
        assert_eq!(output(board), "[error] No valid position found\n");
    }

    #[test]
    fn test_move_list_numbering() {
        assert_eq!(format_move_list(&["e4", "e5", "Nf3"], 1, false), "1. e4 e5 2. Nf3");
        assert_eq!(format_move_list(&["Kd7", "Rh8"], 40, true), "40... Kd7 41. Rh8");
        assert_eq!(format_move_list(&[], 1, false), "");
    }
}
