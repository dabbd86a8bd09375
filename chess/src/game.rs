use cozy_chess::{Board, GameStatus, Move, Piece, Rank, Square};

use crate::converters::{file_char, rank_char};
use crate::position::Position;
use crate::rules::{AppliedMove, DestinationMap, RulesEngine};
use crate::types::{PieceColor, PieceKind};
use crate::uci::{convert_cozy_castling_to_uci, convert_uci_castling_to_cozy, is_cozy_castling};

/// cozy-chess backed rules engine.
///
/// Keeps the starting board plus the moves played on it; undo replays from the
/// start rather than storing a board per ply.
#[derive(Debug, Clone)]
pub struct Game {
    start: Board,
    position: Board,
    moves: Vec<Move>,
}

impl Game {
    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let start = Board::from_fen(fen, false)
            .map_err(|e| GameError::Rejected(format!("{:?}", e)))?;
        Ok(Self {
            position: start.clone(),
            start,
            moves: Vec::new(),
        })
    }

    /// Get the current board position
    pub fn board(&self) -> &Board {
        &self.position
    }

    /// Moves played since construction, in cozy_chess notation.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    fn cozy_legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.position.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    fn rebuild_position(&mut self) {
        let mut board = self.start.clone();
        for mv in &self.moves {
            board.play_unchecked(*mv);
        }
        self.position = board;
    }
}

impl RulesEngine for Game {
    type Error = GameError;

    fn construct(position: &Position) -> Result<Self, GameError> {
        Self::from_fen(position.as_str())
    }

    fn legal_moves(&self) -> DestinationMap {
        DestinationMap::from_moves(
            self.cozy_legal_moves()
                .into_iter()
                .map(|mv| convert_cozy_castling_to_uci(&self.position, mv)),
        )
    }

    fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Option<AppliedMove> {
        let board = &self.position;
        let piece = board.piece_on(from)?;
        let color = board.color_on(from)?;
        let legal = self.cozy_legal_moves();

        let promotion = if piece == Piece::Pawn && matches!(to.rank(), Rank::First | Rank::Eighth)
        {
            Some(promotion.unwrap_or(PieceKind::Queen).into())
        } else {
            None
        };
        let candidate = convert_uci_castling_to_cozy(Move { from, to, promotion }, &legal);

        if !legal.contains(&candidate) {
            tracing::debug!("Rejected illegal move {:?} -> {:?}", from, to);
            return None;
        }

        let captured = captured_piece(board, candidate, piece);
        let uci_form = convert_cozy_castling_to_uci(board, candidate);
        let mut san = generate_san(board, candidate, piece, &legal);

        let mut after = board.clone();
        after.play_unchecked(candidate);
        if after.status() == GameStatus::Won {
            san.push('#');
        } else if !after.checkers().is_empty() {
            san.push('+');
        }

        self.position = after;
        self.moves.push(candidate);

        Some(AppliedMove {
            from,
            to: uci_form.to,
            promotion: candidate.promotion.map(PieceKind::from),
            piece: piece.into(),
            color: color.into(),
            captured,
            san,
            position_after: Position::from_board(&self.position),
        })
    }

    fn undo_last(&mut self) -> bool {
        if self.moves.pop().is_none() {
            return false;
        }
        self.rebuild_position();
        true
    }

    fn current_position(&self) -> Position {
        Position::from_board(&self.position)
    }

    fn side_to_move(&self) -> PieceColor {
        self.position.side_to_move().into()
    }

    fn is_checkmate(&self) -> bool {
        self.position.status() == GameStatus::Won
    }

    fn is_stalemate(&self) -> bool {
        self.position.checkers().is_empty() && self.cozy_legal_moves().is_empty()
    }

    fn is_draw(&self) -> bool {
        self.position.status() == GameStatus::Drawn
    }
}

fn captured_piece(board: &Board, mv: Move, piece: Piece) -> Option<PieceKind> {
    if is_cozy_castling(board, mv) {
        return None;
    }
    if let Some(target) = board.piece_on(mv.to) {
        return Some(target.into());
    }
    // En passant: pawn changes file onto an empty square
    if piece == Piece::Pawn && mv.from.file() != mv.to.file() {
        return Some(PieceKind::Pawn);
    }
    None
}

/// SAN without the check suffix, which needs the board after the move.
fn generate_san(board: &Board, mv: Move, piece: Piece, legal: &[Move]) -> String {
    if is_cozy_castling(board, mv) {
        return if (mv.to.file() as u8) > (mv.from.file() as u8) {
            "O-O".to_string()
        } else {
            "O-O-O".to_string()
        };
    }

    let is_capture = captured_piece(board, mv, piece).is_some();
    let mut san = String::new();

    match PieceKind::from(piece).san_letter() {
        Some(letter) => {
            san.push(letter);
            san.push_str(&disambiguation(board, mv, piece, legal));
        }
        None => {
            if is_capture {
                san.push(file_char(mv.from.file()));
            }
        }
    }

    if is_capture {
        san.push('x');
    }
    san.push(file_char(mv.to.file()));
    san.push(rank_char(mv.to.rank()));

    if let Some(promo) = mv.promotion.and_then(|p| PieceKind::from(p).san_letter()) {
        san.push('=');
        san.push(promo);
    }

    san
}

fn disambiguation(board: &Board, mv: Move, piece: Piece, legal: &[Move]) -> String {
    let rivals: Vec<&Move> = legal
        .iter()
        .filter(|other| {
            other.to == mv.to && other.from != mv.from && board.piece_on(other.from) == Some(piece)
        })
        .collect();

    if rivals.is_empty() {
        return String::new();
    }

    let shares_file = rivals.iter().any(|o| o.from.file() == mv.from.file());
    let shares_rank = rivals.iter().any(|o| o.from.rank() == mv.from.rank());

    match (shares_file, shares_rank) {
        (false, _) => file_char(mv.from.file()).to_string(),
        (true, false) => rank_char(mv.from.rank()).to_string(),
        (true, true) => format!("{}{}", file_char(mv.from.file()), rank_char(mv.from.rank())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Rules engine rejected position: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::parse_square;
    use crate::position::STARTING_POSITION;

    fn sq(s: &str) -> Square {
        parse_square(s).unwrap()
    }

    fn game(fen: &str) -> Game {
        Game::construct(&Position::parse(fen).unwrap()).unwrap()
    }

    fn play(game: &mut Game, from: &str, to: &str) -> AppliedMove {
        game.apply_move(sq(from), sq(to), Some(PieceKind::Queen))
            .unwrap_or_else(|| panic!("{from}{to} should be legal"))
    }

    #[test]
    fn test_starting_position_moves() {
        let game = game(STARTING_POSITION);
        let moves = game.legal_moves();
        assert_eq!(moves.move_count(), 20);
        let mut pawn = moves.destinations("e2").to_vec();
        pawn.sort();
        assert_eq!(pawn, ["e3", "e4"]);
        assert!(moves.destinations("e1").is_empty());
    }

    #[test]
    fn test_apply_records_san_and_position() {
        let mut game = game(STARTING_POSITION);
        let applied = play(&mut game, "e2", "e4");
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.piece, PieceKind::Pawn);
        assert_eq!(applied.color, PieceColor::White);
        assert_eq!(applied.captured, None);
        assert_eq!(applied.uci(), "e2e4");
        assert_eq!(
            applied.position_after.as_str(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert_eq!(game.side_to_move(), PieceColor::Black);
    }

    #[test]
    fn test_illegal_move_leaves_state() {
        let mut game = game(STARTING_POSITION);
        assert!(game.apply_move(sq("e2"), sq("e5"), None).is_none());
        assert!(game.apply_move(sq("e4"), sq("e5"), None).is_none());
        assert_eq!(game.current_position(), Position::starting());
        assert!(game.moves().is_empty());
    }

    #[test]
    fn test_castling_in_uci_form() {
        let mut game = game("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        assert!(game
            .legal_moves()
            .destinations("e1")
            .contains(&"g1".to_string()));
        let applied = play(&mut game, "e1", "g1");
        assert_eq!(applied.san, "O-O");
        assert_eq!(applied.uci(), "e1g1");
        assert_eq!(applied.captured, None);

        let applied = play(&mut game, "e8", "c8");
        assert_eq!(applied.san, "O-O-O");
    }

    #[test]
    fn test_promotion_defaults_to_queen() {
        let mut game = game("8/4P3/8/8/8/8/k7/4K3 w - - 0 1");
        let applied = game.apply_move(sq("e7"), sq("e8"), None).unwrap();
        assert_eq!(applied.promotion, Some(PieceKind::Queen));
        assert_eq!(applied.san, "e8=Q");
        assert_eq!(applied.uci(), "e7e8q");
    }

    #[test]
    fn test_knight_disambiguation() {
        let mut game = game("4k3/8/8/8/8/8/8/1N2KN2 w - - 0 1");
        let applied = play(&mut game, "b1", "d2");
        assert_eq!(applied.san, "Nbd2");
    }

    #[test]
    fn test_capture_and_undo() {
        let mut game = game(STARTING_POSITION);
        play(&mut game, "e2", "e4");
        play(&mut game, "d7", "d5");
        let capture = play(&mut game, "e4", "d5");
        assert_eq!(capture.san, "exd5");
        assert_eq!(capture.captured, Some(PieceKind::Pawn));

        assert!(game.undo_last());
        assert!(game.undo_last());
        assert!(game.undo_last());
        assert!(!game.undo_last());
        assert_eq!(game.current_position(), Position::starting());
    }

    #[test]
    fn test_checkmate_detection() {
        let mut game = game(STARTING_POSITION);
        play(&mut game, "f2", "f3");
        play(&mut game, "e7", "e5");
        play(&mut game, "g2", "g4");
        let mate = play(&mut game, "d8", "h4");
        assert_eq!(mate.san, "Qh4#");
        assert!(game.is_checkmate());
        assert!(game.is_game_over());
        assert!(!game.is_stalemate());
        assert!(game.legal_moves().is_empty());
    }

    #[test]
    fn test_stalemate_detection() {
        let game = game("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        assert!(game.is_stalemate());
        assert!(game.is_draw());
        assert!(!game.is_checkmate());
    }

    #[test]
    fn test_kingless_board_rejected() {
        let empty = Position::parse("8/8/8/8/8/8/8/8 w - - 0 1").unwrap();
        assert!(Game::construct(&empty).is_err());
    }
}
