//! The session: one live board, its move history, an optional position list,
//! and an optional analysis engine.
//!
//! All state is owned here and mutated from a single caller. The only
//! concurrency is the analysis coordinator, reached through tickets.

use std::time::Duration;

use chess::{AppliedMove, PieceKind, Position, RulesEngine};
use cozy_chess::Square;
use engine::{AnalysisCoordinator, AnalysisResult, AnalysisTicket, EngineStartupError};

use crate::error::SessionError;
use crate::favorites::FavoritesStore;
use crate::history::MoveHistory;
use crate::navigator::{ListEntry, ListSource, PositionList, StepOutcome};
use crate::status::{StatusLine, StatusMessage};
use crate::view::{AnalysisDisplay, BoardUpdate, BoardView, GameState, LastMove, NavState};

/// Label used for favorites saved from a position that did not come from a list.
pub const MANUAL_LABEL: &str = "manual";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub depth: u8,
    pub status_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            depth: crate::config::DEFAULT_DEPTH,
            status_ttl: Duration::from_millis(3000),
        }
    }
}

/// Whether analysis is running, and for which position.
///
/// `Active` always names the position the request was made for, so a result
/// can be checked against the board before it is shown.
#[derive(Debug)]
pub enum AnalysisState {
    Inactive,
    Active {
        generation: u64,
        position: Position,
        /// Taken by whoever awaits the result.
        ticket: Option<AnalysisTicket>,
    },
}

impl AnalysisState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

pub struct Session<R: RulesEngine, V: BoardView> {
    game: R,
    history: MoveHistory<AppliedMove>,
    positions: PositionList,
    analysis: AnalysisState,
    coordinator: Option<AnalysisCoordinator>,
    engine_error: Option<String>,
    depth: u8,
    favorites: FavoritesStore,
    status: StatusLine,
    view: V,
}

impl<R: RulesEngine, V: BoardView> Session<R, V> {
    /// Start a session on the standard starting position.
    pub fn new(view: V, favorites: FavoritesStore, config: SessionConfig) -> Result<Self, SessionError> {
        let game = R::construct(&Position::starting())
            .map_err(|e| SessionError::Rejected(e.to_string()))?;
        let mut session = Self {
            game,
            history: MoveHistory::new(),
            positions: PositionList::new(),
            analysis: AnalysisState::Inactive,
            coordinator: None,
            engine_error: None,
            depth: config.depth.max(1),
            favorites,
            status: StatusLine::new(config.status_ttl),
            view,
        };
        session.refresh();
        Ok(session)
    }

    pub fn attach_engine(&mut self, coordinator: AnalysisCoordinator) {
        tracing::info!("Analysis engine attached");
        self.coordinator = Some(coordinator);
        self.engine_error = None;
    }

    /// Record that the engine could not be started. Reported once; analysis
    /// stays unavailable for the rest of the session.
    pub fn engine_unavailable(&mut self, error: &EngineStartupError) {
        let reason = error.to_string();
        tracing::error!("Analysis unavailable: {}", reason);
        self.post_error(format!("Engine unavailable: {}", reason));
        self.engine_error = Some(reason);
    }

    // ---- Board state ----

    /// Replace the board with `raw`. On failure nothing changes.
    pub fn load_position(&mut self, raw: &str) -> Result<(), SessionError> {
        let result = Position::parse(raw)
            .map_err(SessionError::from)
            .and_then(|position| {
                let game = R::construct(&position)
                    .map_err(|e| SessionError::Rejected(e.to_string()))?;
                Ok((position, game))
            });

        let (position, game) = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                self.post_error(format!("Invalid position: {}", e));
                return Err(e);
            }
        };

        let shown = game.current_position();
        self.install(game);
        if self.positions.sync_cursor(&[&position, &shown]) {
            self.positions.settle_current(shown);
        }
        self.post_info("Position loaded");
        self.refresh();
        Ok(())
    }

    /// Apply a move made on the board widget. Pawns reaching the last rank
    /// promote to a queen.
    pub fn apply_user_move(&mut self, from: Square, to: Square) -> Result<AppliedMove, SessionError> {
        let Some(applied) = self.game.apply_move(from, to, Some(PieceKind::Queen)) else {
            let error = SessionError::IllegalMove {
                from: chess::format_square(from),
                to: chess::format_square(to),
            };
            self.post_error(error.to_string());
            // Re-render so the widget drops its speculative move
            self.refresh();
            return Err(error);
        };

        tracing::debug!("Applied {} ({})", applied.uci(), applied.san);
        self.history.apply(applied.clone());
        self.after_board_change();
        Ok(applied)
    }

    pub fn undo(&mut self) -> Result<(), SessionError> {
        self.step_back()?;
        self.after_board_change();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), SessionError> {
        self.step_forward()?;
        self.after_board_change();
        Ok(())
    }

    /// Undo every move. Returns how many were taken back.
    pub fn jump_to_start(&mut self) -> usize {
        let mut steps = 0;
        while self.step_back().is_ok() {
            steps += 1;
        }
        if steps > 0 {
            self.after_board_change();
        }
        steps
    }

    /// Redo every move. Returns how many were re-applied.
    pub fn jump_to_end(&mut self) -> usize {
        let mut steps = 0;
        while self.step_forward().is_ok() {
            steps += 1;
        }
        if steps > 0 {
            self.after_board_change();
        }
        steps
    }

    fn step_back(&mut self) -> Result<(), SessionError> {
        if !self.history.can_undo() {
            return Err(SessionError::NothingToUndo);
        }
        if !self.game.undo_last() {
            tracing::warn!("Rules engine had no move to take back");
            return Err(SessionError::NothingToUndo);
        }
        self.history.undo();
        Ok(())
    }

    fn step_forward(&mut self) -> Result<(), SessionError> {
        let Some(mv) = self.history.peek_redo() else {
            return Err(SessionError::NothingToRedo);
        };
        let (from, to, promotion) = (mv.from, mv.to, mv.promotion);
        if self.game.apply_move(from, to, promotion).is_none() {
            tracing::error!("Recorded move {}{} no longer applies", from, to);
            return Err(SessionError::IllegalMove {
                from: chess::format_square(from),
                to: chess::format_square(to),
            });
        }
        self.history.redo();
        Ok(())
    }

    fn install(&mut self, game: R) {
        self.deactivate_analysis();
        self.game = game;
        self.history.reset();
    }

    fn after_board_change(&mut self) {
        if self.analysis.is_active() {
            self.start_analysis();
        }
        self.refresh();
    }

    // ---- Position list ----

    /// Load a list from text and show its first loadable entry.
    pub fn load_position_list(&mut self, text: &str, label: &str) -> StepOutcome {
        let count = self.positions.load(text, ListSource::File(label.to_string()));
        if count == 0 {
            self.post_error(format!("No positions found in {}", label));
            self.refresh();
            return StepOutcome::AtBoundary;
        }
        self.post_info(format!("Loaded {} positions from {}", count, label));
        self.navigate(|list, try_load| list.load_current(try_load))
    }

    /// Load every favorite as a list, keeping each entry's original label.
    pub fn load_favorites_list(&mut self) -> StepOutcome {
        let entries: Vec<ListEntry> = self
            .favorites
            .get_all()
            .iter()
            .map(|f| ListEntry {
                position: f.position.clone(),
                label: Some(f.source_label.clone()),
            })
            .collect();
        if entries.is_empty() {
            self.post_error("No favorites saved");
            self.refresh();
            return StepOutcome::AtBoundary;
        }
        self.positions.load_entries(entries, ListSource::Favorites);
        self.navigate(|list, try_load| list.load_current(try_load))
    }

    pub fn next_position(&mut self) -> StepOutcome {
        self.navigate(|list, try_load| list.next(try_load))
    }

    pub fn previous_position(&mut self) -> StepOutcome {
        self.navigate(|list, try_load| list.previous(try_load))
    }

    /// Jump to a 1-based list entry.
    pub fn jump_to(&mut self, one_based: usize) -> Result<StepOutcome, SessionError> {
        let mut failure = None;
        let outcome = self.navigate(|list, try_load| match list.jump_to(one_based, try_load) {
            Ok(outcome) => outcome,
            Err(e) => {
                failure = Some(e);
                StepOutcome::Unchanged
            }
        });
        match failure {
            Some(e) => {
                self.post_error(e.to_string());
                Err(e.into())
            }
            None => Ok(outcome),
        }
    }

    /// Run a navigator operation with a loader that validates structure and
    /// builds a trial rules state, then install whatever loaded.
    fn navigate(
        &mut self,
        op: impl FnOnce(&mut PositionList, &mut dyn FnMut(&Position) -> Result<(), String>) -> StepOutcome,
    ) -> StepOutcome {
        let mut loaded: Option<R> = None;
        let mut try_load = |position: &Position| -> Result<(), String> {
            position.validate_structure().map_err(|e| e.to_string())?;
            let game = R::construct(position).map_err(|e| e.to_string())?;
            loaded = Some(game);
            Ok(())
        };
        let outcome = op(&mut self.positions, &mut try_load);

        match outcome {
            StepOutcome::Loaded { index, skipped } => {
                if let Some(game) = loaded {
                    self.positions.settle_current(game.current_position());
                    self.install(game);
                }
                let total = self.positions.len();
                if skipped > 0 {
                    self.post_info(format!(
                        "Position {}/{} (skipped {} invalid)",
                        index + 1,
                        total,
                        skipped
                    ));
                } else {
                    self.post_info(format!("Position {}/{}", index + 1, total));
                }
            }
            StepOutcome::NoValidEntry { skipped } => {
                self.post_error(format!("No valid position found (skipped {} invalid)", skipped));
            }
            StepOutcome::AtBoundary | StepOutcome::Unchanged => {}
        }
        self.refresh();
        outcome
    }

    // ---- Analysis ----

    /// Flip analysis on or off. Returns whether it is now active.
    pub fn toggle_analysis(&mut self) -> Result<bool, SessionError> {
        if self.analysis.is_active() {
            self.deactivate_analysis();
            self.post_info("Analysis stopped");
            return Ok(false);
        }

        if self.coordinator.is_none() {
            let reason = self
                .engine_error
                .clone()
                .unwrap_or_else(|| "no engine attached".to_string());
            return Err(SessionError::AnalysisUnavailable(reason));
        }
        self.start_analysis();
        Ok(true)
    }

    fn start_analysis(&mut self) {
        let Some(coordinator) = self.coordinator.as_mut() else {
            return;
        };
        let position = self.game.current_position();
        let ticket = coordinator.analyze(&position, self.depth);
        tracing::debug!("Analysis generation {} for {}", ticket.generation(), position);
        self.view.clear_analysis();
        self.analysis = AnalysisState::Active {
            generation: ticket.generation(),
            position,
            ticket: Some(ticket),
        };
    }

    fn deactivate_analysis(&mut self) {
        if !self.analysis.is_active() {
            return;
        }
        if let Some(coordinator) = &self.coordinator {
            coordinator.stop();
        }
        self.analysis = AnalysisState::Inactive;
        self.view.clear_analysis();
    }

    /// Take the pending ticket so the caller can await it off the session.
    pub fn take_analysis_ticket(&mut self) -> Option<AnalysisTicket> {
        match &mut self.analysis {
            AnalysisState::Active { ticket, .. } => ticket.take(),
            AnalysisState::Inactive => None,
        }
    }

    /// Show a result if it belongs to the current request and the board has
    /// not moved on since. Returns what was shown.
    pub fn accept_analysis(&mut self, generation: u64, result: AnalysisResult) -> Option<AnalysisDisplay> {
        let AnalysisState::Active {
            generation: current,
            position,
            ..
        } = &self.analysis
        else {
            tracing::debug!("Dropping analysis result: analysis inactive");
            return None;
        };
        if *current != generation || *position != self.game.current_position() {
            tracing::debug!(
                "Dropping stale analysis result (generation {}, current {})",
                generation,
                current
            );
            return None;
        }

        let display = AnalysisDisplay::from_result(&result, position.side_to_move());
        if let Some(error) = &display.error {
            self.post_error(format!("Analysis failed: {}", error));
        }
        self.view.show_analysis(&display);
        Some(display)
    }

    /// Wait for the current request and show its result.
    pub async fn next_analysis(&mut self) -> Option<AnalysisDisplay> {
        let ticket = self.take_analysis_ticket()?;
        let generation = ticket.generation();
        let result = ticket.outcome().await?;
        self.accept_analysis(generation, result)
    }

    // ---- Favorites ----

    /// Save or unsave the current position under its source label. Returns
    /// whether it is now a favorite.
    pub fn toggle_favorite(&mut self) -> Result<bool, SessionError> {
        let position = self.game.current_position();
        let label = self.source_label(&position);

        let result = if self.favorites.is_favorite(&position, &label) {
            self.favorites.remove(&position, &label).map(|_| false)
        } else {
            self.favorites.add(&position, &label).map(|_| true)
        };

        match result {
            Ok(now_favorite) => {
                if now_favorite {
                    self.post_info(format!("Saved to favorites ({})", label));
                } else {
                    self.post_info("Removed from favorites");
                }
                self.refresh();
                Ok(now_favorite)
            }
            Err(e) => {
                self.post_error(format!("Could not update favorites: {}", e));
                Err(e.into())
            }
        }
    }

    fn source_label(&self, position: &Position) -> String {
        self.positions
            .label_for(position)
            .unwrap_or_else(|| MANUAL_LABEL.to_string())
    }

    // ---- Display ----

    fn game_state(&self) -> GameState {
        if self.game.is_checkmate() {
            GameState::Checkmate
        } else if self.game.is_stalemate() {
            GameState::Stalemate
        } else if self.game.is_draw() {
            GameState::Draw
        } else {
            GameState::Ongoing
        }
    }

    pub fn board_update(&self) -> BoardUpdate {
        let position = self.game.current_position();
        let is_favorite = self
            .favorites
            .is_favorite(&position, &self.source_label(&position));
        BoardUpdate {
            side_to_move: self.game.side_to_move(),
            destinations: self.game.legal_moves(),
            last_move: self.history.last_applied().map(|mv| LastMove {
                from: chess::format_square(mv.from),
                to: chess::format_square(mv.to),
                san: mv.san.clone(),
            }),
            nav: NavState {
                can_undo: self.history.can_undo(),
                can_redo: self.history.can_redo(),
                can_previous: self.positions.can_previous(),
                can_next: self.positions.can_next(),
                list_position: self
                    .positions
                    .cursor()
                    .map(|i| (i + 1, self.positions.len())),
                moves_played: self.history.applied_len(),
            },
            game_state: self.game_state(),
            is_favorite,
            status: self.status.current().cloned(),
            position,
        }
    }

    fn refresh(&mut self) {
        let update = self.board_update();
        self.view.render(&update);
    }

    fn post_info(&mut self, text: impl Into<String>) {
        let message = self.status.info(text);
        self.view.show_status(message);
    }

    fn post_error(&mut self, text: impl Into<String>) {
        let message = self.status.error(text);
        self.view.show_status(message);
    }

    // ---- Accessors ----

    pub fn position(&self) -> Position {
        self.game.current_position()
    }

    pub fn history(&self) -> &MoveHistory<AppliedMove> {
        &self.history
    }

    pub fn positions(&self) -> &PositionList {
        &self.positions
    }

    /// The status message still within its display interval.
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.current()
    }

    pub fn analysis_state(&self) -> &AnalysisState {
        &self.analysis
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Stop analysis and shut the engine down.
    pub async fn shutdown(mut self) {
        self.deactivate_analysis();
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.shutdown().await;
        }
        tracing::info!("Session closed");
    }
}
