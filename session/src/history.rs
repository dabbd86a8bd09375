//! Linear move history with a cursor.
//!
//! Only bookkeeping lives here. Replaying or taking back a move on the board
//! is the session's job.

/// Applied moves plus a cursor. `applied` counts the moves currently on the
/// board, so the cursor index is `applied - 1` and "no moves applied" is 0.
#[derive(Debug, Clone)]
pub struct MoveHistory<M> {
    moves: Vec<M>,
    applied: usize,
}

impl<M> MoveHistory<M> {
    pub fn new() -> Self {
        Self {
            moves: Vec::new(),
            applied: 0,
        }
    }

    /// Append a move, discarding any redo tail first.
    pub fn apply(&mut self, mv: M) {
        if self.applied < self.moves.len() {
            tracing::debug!(
                "Discarding {} redoable moves",
                self.moves.len() - self.applied
            );
        }
        self.moves.truncate(self.applied);
        self.moves.push(mv);
        self.applied += 1;
    }

    /// Step the cursor back. Returns the move that is no longer applied.
    pub fn undo(&mut self) -> Option<&M> {
        if !self.can_undo() {
            return None;
        }
        self.applied -= 1;
        self.moves.get(self.applied)
    }

    /// The move `redo` would re-apply.
    pub fn peek_redo(&self) -> Option<&M> {
        self.moves.get(self.applied)
    }

    /// Step the cursor forward. Returns the move to re-apply.
    pub fn redo(&mut self) -> Option<&M> {
        if !self.can_redo() {
            return None;
        }
        self.applied += 1;
        self.moves.get(self.applied - 1)
    }

    /// Undo everything. Returns how many moves were taken back.
    pub fn jump_to_start(&mut self) -> usize {
        let mut steps = 0;
        while self.undo().is_some() {
            steps += 1;
        }
        steps
    }

    /// Redo everything. Returns how many moves were re-applied.
    pub fn jump_to_end(&mut self) -> usize {
        let mut steps = 0;
        while self.redo().is_some() {
            steps += 1;
        }
        steps
    }

    pub fn reset(&mut self) {
        self.moves.clear();
        self.applied = 0;
    }

    /// Cursor index, `None` at the starting position.
    pub fn index(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    pub fn applied_len(&self) -> usize {
        self.applied
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.moves.len()
    }

    /// Every recorded move, including the redo tail.
    pub fn moves(&self) -> &[M] {
        &self.moves
    }

    /// Moves currently on the board.
    pub fn applied_moves(&self) -> &[M] {
        &self.moves[..self.applied]
    }

    pub fn last_applied(&self) -> Option<&M> {
        self.index().and_then(|i| self.moves.get(i))
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

impl<M> Default for MoveHistory<M> {
    fn default() -> Self {
        Self::new()
    }
}
