//! A loaded list of candidate positions with a cursor.
//!
//! Entries are normalized but not validated on load. Stepping asks the caller
//! to load each candidate and walks past the ones that fail.

use chess::Position;

/// Where the current list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    /// Pasted or uploaded text, labelled by file name.
    File(String),
    /// Built from the favorites store.
    Favorites,
}

/// Label stored on favorites-derived entries so they keep their original source.
pub const FAVORITES_LABEL: &str = "favorites";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub position: Position,
    /// Per-entry source label; set for favorites-derived lists.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Landed on `index`, after passing `skipped` entries that failed to load.
    Loaded { index: usize, skipped: usize },
    /// Every candidate up to the boundary failed; the cursor did not move.
    NoValidEntry { skipped: usize },
    /// Nothing to step to.
    AtBoundary,
    /// Already at the requested entry.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("Position {requested} is out of range 1..={len}")]
    OutOfRange { requested: usize, len: usize },
    #[error("No position list loaded")]
    EmptyList,
}

/// Split text into normalized positions: one per non-blank line.
pub fn parse_position_list(text: &str) -> Vec<Position> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| Position::normalize(line).ok())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct PositionList {
    entries: Vec<ListEntry>,
    cursor: Option<usize>,
    source: Option<ListSource>,
}

impl PositionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list with the positions in `text`. Returns the entry count.
    pub fn load(&mut self, text: &str, source: ListSource) -> usize {
        let entries = parse_position_list(text)
            .into_iter()
            .map(|position| ListEntry {
                position,
                label: None,
            })
            .collect();
        self.load_entries(entries, source)
    }

    /// Replace the list with prepared entries. Returns the entry count.
    pub fn load_entries(&mut self, entries: Vec<ListEntry>, source: ListSource) -> usize {
        self.entries = entries;
        self.cursor = if self.entries.is_empty() { None } else { Some(0) };
        tracing::info!("Loaded {} positions from {:?}", self.entries.len(), source);
        self.source = Some(source);
        self.entries.len()
    }

    /// Step one entry in `direction`, continuing past entries `try_load`
    /// rejects until one loads or the boundary is reached.
    pub fn step<E: std::fmt::Display>(
        &mut self,
        direction: Direction,
        mut try_load: impl FnMut(&Position) -> Result<(), E>,
    ) -> StepOutcome {
        let Some(mut index) = self.cursor else {
            return StepOutcome::AtBoundary;
        };
        let mut skipped = 0;

        loop {
            index = match direction {
                Direction::Forward if index + 1 < self.entries.len() => index + 1,
                Direction::Backward if index > 0 => index - 1,
                _ => break,
            };
            match try_load(&self.entries[index].position) {
                Ok(()) => {
                    self.cursor = Some(index);
                    return StepOutcome::Loaded { index, skipped };
                }
                Err(e) => {
                    tracing::debug!("Skipping invalid position #{}: {}", index + 1, e);
                    skipped += 1;
                }
            }
        }

        if skipped == 0 {
            StepOutcome::AtBoundary
        } else {
            StepOutcome::NoValidEntry { skipped }
        }
    }

    pub fn next<E: std::fmt::Display>(
        &mut self,
        try_load: impl FnMut(&Position) -> Result<(), E>,
    ) -> StepOutcome {
        self.step(Direction::Forward, try_load)
    }

    pub fn previous<E: std::fmt::Display>(
        &mut self,
        try_load: impl FnMut(&Position) -> Result<(), E>,
    ) -> StepOutcome {
        self.step(Direction::Backward, try_load)
    }

    /// Jump to a 1-based entry. An entry that fails to load is skipped
    /// forward only, never backward.
    pub fn jump_to<E: std::fmt::Display>(
        &mut self,
        one_based: usize,
        try_load: impl FnMut(&Position) -> Result<(), E>,
    ) -> Result<StepOutcome, NavigationError> {
        let len = self.entries.len();
        if len == 0 {
            return Err(NavigationError::EmptyList);
        }
        if !(1..=len).contains(&one_based) {
            return Err(NavigationError::OutOfRange {
                requested: one_based,
                len,
            });
        }

        let target = one_based - 1;
        let before = self.cursor;
        if before == Some(target) {
            return Ok(StepOutcome::Unchanged);
        }
        // Skipping forward can land back on the entry already shown
        match self.scan_forward(target, try_load) {
            StepOutcome::Loaded { index, .. } if before == Some(index) => Ok(StepOutcome::Unchanged),
            outcome => Ok(outcome),
        }
    }

    /// Load the entry under the cursor, skipping forward on failure. Used right
    /// after a list is loaded.
    pub fn load_current<E: std::fmt::Display>(
        &mut self,
        try_load: impl FnMut(&Position) -> Result<(), E>,
    ) -> StepOutcome {
        match self.cursor {
            Some(index) => self.scan_forward(index, try_load),
            None => StepOutcome::AtBoundary,
        }
    }

    fn scan_forward<E: std::fmt::Display>(
        &mut self,
        start: usize,
        mut try_load: impl FnMut(&Position) -> Result<(), E>,
    ) -> StepOutcome {
        let mut skipped = 0;
        for index in start..self.entries.len() {
            match try_load(&self.entries[index].position) {
                Ok(()) => {
                    self.cursor = Some(index);
                    return StepOutcome::Loaded { index, skipped };
                }
                Err(e) => {
                    tracing::debug!("Skipping invalid position #{}: {}", index + 1, e);
                    skipped += 1;
                }
            }
        }
        StepOutcome::NoValidEntry { skipped }
    }

    /// Point the cursor at the first entry matching any of `candidates`.
    pub fn sync_cursor(&mut self, candidates: &[&Position]) -> bool {
        let found = self
            .entries
            .iter()
            .position(|e| candidates.contains(&&e.position));
        match found {
            Some(index) => {
                self.cursor = Some(index);
                true
            }
            None => false,
        }
    }

    /// Replace the cursor entry's position with the form the board reports
    /// for it, so later comparisons against the board match.
    pub fn settle_current(&mut self, shown: Position) {
        let Some(entry) = self.cursor.and_then(|i| self.entries.get_mut(i)) else {
            return;
        };
        if entry.position != shown {
            tracing::debug!("List entry {} shown as {}", entry.position, shown);
            entry.position = shown;
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&ListEntry> {
        self.cursor.and_then(|i| self.entries.get(i))
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn source(&self) -> Option<&ListSource> {
        self.source.as_ref()
    }

    /// Source label for a position shown from this list: the entry's own label
    /// if it has one, else the list's file name.
    pub fn label_for(&self, position: &Position) -> Option<String> {
        let entry = self.current().filter(|e| &e.position == position)?;
        if let Some(label) = &entry.label {
            return Some(label.clone());
        }
        match self.source.as_ref()? {
            ListSource::File(name) => Some(name.clone()),
            ListSource::Favorites => Some(FAVORITES_LABEL.to_string()),
        }
    }

    pub fn can_previous(&self) -> bool {
        matches!(self.cursor, Some(i) if i > 0)
    }

    pub fn can_next(&self) -> bool {
        matches!(self.cursor, Some(i) if i + 1 < self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_A: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const VALID_B: &str = "4k3/8/8/8/8/8/8/4K3 w - - 0 1";
    const INVALID: &str = "8/8/8/8/8/8/8/8 w - - 0 1";

    /// Accepts anything but the kingless board.
    fn loader(position: &Position) -> Result<(), String> {
        if position.placement() == "8/8/8/8/8/8/8/8" {
            Err("no kings".to_string())
        } else {
            Ok(())
        }
    }

    fn list(lines: &[&str]) -> PositionList {
        let mut list = PositionList::new();
        list.load(&lines.join("\n"), ListSource::File("test.fen".to_string()));
        list
    }

    #[test]
    fn test_parse_handles_crlf_and_blanks() {
        let text = "8/8/8/8/8/8/8/8\r\n\r\n   \n4k3/8/8/8/8/8/8/4K3 b\r\n";
        let positions = parse_position_list(text);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].as_str(), "8/8/8/8/8/8/8/8 w - - 0 1");
        assert_eq!(positions[1].as_str(), "4k3/8/8/8/8/8/8/4K3 b - - 0 1");
    }

    #[test]
    fn test_load_sets_cursor() {
        let l = list(&[VALID_A, VALID_B]);
        assert_eq!(l.cursor(), Some(0));
        assert_eq!(l.len(), 2);

        let mut empty = PositionList::new();
        assert_eq!(empty.load("\n\n", ListSource::File("x".to_string())), 0);
        assert_eq!(empty.cursor(), None);
    }

    #[test]
    fn test_next_skips_invalid_entries() {
        let mut l = list(&[VALID_A, INVALID, INVALID, VALID_B]);
        let outcome = l.next(loader);
        assert_eq!(outcome, StepOutcome::Loaded { index: 3, skipped: 2 });
        assert_eq!(l.cursor(), Some(3));
    }

    #[test]
    fn test_previous_skips_backward() {
        let mut l = list(&[VALID_A, INVALID, VALID_B]);
        l.jump_to(3, loader).unwrap();
        let outcome = l.previous(loader);
        assert_eq!(outcome, StepOutcome::Loaded { index: 0, skipped: 1 });
    }

    #[test]
    fn test_no_valid_entry_keeps_cursor() {
        let mut l = list(&[VALID_A, INVALID, INVALID]);
        assert_eq!(l.next(loader), StepOutcome::NoValidEntry { skipped: 2 });
        assert_eq!(l.cursor(), Some(0));
    }

    #[test]
    fn test_boundaries() {
        let mut l = list(&[VALID_A, VALID_B]);
        assert_eq!(l.previous(loader), StepOutcome::AtBoundary);
        assert!(!l.can_previous());
        assert!(l.can_next());

        assert_eq!(l.next(loader), StepOutcome::Loaded { index: 1, skipped: 0 });
        assert_eq!(l.next(loader), StepOutcome::AtBoundary);
        assert!(!l.can_next());

        let mut empty = PositionList::new();
        assert_eq!(empty.next(loader), StepOutcome::AtBoundary);
    }

    #[test]
    fn test_jump_validates_range() {
        let mut l = list(&[VALID_A, VALID_B]);
        assert_eq!(
            l.jump_to(0, loader),
            Err(NavigationError::OutOfRange { requested: 0, len: 2 })
        );
        assert_eq!(
            l.jump_to(3, loader),
            Err(NavigationError::OutOfRange { requested: 3, len: 2 })
        );
        assert_eq!(l.jump_to(1, loader), Ok(StepOutcome::Unchanged));
        assert_eq!(
            PositionList::new().jump_to(1, loader),
            Err(NavigationError::EmptyList)
        );
    }

    #[test]
    fn test_jump_skips_forward_only() {
        let mut l = list(&[VALID_A, VALID_B, INVALID, VALID_A]);
        assert_eq!(
            l.jump_to(3, loader),
            Ok(StepOutcome::Loaded { index: 3, skipped: 1 })
        );

        let mut l = list(&[VALID_A, VALID_B, INVALID]);
        assert_eq!(
            l.jump_to(3, loader),
            Ok(StepOutcome::NoValidEntry { skipped: 1 })
        );
        assert_eq!(l.cursor(), Some(0));
    }

    #[test]
    fn test_load_current_skips_leading_invalid() {
        let mut l = list(&[INVALID, VALID_B]);
        assert_eq!(l.load_current(loader), StepOutcome::Loaded { index: 1, skipped: 1 });
    }

    #[test]
    fn test_sync_cursor_and_labels() {
        let mut l = list(&[VALID_A, VALID_B]);
        let b = Position::normalize(VALID_B).unwrap();
        assert!(l.sync_cursor(&[&b]));
        assert_eq!(l.cursor(), Some(1));
        assert_eq!(l.label_for(&b), Some("test.fen".to_string()));
        assert_eq!(l.label_for(&Position::starting()), None);

        let entries = vec![ListEntry {
            position: b.clone(),
            label: Some("endgames.fen".to_string()),
        }];
        l.load_entries(entries, ListSource::Favorites);
        assert_eq!(l.label_for(&b), Some("endgames.fen".to_string()));
        assert!(!l.sync_cursor(&[&Position::starting()]));
    }

    #[test]
    fn test_jump_that_skips_back_onto_cursor_is_unchanged() {
        let mut l = list(&[VALID_A, VALID_B, INVALID, VALID_A]);
        l.jump_to(4, loader).unwrap();
        assert_eq!(l.jump_to(3, loader), Ok(StepOutcome::Unchanged));
        assert_eq!(l.cursor(), Some(3));
    }

    #[test]
    fn test_settle_current_rewrites_cursor_entry() {
        let mut l = list(&["r3k2r/8/8/8/8/8/8/R3K2R w QKqk - 0 1", VALID_B]);
        let canonical = Position::normalize("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(l.label_for(&canonical), None);

        l.settle_current(canonical.clone());
        assert_eq!(l.entries()[0].position, canonical);
        assert_eq!(l.label_for(&canonical), Some("test.fen".to_string()));
        assert_eq!(l.entries()[1].position.as_str(), VALID_B);
    }
}
