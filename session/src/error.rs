use chess::PositionError;

use crate::favorites::StorageError;
use crate::navigator::NavigationError;

/// Errors surfaced by [`Session`](crate::Session) operations.
///
/// None of these leave the session in a half-updated state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Malformed position: {0}")]
    MalformedPosition(#[from] PositionError),
    #[error("Position rejected: {0}")]
    Rejected(String),
    #[error("Illegal move: {from}{to}")]
    IllegalMove { from: String, to: String },
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Nothing to redo")]
    NothingToRedo,
    #[error("Analysis unavailable: {0}")]
    AnalysisUnavailable(String),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("Favorites storage failed: {0}")]
    Storage(#[from] StorageError),
}
