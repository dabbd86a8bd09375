//! Session layer for the analyzer: move history, position-list navigation,
//! favorites, and the orchestrator tying them to the rules engine, the board
//! widget, and the analysis coordinator.

pub mod config;
pub mod error;
pub mod favorites;
pub mod history;
pub mod navigator;
pub mod session;
pub mod status;
pub mod view;

pub use config::AnalyzerConfig;
pub use error::SessionError;
pub use favorites::{BlobStorage, Favorite, FavoritesStore, FileBlobStorage, StorageError};
pub use history::MoveHistory;
pub use navigator::{
    parse_position_list, Direction, ListEntry, ListSource, NavigationError, PositionList,
    StepOutcome,
};
pub use session::{AnalysisState, Session, SessionConfig, MANUAL_LABEL};
pub use status::{StatusKind, StatusLine, StatusMessage};
pub use view::{
    AnalysisDisplay, Arrow, BoardUpdate, BoardView, GameState, LastMove, NavState, TopMove,
};
