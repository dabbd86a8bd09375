pub mod coordinator;
pub mod stockfish;
pub mod uci;

pub use coordinator::{AnalysisCoordinator, AnalysisTicket};
pub use stockfish::{spawn_worker, ReadyGate, StockfishConfig};
pub use uci::{
    parse_engine_line, AnalysisAggregate, AnalysisResult, EngineLine, PrincipalVariation,
    ProgressUpdate, SearchStats,
};

use std::time::Duration;
use tokio::process::Child;
use tokio::sync::mpsc;

/// Default number of principal variations requested from the engine.
pub const DEFAULT_MULTIPV: usize = 3;

/// Message from the worker's output side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// One line of engine output, trimmed.
    Line(String),
    /// The worker can no longer produce output (process exit, read error).
    Fault(String),
}

/// Channel pair connecting the coordinator to an engine worker.
///
/// Commands are single protocol lines without the trailing newline. Anything
/// that speaks these two channels can stand in for a real process.
pub struct EngineLink {
    pub commands: mpsc::Sender<String>,
    pub messages: mpsc::Receiver<WorkerMessage>,
    process: Option<Child>,
}

impl EngineLink {
    pub fn from_channels(
        commands: mpsc::Sender<String>,
        messages: mpsc::Receiver<WorkerMessage>,
    ) -> Self {
        Self {
            commands,
            messages,
            process: None,
        }
    }

    pub(crate) fn with_process(mut self, process: Child) -> Self {
        self.process = Some(process);
        self
    }
}

/// Engine settings applied during initialization.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub multipv: usize,
    pub threads: u32,
    pub ready_timeout: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            multipv: DEFAULT_MULTIPV,
            threads: 1,
            ready_timeout: Duration::from_secs(10),
        }
    }
}

/// The engine could not be brought up. Analysis is unavailable afterwards.
#[derive(Debug, thiserror::Error)]
pub enum EngineStartupError {
    #[error("Stockfish not found")]
    NotFound,
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Engine has no stdin")]
    NoStdin,
    #[error("Engine has no stdout")]
    NoStdout,
    #[error("Engine worker closed during startup")]
    WorkerClosed,
    #[error("Engine worker failed during startup: {0}")]
    WorkerFault(String),
    #[error("Engine did not report ready within {0:?}")]
    Timeout(Duration),
}
