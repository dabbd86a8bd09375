//! Stockfish worker process: spawning, output reader, gated input writer.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::ChildStdout;
use tokio::sync::{mpsc, watch};

use crate::uci::{parse_engine_line, EngineLine};
use crate::{EngineLink, EngineStartupError, WorkerMessage};

/// How to find the engine binary.
#[derive(Debug, Clone, Default)]
pub struct StockfishConfig {
    /// Explicit binary path. Falls back to searching common locations.
    pub path: Option<PathBuf>,
}

/// Holds commands back until the engine has acknowledged the handshake.
///
/// The handshake itself (`uci`) always passes. Everything else submitted before
/// [`ReadyGate::open`] is queued and released in submission order.
#[derive(Debug, Default)]
pub struct ReadyGate {
    open: bool,
    queued: VecDeque<String>,
}

impl ReadyGate {
    /// Returns the commands that may be written right now.
    pub fn submit(&mut self, command: String) -> Vec<String> {
        if self.open || command.trim() == "uci" {
            return vec![command];
        }
        tracing::trace!("Queueing until engine is ready: {}", command);
        self.queued.push_back(command);
        Vec::new()
    }

    /// Mark the engine ready and release everything queued.
    pub fn open(&mut self) -> Vec<String> {
        self.open = true;
        self.queued.drain(..).collect()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }
}

/// Spawn a Stockfish process and wire it to an [`EngineLink`].
///
/// No protocol traffic happens here; the coordinator drives the handshake.
#[tracing::instrument(level = "info")]
pub fn spawn_worker(config: &StockfishConfig) -> Result<EngineLink, EngineStartupError> {
    let path = match &config.path {
        Some(path) => path.clone(),
        None => find_stockfish_path().ok_or(EngineStartupError::NotFound)?,
    };
    tracing::info!("Found Stockfish at: {:?}", path);

    let mut process = tokio::process::Command::new(&path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            tracing::error!("Failed to spawn Stockfish: {}", e);
            EngineStartupError::Spawn(e)
        })?;

    let stdin = process.stdin.take().ok_or(EngineStartupError::NoStdin)?;
    let stdout = process.stdout.take().ok_or(EngineStartupError::NoStdout)?;

    let (command_tx, command_rx) = mpsc::channel::<String>(32);
    let (message_tx, message_rx) = mpsc::channel::<WorkerMessage>(256);
    let (ready_tx, ready_rx) = watch::channel(false);

    tokio::spawn(read_engine_output(stdout, message_tx, ready_tx));
    tokio::spawn(write_engine_input(stdin, command_rx, ready_rx));

    tracing::debug!("Stockfish process spawned");
    Ok(EngineLink::from_channels(command_tx, message_rx).with_process(process))
}

async fn read_engine_output(
    stdout: ChildStdout,
    messages: mpsc::Sender<WorkerMessage>,
    ready: watch::Sender<bool>,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    loop {
        line.clear();
        let message = match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::warn!("Stockfish stdout EOF - engine closed");
                WorkerMessage::Fault("engine process exited".to_string())
            }
            Ok(_) => {
                let trimmed = line.trim();
                tracing::trace!("UCI << {}", trimmed);
                if parse_engine_line(trimmed) == EngineLine::UciOk {
                    let _ = ready.send(true);
                }
                WorkerMessage::Line(trimmed.to_string())
            }
            Err(e) => {
                tracing::error!("Error reading from Stockfish stdout: {}", e);
                WorkerMessage::Fault(format!("failed to read engine output: {}", e))
            }
        };

        let fault = matches!(message, WorkerMessage::Fault(_));
        if messages.send(message).await.is_err() {
            tracing::debug!("Coordinator dropped, stopping reader");
            break;
        }
        if fault {
            break;
        }
    }
    tracing::info!("Output reader task exiting");
}

enum WriterEvent {
    Command(Option<String>),
    ReadyChanged(bool),
}

async fn write_engine_input<W: AsyncWrite + Unpin>(
    mut stdin: W,
    mut commands: mpsc::Receiver<String>,
    mut ready: watch::Receiver<bool>,
) {
    let mut gate = ReadyGate::default();

    loop {
        let event = tokio::select! {
            cmd = commands.recv() => WriterEvent::Command(cmd),
            changed = ready.changed(), if !gate.is_open() => WriterEvent::ReadyChanged(changed.is_ok()),
        };

        let batch = match event {
            WriterEvent::Command(Some(cmd)) => gate.submit(cmd),
            WriterEvent::Command(None) => break,
            WriterEvent::ReadyChanged(true) if !*ready.borrow() => continue,
            WriterEvent::ReadyChanged(reader_alive) => {
                if reader_alive {
                    tracing::debug!("Engine ready, flushing {} queued commands", gate.queued_len());
                }
                // A vanished reader also opens the gate; writes then fail on their own
                gate.open()
            }
        };

        for cmd in batch {
            tracing::trace!("UCI >> {}", cmd);
            let written = async {
                stdin.write_all(cmd.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.flush().await
            };
            if let Err(e) = written.await {
                tracing::error!("Failed to write to stdin: {}", e);
                return;
            }
        }
    }
    tracing::info!("Stdin writer task exiting");
}

/// Find Stockfish executable in common locations
fn find_stockfish_path() -> Option<PathBuf> {
    const CANDIDATES: [&str; 4] = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    if let Some(found) = CANDIDATES.iter().map(Path::new).find(|p| p.exists()) {
        return Some(found.to_path_buf());
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join("stockfish"))
            .find(|candidate| candidate.is_file())
    })
}
