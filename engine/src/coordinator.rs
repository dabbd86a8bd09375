//! Analysis coordinator: one long-lived engine, one current request.
//!
//! The coordinator is an actor. The public [`AnalysisCoordinator`] handle only
//! enqueues commands; the actor task owns the aggregate, the pending request,
//! and the worker link, and processes commands and engine output sequentially.
//!
//! Stale output is ignored by attribution. Every `go` starts a numbered search
//! and every `bestmove` finishes the oldest unfinished one, so each inbound
//! line can be tied to the search that produced it. Only lines belonging to the
//! search started by the current request ever reach the aggregate.

use std::time::Duration;

use chess::Position;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::uci::{parse_engine_line, AnalysisAggregate, AnalysisResult, EngineLine};
use crate::{AnalysisOptions, EngineLink, EngineStartupError, WorkerMessage};

/// Handle to an analysis request.
///
/// Resolves with the request's result, or `None` if the request was superseded
/// by a later `analyze`, cancelled by `stop`, or finished without any
/// principal variation.
#[derive(Debug)]
pub struct AnalysisTicket {
    generation: u64,
    rx: oneshot::Receiver<AnalysisResult>,
}

impl AnalysisTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn outcome(self) -> Option<AnalysisResult> {
        self.rx.await.ok()
    }
}

enum CoordinatorCommand {
    Analyze {
        position: Position,
        depth: u8,
        generation: u64,
        reply: oneshot::Sender<AnalysisResult>,
    },
    Stop,
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Owner-side handle to the coordinator actor.
pub struct AnalysisCoordinator {
    cmd_tx: mpsc::UnboundedSender<CoordinatorCommand>,
    generation: u64,
    actor: JoinHandle<()>,
    process: Option<Child>,
}

impl AnalysisCoordinator {
    /// Handshake with the worker and start the actor.
    ///
    /// Sends `uci`, the MultiPV and Threads options, then `isready`, and waits
    /// for `readyok` within `options.ready_timeout`.
    pub async fn initialize(
        mut link: EngineLink,
        options: &AnalysisOptions,
    ) -> Result<Self, EngineStartupError> {
        tracing::info!("Initializing analysis engine (options: {:?})", options);

        let setup = [
            "uci".to_string(),
            format!("setoption name MultiPV value {}", options.multipv),
            format!("setoption name Threads value {}", options.threads),
            "isready".to_string(),
        ];
        for cmd in setup {
            link.commands
                .send(cmd)
                .await
                .map_err(|_| EngineStartupError::WorkerClosed)?;
        }

        match tokio::time::timeout(options.ready_timeout, wait_for_ready(&mut link.messages)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Engine initialization failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                tracing::error!("Timeout waiting for readyok");
                return Err(EngineStartupError::Timeout(options.ready_timeout));
            }
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state = CoordinatorState::new(link.commands, options.multipv);
        let actor = tokio::spawn(
            run_coordinator(state, cmd_rx, link.messages)
                .instrument(tracing::info_span!("analysis_coordinator")),
        );

        tracing::info!("Analysis engine ready");
        Ok(Self {
            cmd_tx,
            generation: 0,
            actor,
            process: link.process,
        })
    }

    /// Start analyzing `position` to `depth`, superseding any current request.
    pub fn analyze(&mut self, position: &Position, depth: u8) -> AnalysisTicket {
        self.generation += 1;
        let (reply, rx) = oneshot::channel();
        let sent = self.cmd_tx.send(CoordinatorCommand::Analyze {
            position: position.clone(),
            depth,
            generation: self.generation,
            reply,
        });
        if let Err(mpsc::error::SendError(CoordinatorCommand::Analyze { reply, .. })) = sent {
            tracing::warn!("Analysis coordinator is not running");
            let _ = reply.send(AnalysisResult::failed("analysis coordinator is not running"));
        }
        AnalysisTicket {
            generation: self.generation,
            rx,
        }
    }

    /// Drop the current request and ask the engine to stop searching.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(CoordinatorCommand::Stop);
    }

    /// Send `quit`, stop the actor, and reap the engine process.
    pub async fn shutdown(mut self) {
        let (done, done_rx) = oneshot::channel();
        if self.cmd_tx.send(CoordinatorCommand::Shutdown { done }).is_ok() {
            let _ = done_rx.await;
        }
        let _ = self.actor.await;

        if let Some(mut process) = self.process.take() {
            if tokio::time::timeout(Duration::from_secs(1), process.wait())
                .await
                .is_err()
            {
                tracing::warn!("Engine did not exit after quit, killing it");
                let _ = process.kill().await;
            }
        }
    }
}

async fn wait_for_ready(
    messages: &mut mpsc::Receiver<WorkerMessage>,
) -> Result<(), EngineStartupError> {
    while let Some(message) = messages.recv().await {
        match message {
            WorkerMessage::Line(line) => match parse_engine_line(&line) {
                EngineLine::ReadyOk => return Ok(()),
                EngineLine::UciOk => tracing::debug!("Received uciok"),
                _ => tracing::trace!("Startup output: {}", line),
            },
            WorkerMessage::Fault(reason) => return Err(EngineStartupError::WorkerFault(reason)),
        }
    }
    Err(EngineStartupError::WorkerClosed)
}

/// The request currently allowed to receive a result.
struct PendingAnalysis {
    generation: u64,
    /// Search number this request started.
    search: u64,
    reply: oneshot::Sender<AnalysisResult>,
}

/// Actor-owned state. No locks.
struct CoordinatorState {
    commands: mpsc::Sender<String>,
    aggregate: AnalysisAggregate,
    pending: Option<PendingAnalysis>,
    searches_started: u64,
    searches_finished: u64,
    worker_alive: bool,
}

impl CoordinatorState {
    fn new(commands: mpsc::Sender<String>, width: usize) -> Self {
        Self {
            commands,
            aggregate: AnalysisAggregate::new(width),
            pending: None,
            searches_started: 0,
            searches_finished: 0,
            worker_alive: true,
        }
    }

    fn search_in_flight(&self) -> bool {
        self.searches_started > self.searches_finished
    }

    /// The search currently producing output, if any.
    fn streaming_search(&self) -> Option<u64> {
        self.search_in_flight().then_some(self.searches_finished + 1)
    }

    async fn send(&mut self, cmd: String) -> Result<(), String> {
        tracing::debug!("Engine command: {}", cmd);
        self.commands
            .send(cmd)
            .await
            .map_err(|_| "engine worker is not accepting commands".to_string())
    }

    async fn analyze(
        &mut self,
        position: Position,
        depth: u8,
        generation: u64,
        reply: oneshot::Sender<AnalysisResult>,
    ) {
        if let Some(previous) = self.pending.take() {
            tracing::debug!("Generation {} superseded by {}", previous.generation, generation);
        }
        self.aggregate.reset();

        if !self.worker_alive {
            let _ = reply.send(AnalysisResult::failed("engine worker is not running"));
            return;
        }

        let mut sent = Ok(());
        if self.search_in_flight() {
            sent = self.send("stop".to_string()).await;
        }
        if sent.is_ok() {
            sent = self.send(format!("position fen {}", position)).await;
        }
        if sent.is_ok() {
            sent = self.send(format!("go depth {}", depth)).await;
        }

        if let Err(reason) = sent {
            tracing::warn!("Failed to start analysis: {}", reason);
            let _ = reply.send(AnalysisResult::failed(reason));
            return;
        }

        self.searches_started += 1;
        tracing::info!(
            "Analyzing generation {} (search {}) to depth {}",
            generation,
            self.searches_started,
            depth
        );
        self.pending = Some(PendingAnalysis {
            generation,
            search: self.searches_started,
            reply,
        });
    }

    async fn stop(&mut self) {
        if let Some(previous) = self.pending.take() {
            tracing::debug!("Generation {} cancelled", previous.generation);
        }
        self.aggregate.reset();
        if self.search_in_flight() && self.worker_alive {
            let _ = self.send("stop".to_string()).await;
        }
    }

    fn on_line(&mut self, line: &str) {
        match parse_engine_line(line) {
            EngineLine::Progress(update) => {
                let current = self.pending.as_ref().map(|p| p.search);
                if current.is_some() && current == self.streaming_search() {
                    self.aggregate.apply(update);
                } else {
                    tracing::trace!("Ignoring progress from superseded search");
                }
            }
            EngineLine::Completion => self.on_completion(),
            _ => tracing::trace!("Unhandled engine output: {}", line),
        }
    }

    fn on_completion(&mut self) {
        if !self.search_in_flight() {
            tracing::debug!("Completion with no search in flight");
            return;
        }
        self.searches_finished += 1;
        let finished = self.searches_finished;

        let belongs_to_pending = matches!(&self.pending, Some(p) if p.search == finished);
        if !belongs_to_pending {
            tracing::debug!("Dropping completion of superseded search {}", finished);
            return;
        }

        let Some(pending) = self.pending.take() else {
            return;
        };
        match self.aggregate.flush() {
            Some(result) => {
                tracing::info!(
                    "Generation {} complete at depth {:?} with {} lines",
                    pending.generation,
                    result.depth,
                    result.lines.len()
                );
                let _ = pending.reply.send(result);
            }
            None => {
                tracing::debug!(
                    "Generation {} finished without principal variations",
                    pending.generation
                );
            }
        }
    }

    fn on_fault(&mut self, reason: String) {
        tracing::warn!("Engine worker fault: {}", reason);
        self.worker_alive = false;
        self.searches_finished = self.searches_started;
        self.aggregate.reset();
        if let Some(pending) = self.pending.take() {
            let _ = pending.reply.send(AnalysisResult::failed(reason));
        }
    }
}

async fn run_coordinator(
    mut state: CoordinatorState,
    mut cmd_rx: mpsc::UnboundedReceiver<CoordinatorCommand>,
    mut messages: mpsc::Receiver<WorkerMessage>,
) {
    tracing::info!("Coordinator actor started");

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(CoordinatorCommand::Analyze { position, depth, generation, reply }) => {
                    state.analyze(position, depth, generation, reply).await;
                }
                Some(CoordinatorCommand::Stop) => state.stop().await,
                Some(CoordinatorCommand::Shutdown { done }) => {
                    state.pending = None;
                    if state.worker_alive {
                        let _ = state.send("quit".to_string()).await;
                    }
                    let _ = done.send(());
                    break;
                }
                None => {
                    tracing::info!("Coordinator handle dropped");
                    break;
                }
            },

            message = messages.recv(), if state.worker_alive => match message {
                Some(WorkerMessage::Line(line)) => state.on_line(&line),
                Some(WorkerMessage::Fault(reason)) => state.on_fault(reason),
                None => state.on_fault("engine worker closed".to_string()),
            },
        }
    }

    tracing::info!("Coordinator actor exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeWorker {
        sent: mpsc::Receiver<String>,
        lines: mpsc::Sender<WorkerMessage>,
    }

    impl FakeWorker {
        async fn say(&self, line: &str) {
            self.lines
                .send(WorkerMessage::Line(line.to_string()))
                .await
                .unwrap();
        }

        fn drain_sent(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(cmd) = self.sent.try_recv() {
                out.push(cmd);
            }
            out
        }
    }

    fn fake_link() -> (EngineLink, FakeWorker) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (msg_tx, msg_rx) = mpsc::channel(64);
        (
            EngineLink::from_channels(cmd_tx, msg_rx),
            FakeWorker {
                sent: cmd_rx,
                lines: msg_tx,
            },
        )
    }

    fn options() -> AnalysisOptions {
        AnalysisOptions {
            multipv: 3,
            threads: 2,
            ready_timeout: Duration::from_millis(200),
        }
    }

    async fn ready_coordinator() -> (AnalysisCoordinator, FakeWorker) {
        let (link, mut worker) = fake_link();
        worker.say("id name FakeFish").await;
        worker.say("uciok").await;
        worker.say("readyok").await;
        let coordinator = AnalysisCoordinator::initialize(link, &options())
            .await
            .unwrap();
        worker.drain_sent();
        (coordinator, worker)
    }

    /// Let the actor drain everything queued so far.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_initialize_sends_handshake_and_options() {
        let (link, mut worker) = fake_link();
        worker.say("uciok").await;
        worker.say("readyok").await;

        let _coordinator = AnalysisCoordinator::initialize(link, &options())
            .await
            .unwrap();

        assert_eq!(
            worker.drain_sent(),
            [
                "uci",
                "setoption name MultiPV value 3",
                "setoption name Threads value 2",
                "isready"
            ]
        );
    }

    #[tokio::test]
    async fn test_initialize_times_out_without_readyok() {
        let (link, worker) = fake_link();
        worker.say("uciok").await;

        let result = AnalysisCoordinator::initialize(link, &options()).await;
        assert!(matches!(result, Err(EngineStartupError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_initialize_fails_when_worker_closes() {
        let (link, worker) = fake_link();
        drop(worker);

        let result = AnalysisCoordinator::initialize(link, &options()).await;
        assert!(matches!(result, Err(EngineStartupError::WorkerClosed)));
    }

    #[tokio::test]
    async fn test_analyze_sends_position_then_go() {
        let (mut coordinator, mut worker) = ready_coordinator().await;
        let position = Position::starting();

        let ticket = coordinator.analyze(&position, 12);
        assert_eq!(ticket.generation(), 1);
        settle().await;

        assert_eq!(
            worker.drain_sent(),
            [format!("position fen {}", position), "go depth 12".to_string()]
        );
    }

    #[tokio::test]
    async fn test_result_delivered_on_bestmove() {
        let (mut coordinator, worker) = ready_coordinator().await;
        let ticket = coordinator.analyze(&Position::starting(), 10);
        settle().await;

        worker.say("info depth 9 multipv 2 score cp 20 pv d2d4 d7d5").await;
        worker.say("info depth 10 multipv 1 score cp 31 pv e2e4 e7e5").await;
        worker.say("info depth 10 multipv 3 score cp 12 pv g1f3").await;
        worker.say("bestmove e2e4 ponder e7e5").await;

        let result = ticket.outcome().await.unwrap();
        assert_eq!(result.depth, Some(10));
        assert_eq!(result.centipawns(), Some(31));
        assert_eq!(result.lines.len(), 3);
        assert_eq!(chess::format_uci_move(result.best_move().unwrap()), "e2e4");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_second_analyze_supersedes_first() {
        let (mut coordinator, mut worker) = ready_coordinator().await;
        let first = coordinator.analyze(&Position::starting(), 8);
        let second = coordinator.analyze(&Position::starting(), 8);
        settle().await;

        let sent = worker.drain_sent();
        assert_eq!(sent.iter().filter(|c| c.starts_with("go depth")).count(), 2);
        assert_eq!(sent[2], "stop");

        // Output of the first search, finishing late
        worker.say("info depth 8 score cp 99 pv a2a3").await;
        worker.say("bestmove a2a3").await;
        // Output of the second search
        worker.say("info depth 8 score cp 15 pv e2e4").await;
        worker.say("bestmove e2e4").await;

        assert!(first.outcome().await.is_none());
        let result = second.outcome().await.unwrap();
        assert_eq!(result.centipawns(), Some(15));
        assert_eq!(result.lines.len(), 1);
        assert_eq!(chess::format_uci_move(result.best_move().unwrap()), "e2e4");
    }

    #[tokio::test]
    async fn test_stop_drops_late_completion() {
        let (mut coordinator, mut worker) = ready_coordinator().await;
        let ticket = coordinator.analyze(&Position::starting(), 20);
        coordinator.stop();
        settle().await;

        assert_eq!(worker.drain_sent().last().map(String::as_str), Some("stop"));
        worker.say("info depth 3 score cp 10 pv e2e4").await;
        worker.say("bestmove e2e4").await;

        assert!(ticket.outcome().await.is_none());
    }

    #[tokio::test]
    async fn test_analysis_restarts_after_stop() {
        let (mut coordinator, worker) = ready_coordinator().await;
        let _cancelled = coordinator.analyze(&Position::starting(), 20);
        coordinator.stop();
        let ticket = coordinator.analyze(&Position::starting(), 5);
        settle().await;

        worker.say("bestmove e2e4").await;
        worker.say("info depth 5 score mate 2 pv d1h5").await;
        worker.say("bestmove d1h5").await;

        assert_eq!(ticket.generation(), 2);
        let result = ticket.outcome().await.unwrap();
        assert_eq!(result.mate(), Some(2));
    }

    #[tokio::test]
    async fn test_completion_without_moves_delivers_nothing() {
        let (mut coordinator, worker) = ready_coordinator().await;
        let ticket = coordinator.analyze(&Position::starting(), 5);
        settle().await;

        worker.say("info depth 0 score mate 0").await;
        worker.say("bestmove (none)").await;

        assert!(ticket.outcome().await.is_none());
    }

    #[tokio::test]
    async fn test_worker_fault_reaches_current_request() {
        let (mut coordinator, worker) = ready_coordinator().await;
        let ticket = coordinator.analyze(&Position::starting(), 5);
        settle().await;

        worker
            .lines
            .send(WorkerMessage::Fault("engine process exited".to_string()))
            .await
            .unwrap();

        let result = ticket.outcome().await.unwrap();
        assert_eq!(result.error.as_deref(), Some("engine process exited"));

        // Still usable: later requests get an error result instead of hanging
        let later = coordinator.analyze(&Position::starting(), 5);
        assert!(later.outcome().await.unwrap().is_error());
    }

    #[tokio::test]
    async fn test_shutdown_sends_quit() {
        let (coordinator, mut worker) = ready_coordinator().await;
        coordinator.shutdown().await;
        assert_eq!(worker.drain_sent(), ["quit"]);
    }
}
