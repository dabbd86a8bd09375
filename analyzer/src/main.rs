//! `chess-analyzer`: load positions, play through moves, browse position lists
//! and favorites, and ask a UCI engine for multi-line analysis.
//!
//! Runtime tunables come from `CHESS_ANALYZER_*` environment variables (see
//! [`session::config`]). Logs go to stderr and follow `RUST_LOG`.

mod terminal;

use std::io::Stdout;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chess::{parse_uci_move, Game, PieceKind, Position, STARTING_POSITION};
use clap::{Parser, Subcommand};
use engine::{spawn_worker, AnalysisCoordinator, EngineStartupError};
use session::{
    AnalyzerConfig, FavoritesStore, Session, SessionConfig, StepOutcome, MANUAL_LABEL,
};

use terminal::{format_move_list, TerminalBoard};

type TerminalSession = Session<Game, TerminalBoard<Stdout>>;

#[derive(Parser)]
#[command(name = "chess-analyzer", about = "Chess position analysis with a UCI engine")]
struct Cli {
    /// Search depth, overriding CHESS_ANALYZER_DEPTH.
    #[arg(short, long, global = true)]
    depth: Option<u8>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single position (FEN, or `startpos`).
    Analyze { position: String },
    /// Walk through a file of positions, one per line.
    Browse {
        file: PathBuf,
        /// Analyze each position on the way.
        #[arg(short, long)]
        analyze: bool,
        /// 1-based entry to start from.
        #[arg(long)]
        start: Option<usize>,
    },
    /// Play UCI moves from a position and print the resulting history.
    Play {
        position: String,
        moves: Vec<String>,
        /// Take back this many moves at the end.
        #[arg(long, default_value_t = 0)]
        undo: usize,
        /// Analyze the final position.
        #[arg(short, long)]
        analyze: bool,
    },
    /// Manage saved positions.
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
}

#[derive(Subcommand)]
enum FavoritesAction {
    List,
    Add {
        position: String,
        #[arg(short, long, default_value = MANUAL_LABEL)]
        label: String,
    },
    Remove {
        position: String,
        #[arg(short, long, default_value = MANUAL_LABEL)]
        label: String,
    },
    /// Walk through all favorites.
    Browse {
        #[arg(short, long)]
        analyze: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid move {0:?}, expected UCI notation such as e2e4")]
    BadMove(String),
    #[error("no valid position found in {0}")]
    NothingToBrowse(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AnalyzerConfig::from_env();
    if let Some(depth) = cli.depth {
        config.depth = depth.max(1);
    }
    tracing::debug!("Configuration: {:?}", config);

    let favorites_dir = config.data_dir.join("favorites");
    let favorites = FavoritesStore::open_dir(favorites_dir.clone())
        .with_context(|| format!("opening favorites in {}", favorites_dir.display()))?;

    match cli.command {
        Commands::Analyze { position } => {
            let mut session = new_session(&config, favorites, true)?;
            session
                .load_position(&expand_position(&position))
                .with_context(|| format!("loading {}", position))?;
            attach_engine(&mut session, &config).await;
            analyze_current(&mut session).await?;
            session.shutdown().await;
        }
        Commands::Browse {
            file,
            analyze,
            start,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let label = file_label(&file);
            let mut session = new_session(&config, favorites, true)?;
            if analyze {
                attach_engine(&mut session, &config).await;
            }
            let mut outcome = session.load_position_list(&text, &label);
            if let Some(start) = start {
                outcome = session.jump_to(start)?;
            }
            browse(&mut session, outcome, analyze, &label).await?;
            session.shutdown().await;
        }
        Commands::Play {
            position,
            moves,
            undo,
            analyze,
        } => {
            let mut session = new_session(&config, favorites, false)?;
            let start = Position::parse(&expand_position(&position))?;
            session
                .load_position(start.as_str())
                .with_context(|| format!("loading {}", position))?;
            play(&mut session, &moves, undo)?;
            print_history(&session, &start);
            if analyze {
                attach_engine(&mut session, &config).await;
                analyze_current(&mut session).await?;
            }
            session.shutdown().await;
        }
        Commands::Favorites { action } => run_favorites(action, favorites, &config).await?,
    }

    Ok(())
}

async fn run_favorites(
    action: FavoritesAction,
    mut favorites: FavoritesStore,
    config: &AnalyzerConfig,
) -> anyhow::Result<()> {
    match action {
        FavoritesAction::List => {
            if favorites.is_empty() {
                println!("No favorites saved");
            }
            for (i, favorite) in favorites.get_all().iter().enumerate() {
                println!("{:>3}. [{}] {}", i + 1, favorite.source_label, favorite.position);
            }
        }
        FavoritesAction::Add { position, label } => {
            let position = Position::parse(&expand_position(&position))?;
            if favorites.add(&position, &label)? {
                println!("Saved {} ({})", position, label);
            } else {
                println!("Already saved: {} ({})", position, label);
            }
        }
        FavoritesAction::Remove { position, label } => {
            let position = Position::parse(&expand_position(&position))?;
            if favorites.remove(&position, &label)? {
                println!("Removed {} ({})", position, label);
            } else {
                println!("Not a favorite: {} ({})", position, label);
            }
        }
        FavoritesAction::Browse { analyze } => {
            let mut session = new_session(config, favorites, true)?;
            if analyze {
                attach_engine(&mut session, config).await;
            }
            let outcome = session.load_favorites_list();
            browse(&mut session, outcome, analyze, "favorites").await?;
            session.shutdown().await;
        }
    }
    Ok(())
}

fn new_session(
    config: &AnalyzerConfig,
    favorites: FavoritesStore,
    show_board: bool,
) -> anyhow::Result<TerminalSession> {
    let view = TerminalBoard::new(std::io::stdout()).with_board(show_board);
    let session_config = SessionConfig {
        depth: config.depth,
        status_ttl: config.status_ttl,
    };
    Ok(Session::new(view, favorites, session_config)?)
}

async fn start_engine(config: &AnalyzerConfig) -> Result<AnalysisCoordinator, EngineStartupError> {
    let link = spawn_worker(&config.stockfish_config())?;
    AnalysisCoordinator::initialize(link, &config.analysis_options()).await
}

/// Start the engine; a failure is reported through the session, not returned.
async fn attach_engine(session: &mut TerminalSession, config: &AnalyzerConfig) {
    match start_engine(config).await {
        Ok(coordinator) => session.attach_engine(coordinator),
        Err(e) => session.engine_unavailable(&e),
    }
}

/// Run one analysis of the current position and switch analysis back off.
async fn analyze_current(session: &mut TerminalSession) -> anyhow::Result<()> {
    session.toggle_analysis()?;
    if session.next_analysis().await.is_none() {
        println!("No analysis available for this position");
    }
    session.toggle_analysis()?;
    Ok(())
}

async fn browse(
    session: &mut TerminalSession,
    mut outcome: StepOutcome,
    analyze: bool,
    label: &str,
) -> anyhow::Result<()> {
    if !matches!(outcome, StepOutcome::Loaded { .. } | StepOutcome::Unchanged) {
        return Err(CliError::NothingToBrowse(label.to_string()).into());
    }

    loop {
        if analyze {
            if let Err(e) = analyze_current(session).await {
                tracing::warn!("Skipping analysis: {}", e);
            }
        }
        outcome = session.next_position();
        if !matches!(outcome, StepOutcome::Loaded { .. }) {
            break;
        }
        println!();
    }
    Ok(())
}

fn play(session: &mut TerminalSession, moves: &[String], undo: usize) -> anyhow::Result<()> {
    for token in moves {
        let mv = parse_uci_move(token).map_err(|_| CliError::BadMove(token.clone()))?;
        if let Some(piece) = mv.promotion.map(PieceKind::from) {
            if piece != PieceKind::Queen {
                tracing::warn!("Promotion in {} ignored, promoting to a queen", token);
            }
        }
        session
            .apply_user_move(mv.from, mv.to)
            .with_context(|| format!("playing {}", token))?;
    }
    for _ in 0..undo {
        session.undo()?;
    }
    Ok(())
}

fn print_history(session: &TerminalSession, start: &Position) {
    let history = session.history();
    let sans: Vec<&str> = history.applied_moves().iter().map(|m| m.san.as_str()).collect();
    let black_first = start.side_to_move() == chess::PieceColor::Black;
    println!(
        "Moves: {}",
        format_move_list(&sans, start.fullmove_number(), black_first)
    );
    if history.can_redo() {
        let tail: Vec<&str> = history.moves()[history.applied_len()..]
            .iter()
            .map(|m| m.san.as_str())
            .collect();
        println!("Redo:  {}", tail.join(" "));
    }
}

fn expand_position(raw: &str) -> String {
    if raw.trim() == "startpos" {
        STARTING_POSITION.to_string()
    } else {
        raw.to_string()
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
