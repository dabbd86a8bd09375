//! Configuration for the analyzer.
//!
//! Every value has a compile-time default and can be overridden at runtime via
//! a dedicated environment variable. Values that fail to parse fall back to the
//! default.

use std::path::PathBuf;
use std::time::Duration;

use engine::{AnalysisOptions, StockfishConfig};

const DEFAULT_CONFIG_DIR: &str = ".config/chess-analyzer";
const DEV_DATA_DIR: &str = "./data";

/// Default search depth for `go depth`.
pub const DEFAULT_DEPTH: u8 = 18;

/// Default engine thread count.
const DEFAULT_THREADS: u32 = 2;
const MAX_THREADS: u32 = 16;

/// Default number of principal variations.
const DEFAULT_MULTIPV: usize = engine::DEFAULT_MULTIPV;
const MAX_MULTIPV: usize = 5;

const DEFAULT_READY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATUS_TTL_MS: u64 = 3000;

/// Get the data directory for favorites.
///
/// Priority:
/// 1. `CHESS_ANALYZER_DATA_DIR` env variable if set
/// 2. `$HOME/.config/chess-analyzer` if HOME is set
/// 3. `./data` as fallback
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHESS_ANALYZER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Get an explicit engine binary path, if configured via
/// `CHESS_ANALYZER_ENGINE_PATH`. `None` means search common locations.
pub fn get_engine_path() -> Option<PathBuf> {
    std::env::var_os("CHESS_ANALYZER_ENGINE_PATH").map(PathBuf::from)
}

/// Get the search depth (`CHESS_ANALYZER_DEPTH`, default 18, at least 1).
pub fn get_depth() -> u8 {
    parse_env("CHESS_ANALYZER_DEPTH")
        .unwrap_or(DEFAULT_DEPTH)
        .max(1)
}

/// Get the engine thread count (`CHESS_ANALYZER_THREADS`, default 2, clamped
/// to 1..=16).
pub fn get_threads() -> u32 {
    parse_env("CHESS_ANALYZER_THREADS")
        .unwrap_or(DEFAULT_THREADS)
        .clamp(1, MAX_THREADS)
}

/// Get the MultiPV width (`CHESS_ANALYZER_MULTIPV`, default 3, clamped to
/// 1..=5).
pub fn get_multipv() -> usize {
    parse_env("CHESS_ANALYZER_MULTIPV")
        .unwrap_or(DEFAULT_MULTIPV)
        .clamp(1, MAX_MULTIPV)
}

/// Get how long to wait for `readyok` (`CHESS_ANALYZER_READY_TIMEOUT_SECS`).
pub fn get_ready_timeout() -> Duration {
    Duration::from_secs(
        parse_env("CHESS_ANALYZER_READY_TIMEOUT_SECS").unwrap_or(DEFAULT_READY_TIMEOUT_SECS),
    )
}

/// Get how long status messages stay visible (`CHESS_ANALYZER_STATUS_TTL_MS`).
pub fn get_status_ttl() -> Duration {
    Duration::from_millis(parse_env("CHESS_ANALYZER_STATUS_TTL_MS").unwrap_or(DEFAULT_STATUS_TTL_MS))
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", name, raw);
            None
        }
    }
}

/// All runtime settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub data_dir: PathBuf,
    pub engine_path: Option<PathBuf>,
    pub depth: u8,
    pub threads: u32,
    pub multipv: usize,
    pub ready_timeout: Duration,
    pub status_ttl: Duration,
}

impl AnalyzerConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: get_data_dir(),
            engine_path: get_engine_path(),
            depth: get_depth(),
            threads: get_threads(),
            multipv: get_multipv(),
            ready_timeout: get_ready_timeout(),
            status_ttl: get_status_ttl(),
        }
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            multipv: self.multipv,
            threads: self.threads,
            ready_timeout: self.ready_timeout,
        }
    }

    pub fn stockfish_config(&self) -> StockfishConfig {
        StockfishConfig {
            path: self.engine_path.clone(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEV_DATA_DIR),
            engine_path: None,
            depth: DEFAULT_DEPTH,
            threads: DEFAULT_THREADS,
            multipv: DEFAULT_MULTIPV,
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            status_ttl: Duration::from_millis(DEFAULT_STATUS_TTL_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These assume the CHESS_ANALYZER_* variables are unset in the test
    // environment. Setting them would race with other tests.

    #[test]
    fn test_get_data_dir_fallback() {
        let dir = get_data_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_tunables_within_bounds() {
        assert!(get_depth() >= 1);
        assert!((1..=MAX_THREADS).contains(&get_threads()));
        assert!((1..=MAX_MULTIPV).contains(&get_multipv()));
    }

    #[test]
    fn test_parse_env_missing_is_none() {
        assert_eq!(parse_env::<u32>("CHESS_ANALYZER_DEFINITELY_UNSET_VAR"), None);
    }

    #[test]
    fn test_default_config_maps_to_engine_options() {
        let config = AnalyzerConfig::default();
        let options = config.analysis_options();
        assert_eq!(options.multipv, 3);
        assert_eq!(options.threads, 2);
        assert_eq!(options.ready_timeout, Duration::from_secs(10));
        assert!(config.stockfish_config().path.is_none());
        assert_eq!(config.depth, 18);
    }
}
