use chess::{parse_uci_move, AnalysisScore};
use cozy_chess::Move;

/// Classification of one line of engine output.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine {
    /// `uciok`: handshake acknowledged.
    UciOk,
    /// `readyok`: answer to `isready`.
    ReadyOk,
    /// An `info` line with a depth and at least one move in its PV.
    Progress(ProgressUpdate),
    /// `bestmove ...`: the current search finished.
    Completion,
    /// Anything else. Not an error.
    Unrecognized,
}

/// Search progress for one PV rank at one depth.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub depth: u32,
    pub seldepth: Option<u32>,
    pub score: Option<AnalysisScore>,
    /// 1-based MultiPV rank. Defaults to 1 when the engine omits it.
    pub multipv: usize,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
    pub pv: Vec<Move>,
}

/// Classify a line of engine output.
pub fn parse_engine_line(line: &str) -> EngineLine {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => EngineLine::UciOk,
        Some(&"readyok") => EngineLine::ReadyOk,
        Some(&"bestmove") => EngineLine::Completion,
        Some(&"info") => parse_info_line(&tokens[1..])
            .map(EngineLine::Progress)
            .unwrap_or(EngineLine::Unrecognized),
        _ => EngineLine::Unrecognized,
    }
}

/// Extract a progress update from the tokens after `info`.
///
/// Returns `None` unless the line has a numeric depth and a PV containing at
/// least one well-formed move.
fn parse_info_line(tokens: &[&str]) -> Option<ProgressUpdate> {
    let mut depth = None;
    let mut seldepth = None;
    let mut score = None;
    let mut multipv = 1usize;
    let mut nodes = None;
    let mut nps = None;
    let mut time_ms = None;
    let mut pv = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                depth = Some(tokens.get(i)?.parse::<u32>().ok()?);
            }
            "seldepth" => {
                i += 1;
                seldepth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "time" => {
                i += 1;
                time_ms = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nodes" => {
                i += 1;
                nodes = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nps" => {
                i += 1;
                nps = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&kind) = tokens.get(i) {
                    i += 1;
                    let value = tokens.get(i).and_then(|s| s.parse::<i32>().ok());
                    score = match kind {
                        "cp" => value.map(AnalysisScore::Centipawns),
                        "mate" => value.map(AnalysisScore::Mate),
                        _ => None,
                    };
                }
            }
            "multipv" => {
                i += 1;
                multipv = tokens.get(i)?.parse().ok()?;
            }
            "pv" => {
                // Moves run until the next keyword
                i += 1;
                while i < tokens.len() && !is_keyword(tokens[i]) {
                    if let Ok(mv) = parse_uci_move(tokens[i]) {
                        pv.push(mv);
                    }
                    i += 1;
                }
                continue;
            }
            // Free text to end of line
            "string" => break,
            _ => {}
        }
        i += 1;
    }

    if pv.is_empty() {
        return None;
    }

    Some(ProgressUpdate {
        depth: depth?,
        seldepth,
        score,
        multipv,
        nodes,
        nps,
        time_ms,
        pv,
    })
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "depth"
            | "seldepth"
            | "time"
            | "nodes"
            | "score"
            | "pv"
            | "multipv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "nps"
            | "tbhits"
            | "cpuload"
            | "string"
            | "refutation"
            | "currline"
    )
}
