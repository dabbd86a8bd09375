//! Reducer folding progress lines into the latest result per PV rank.

use chess::AnalysisScore;
use cozy_chess::Move;

use super::parser::ProgressUpdate;

/// One ranked engine line.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalVariation {
    /// 1-based MultiPV rank.
    pub rank: usize,
    pub depth: u32,
    pub score: Option<AnalysisScore>,
    /// Never empty: the parser drops lines without moves.
    pub moves: Vec<Move>,
}

impl PrincipalVariation {
    pub fn best_move(&self) -> Option<Move> {
        self.moves.first().copied()
    }
}

/// Counters reported alongside the rank-1 line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub seldepth: Option<u32>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
}

/// Final result of one analysis request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    /// Depth of the rank-1 line, if one arrived.
    pub depth: Option<u32>,
    /// Overall evaluation, taken from rank 1.
    pub score: Option<AnalysisScore>,
    /// Filled ranks in rank order.
    pub lines: Vec<PrincipalVariation>,
    pub stats: SearchStats,
    /// Set when the worker faulted during this request.
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn best_move(&self) -> Option<Move> {
        self.lines.first().and_then(PrincipalVariation::best_move)
    }

    /// Centipawn value when the score is not a mate.
    pub fn centipawns(&self) -> Option<i32> {
        match self.score {
            Some(AnalysisScore::Centipawns(cp)) => Some(cp),
            _ => None,
        }
    }

    /// Signed plies to mate when the engine sees one.
    pub fn mate(&self) -> Option<i32> {
        match self.score {
            Some(AnalysisScore::Mate(m)) => Some(m),
            _ => None,
        }
    }
}

/// Accumulates the latest line per PV rank for the current search.
#[derive(Debug, Clone)]
pub struct AnalysisAggregate {
    width: usize,
    depth: Option<u32>,
    score: Option<AnalysisScore>,
    stats: SearchStats,
    slots: Vec<Option<PrincipalVariation>>,
}

impl AnalysisAggregate {
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            width,
            depth: None,
            score: None,
            stats: SearchStats::default(),
            slots: vec![None; width],
        }
    }

    pub fn reset(&mut self) {
        self.depth = None;
        self.score = None;
        self.stats = SearchStats::default();
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Fold one progress update in. Ranks beyond the configured width are
    /// ignored; only rank 1 moves the aggregate depth and score.
    pub fn apply(&mut self, update: ProgressUpdate) {
        let rank = update.multipv;
        if rank == 0 || rank > self.width {
            tracing::trace!("Ignoring PV rank {} (width {})", rank, self.width);
            return;
        }

        if rank == 1 {
            self.depth = Some(update.depth);
            if update.score.is_some() {
                self.score = update.score;
            }
            self.stats = SearchStats {
                seldepth: update.seldepth,
                nodes: update.nodes,
                nps: update.nps,
                time_ms: update.time_ms,
            };
        }

        self.slots[rank - 1] = Some(PrincipalVariation {
            rank,
            depth: update.depth,
            score: update.score,
            moves: update.pv,
        });
    }

    /// Take the accumulated result and clear. `None` when no rank was filled.
    pub fn flush(&mut self) -> Option<AnalysisResult> {
        let lines: Vec<PrincipalVariation> = self.slots.iter_mut().filter_map(Option::take).collect();
        let result = (!lines.is_empty()).then(|| AnalysisResult {
            depth: self.depth,
            score: self.score,
            lines,
            stats: std::mem::take(&mut self.stats),
            error: None,
        });
        self.reset();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::parser::{parse_engine_line, EngineLine};

    fn feed(aggregate: &mut AnalysisAggregate, line: &str) {
        match parse_engine_line(line) {
            EngineLine::Progress(update) => aggregate.apply(update),
            other => panic!("expected progress for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_secondary_rank_never_overwrites_primary() {
        let mut agg = AnalysisAggregate::new(3);
        feed(&mut agg, "info depth 10 multipv 1 score cp 30 pv e2e4 e7e5");
        feed(&mut agg, "info depth 11 multipv 2 score cp -80 pv d2d4");

        let result = agg.flush().unwrap();
        assert_eq!(result.depth, Some(10));
        assert_eq!(result.score, Some(AnalysisScore::Centipawns(30)));
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[1].score, Some(AnalysisScore::Centipawns(-80)));
        assert_eq!(result.lines[1].depth, 11);
    }

    #[test]
    fn test_latest_line_per_rank_wins() {
        let mut agg = AnalysisAggregate::new(3);
        feed(&mut agg, "info depth 5 multipv 1 score cp 10 pv e2e4");
        feed(&mut agg, "info depth 6 multipv 1 score mate 4 pv g1f3");

        let result = agg.flush().unwrap();
        assert_eq!(result.depth, Some(6));
        assert_eq!(result.mate(), Some(4));
        assert_eq!(result.centipawns(), None);
        assert_eq!(result.lines.len(), 1);
        assert_eq!(chess::format_uci_move(result.best_move().unwrap()), "g1f3");
    }

    #[test]
    fn test_sparse_ranks_arrive_out_of_order() {
        let mut agg = AnalysisAggregate::new(3);
        feed(&mut agg, "info depth 4 multipv 3 score cp -5 pv a2a3");
        feed(&mut agg, "info depth 4 multipv 2 score cp 5 pv b1c3");

        let result = agg.flush().unwrap();
        assert_eq!(result.depth, None);
        assert_eq!(result.score, None);
        let ranks: Vec<usize> = result.lines.iter().map(|l| l.rank).collect();
        assert_eq!(ranks, [2, 3]);
    }

    #[test]
    fn test_ranks_beyond_width_ignored() {
        let mut agg = AnalysisAggregate::new(2);
        feed(&mut agg, "info depth 4 multipv 3 score cp -5 pv a2a3");
        feed(&mut agg, "info depth 4 multipv 0 score cp -5 pv a2a3");
        assert!(agg.is_empty());
        assert!(agg.flush().is_none());
    }

    #[test]
    fn test_flush_clears_so_second_flush_is_empty() {
        let mut agg = AnalysisAggregate::new(3);
        feed(&mut agg, "info depth 2 score cp 15 nodes 400 pv e2e4");

        let first = agg.flush().unwrap();
        assert_eq!(first.stats.nodes, Some(400));
        assert!(agg.is_empty());
        assert!(agg.flush().is_none());
    }

    #[test]
    fn test_failed_result_shape() {
        let result = AnalysisResult::failed("engine crashed");
        assert!(result.is_error());
        assert!(result.lines.is_empty());
        assert_eq!(result.best_move(), None);
    }
}
