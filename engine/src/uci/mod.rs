pub mod aggregate;
pub mod parser;

pub use aggregate::{AnalysisAggregate, AnalysisResult, PrincipalVariation, SearchStats};
pub use parser::{parse_engine_line, EngineLine, ProgressUpdate};
