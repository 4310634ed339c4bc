pub mod forcing_analyzer;

pub use forcing_analyzer::{ForcingAnalyzer, ForcingStatistics, VariableStats};
