//! Lowering configuration.
//!
//! The flags recognized here mirror the global options of the surrounding
//! compiler driver; lowering itself has no global state.

use crate::sips::SipsMetric;

#[derive(Clone, Debug)]
pub struct Config {
    /// Wrap relations, rules, and the main sequence in log-timer / log-size
    /// statements for the profiler.
    pub profile: bool,

    /// Attach a pretty-printed dump of the emitted RAM, annotated with the
    /// elapsed lowering time.
    pub debug_report: bool,

    /// Run the cost-based join scheduler for clauses with at least two body
    /// atoms, when join-size statistics are available.
    pub auto_schedule: bool,

    /// Metric used for default join ordering when neither an explicit plan
    /// nor the auto-scheduler applies.
    pub sips: SipsMetric,

    /// Provenance instrumentation is requested; lowering carries the flag
    /// for the runtime but does not change shape based on it.
    pub provenance: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            profile: false,
            debug_report: false,
            auto_schedule: false,
            sips: SipsMetric::default(),
            provenance: false,
        }
    }
}
