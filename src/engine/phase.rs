//! Bootstrap phase tag.

use std::fmt;

/// Fixed task names of the five phases, usable as queue anchors.
pub const LOAD_CONFIG: &str = "load_config";
pub const INIT_BASIC: &str = "init_basic";
pub const RUN_CONFIGURATORS: &str = "run_configurators";
pub const RUN_CUSTOM_FUNCS: &str = "run_custom_funcs";
pub const START_SERVER: &str = "start_server";

/// How far the bootstrap has progressed. Each value names the last completed phase,
/// except `Running`, which is entered at the start of server startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Unconfigured,
    ConfigLoaded,
    BasicInitialized,
    ConfiguratorsRun,
    CustomFuncsRun,
    Running,
}

impl Phase {
    /// The five phases in execution order.
    pub const SEQUENCE: [Phase; 5] = [
        Phase::ConfigLoaded,
        Phase::BasicInitialized,
        Phase::ConfiguratorsRun,
        Phase::CustomFuncsRun,
        Phase::Running,
    ];

    /// State the engine must be in before this phase may run.
    pub fn predecessor(self) -> Option<Phase> {
        match self {
            Phase::Unconfigured => None,
            Phase::ConfigLoaded => Some(Phase::Unconfigured),
            Phase::BasicInitialized => Some(Phase::ConfigLoaded),
            Phase::ConfiguratorsRun => Some(Phase::BasicInitialized),
            Phase::CustomFuncsRun => Some(Phase::ConfiguratorsRun),
            Phase::Running => Some(Phase::CustomFuncsRun),
        }
    }

    /// Queue task name of the phase that reaches this state.
    pub fn task_name(self) -> Option<&'static str> {
        match self {
            Phase::Unconfigured => None,
            Phase::ConfigLoaded => Some(LOAD_CONFIG),
            Phase::BasicInitialized => Some(INIT_BASIC),
            Phase::ConfiguratorsRun => Some(RUN_CONFIGURATORS),
            Phase::CustomFuncsRun => Some(RUN_CUSTOM_FUNCS),
            Phase::Running => Some(START_SERVER),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unconfigured => "unconfigured",
            Phase::ConfigLoaded => "config_loaded",
            Phase::BasicInitialized => "basic_initialized",
            Phase::ConfiguratorsRun => "configurators_run",
            Phase::CustomFuncsRun => "custom_funcs_run",
            Phase::Running => "running",
        };
        f.write_str(name)
    }
}
