//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Keeps the non-blocking file writer alive for the whole process.
pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rig", version, about = "Motor characterization rig CLI")]
pub struct Cli {
    /// Path to config TOML; built-in defaults apply when the file is absent
    #[arg(long, value_name = "FILE", default_value = "etc/rig.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the interactive command loop over stdin/stdout
    Run {
        /// Enable real-time mode (SCHED_FIFO + mlockall; Linux only)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux: attempts SCHED_FIFO priority and calls mlockall(MCL_CURRENT|MCL_FUTURE) to lock the process address space into RAM. Reduces sampling jitter during captures but may require elevated privileges (CAP_SYS_NICE, memlock ulimit)."
        )]
        rt: bool,
        /// SCHED_FIFO priority when --rt is enabled (defaults to the system max)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
    },
    /// Quick health check (simulated speed path end to end)
    SelfCheck,
}
