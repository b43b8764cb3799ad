use std::path::PathBuf;

use clap::Args;
use tracing::level_filters::LevelFilter;

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Address probed to decide whether the network is reachable.
    #[arg(long, default_value = "1.1.1.1:53")]
    pub probe: String,
    /// Seconds between connectivity probes.
    #[arg(long = "probe-interval", default_value_t = 10)]
    pub probe_interval: u64,
    /// Seconds between retries of actions that failed to sync.
    #[arg(long = "retry-interval", default_value_t = 30)]
    pub retry_interval: u64,
    /// Journal replayed actions are appended to. Defaults to `remote/journal.jsonl` in the
    /// application directory. Filled from the global `--journal`.
    #[arg(skip)]
    pub journal: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log_filter: Option<LevelFilter>,
}
