use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod run;

#[derive(Clone, Debug, Parser)]
#[command(name = "extdata", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Args)]
pub struct GlobalArgs {
    /// Config file. Defaults to ./extdata.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root of the entity data directories.
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,

    /// Prefix for build artifact links.
    #[arg(long, global = true)]
    pub artifacts_url: Option<String>,

    /// Backend pool server; repeat for several. Overrides configured servers.
    #[arg(long = "server", global = true)]
    pub servers: Vec<String>,

    #[arg(long, global = true)]
    pub parallelism: Option<usize>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Show the download jobs the given entities would need.
    #[command(alias = "p", name = "prepare")]
    Prepare(EntityArgs),
    /// Download and verify every stale external file of the given entities.
    #[command(alias = "f", name = "fetch")]
    Fetch(EntityArgs),
    /// List external files nothing currently uses.
    #[command(name = "purgeable")]
    Purgeable,
    /// Health-check the backend pool.
    #[command(alias = "st", name = "status")]
    Status,
    /// Check a local file against its link sidecar.
    #[command(alias = "v", name = "verify")]
    Verify(VerifyArgs),
}

#[derive(Clone, Debug, Args)]
pub struct EntityArgs {
    /// `<package>:<file>[,<file>...]`; repeat for several entities.
    #[arg(short, long = "entity", required = true)]
    pub entities: Vec<extdata::DataEntity>,
}

#[derive(Clone, Debug, Args)]
pub struct VerifyArgs {
    /// Data file whose `.external` sidecar is checked against.
    pub file: PathBuf,
}
