use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "xtrace",
    version,
    about = "Inspect trace propagation headers and probe the segment collector"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode or generate propagation header values
    Header(HeaderArgs),
    /// Send a probe segment to the collector
    Ping(PingArgs),
    Version,
}

#[derive(Args, Debug)]
pub struct HeaderArgs {
    #[command(subcommand)]
    pub cmd: HeaderSub,
}

#[derive(Subcommand, Debug)]
pub enum HeaderSub {
    /// Decode a header value and print it as JSON
    Parse {
        value: String,
        /// Rate used when the header carries no explicit decision
        #[arg(long, default_value_t = 1.0)]
        sampling_rate: f64,
    },
    /// Print a fresh header value
    Generate {
        #[arg(long, default_value_t = 1.0)]
        sampling_rate: f64,
    },
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// YAML config file (XTRACE_* environment variables still apply)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Collector address, overrides config and environment
    #[arg(long)]
    pub address: Option<String>,

    /// Segment name
    #[arg(long, default_value = "xtrace-ping")]
    pub name: String,

    /// Continue this trace instead of starting a new one
    #[arg(long)]
    pub header: Option<String>,
}
