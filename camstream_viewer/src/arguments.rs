use clap::Parser;
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Parser)]
#[command(author, version)]
pub struct Arguments {
    /// Camera list and viewer settings
    #[arg(short, long, default_value = "cameras.toml")]
    pub config: PathBuf,

    /// Stream server base url, overrides the one in the config file
    #[arg(short, long)]
    pub server: Option<String>,

    /// Directory to write each camera's last rendered surface to on exit
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Restart a failed camera after this delay (off by default)
    #[arg(short, long, default_value_t = Duration::ZERO.into())]
    pub retry_after: humantime::Duration,
}
