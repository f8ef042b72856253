//! `gatedb` binary entry point: parse args, install the `tracing`
//! subscriber, hand off to the library's `run`.

use clap::Parser;
use gatedb_cli::{main_with_args, Args};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = tracing_subscriber::EnvFilter::try_new(&args.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    main_with_args(args)
}
