use std::path::PathBuf;

use clap::Parser;

use geneva_runner::app::{self, RunOptions};

/// Runs a Geneva runrep report over SSH and fetches its output over SFTP.
#[derive(Parser)]
#[command(name = "geneva-runner", version)]
struct Cli {
    /// Path to the JSON run configuration
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Local path the fetched report is written to
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// Replace the local output file if it already exists
    #[arg(long)]
    overwrite: bool,

    /// Leave the report on the server after fetching it
    #[arg(long)]
    keep_remote: bool,
}

fn main() {
    let cli = Cli::parse();
    let options = RunOptions {
        config_path: cli.config,
        output_path: cli.output,
        overwrite: cli.overwrite,
        keep_remote: cli.keep_remote,
    };
    std::process::exit(app::run(&options));
}
