//! stratum - read, write and watch layered configuration files from the shell.

use std::{error::Error, path::PathBuf, process};

use clap::Parser;
use stratum::{
    cli::{CliService, formatting::format_error},
    config_store::ConfigStore,
    formats::Format,
    tracing_config,
};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "stratum", version, about = "Layered configuration files from the shell")]
struct Args {
    /// Backing configuration file
    #[arg(short, long)]
    file: PathBuf,

    /// File format; detected from the file when omitted
    #[arg(long)]
    format: Option<Format>,

    /// Also write logs to daily rolling files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Command category (e.g. "config"), or "help"
    #[arg(default_value = "help")]
    category: String,

    /// Command name within the category
    #[arg(default_value = "")]
    command: String,

    /// Command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let _guard = match &args.log_dir {
        Some(dir) => Some(tracing_config::init_with_file(dir)?),
        None => {
            tracing_config::init_cli()?;
            None
        }
    };

    debug!(file = %args.file.display(), "Opening configuration store");

    let mut builder = ConfigStore::builder(&args.file).fs_events(true);
    if let Some(format) = args.format {
        builder = builder.format(format);
    }

    let cli_service = CliService::new(builder.build()?);

    match cli_service
        .execute_command(&args.category, &args.command, &args.args)
        .await
    {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            process::exit(1);
        }
    }
}
