//! fbxupload - register with a Freebox and upload files to its storage.
//!
//! # Configuration
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`FBXUPLOAD_BASE_URL`, `FBXUPLOAD_TARGET_FOLDER`)
//! 3. Config file (`--config`, or `config.toml` in the platform config dir)
//! 4. Default values
//!
//! `RUST_LOG` overrides the log filter chosen by `--verbose`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use fbxupload::{Config, GrantStatus, HttpTransport, SessionController};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fbxupload")]
#[command(version, about, long_about = None)]
struct Args {
    /// Log every request and state change
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Registration file (app token and tracking id)
    #[arg(short = 'c', long = "registration-file", value_name = "FILE", global = true)]
    registration_file: Option<PathBuf>,

    /// Append date and time to uploaded names
    #[arg(short = 'd', long, global = true)]
    timestamp: bool,

    /// Config file (default: config.toml in the platform config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Box URL, e.g. http://192.168.1.254
    #[arg(long, value_name = "URL", global = true)]
    url: Option<String>,

    /// Report unknown or timed-out grants instead of registering again
    #[arg(long, global = true)]
    no_reregister: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register this application (run once, then accept on the box)
    Register,
    /// Show the grant status of the stored registration
    Status,
    /// Upload one or more files
    Upload {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Keep going after a failed file and report all failures at the end
        #[arg(long)]
        continue_on_error: bool,
    },
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fbxupload=debug" } else { "fbxupload=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(url) = &args.url {
        config.base_url = url.clone();
    }
    if let Some(file) = &args.registration_file {
        config.registration_file = Some(file.to_string_lossy().into_owned());
    }
    if args.timestamp {
        config.timestamp_suffix = true;
    }
    if args.no_reregister {
        config.auto_reregister = false;
    }
    if let Command::Upload {
        continue_on_error: true,
        ..
    } = args.command
    {
        config.continue_on_error = true;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    tracing::debug!(
        base_url = %config.base_url,
        registration = %config.registration_path().display(),
        "configuration resolved"
    );

    let transport = Arc::new(HttpTransport::new()?);
    let mut controller = SessionController::from_config(&config, transport);

    match args.command {
        Command::Register => {
            let outcome = controller.register()?;
            println!("{outcome}");
        }
        Command::Status => {
            let status = controller.grant_status()?;
            println!("{}", describe(status));
        }
        Command::Upload { files, .. } => {
            controller.upload_with(files.as_slice(), |receipt| println!("{receipt}"))?;
        }
    }
    Ok(())
}

fn describe(status: GrantStatus) -> String {
    let hint = match status {
        GrantStatus::Granted => "this application may log in",
        GrantStatus::Pending => "accept this application on the Freebox front panel",
        GrantStatus::Denied => "the request was refused on the box",
        GrantStatus::Unknown | GrantStatus::Timeout => "run `fbxupload register` again",
        GrantStatus::NotRegistered => "run `fbxupload register` first",
    };
    format!("Grant status: {status} ({hint})")
}
