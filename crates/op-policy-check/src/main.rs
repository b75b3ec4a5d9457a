//! op-policy-check
//!
//! Scans the workspace sources and exits non-zero when any rule is broken.

use anyhow::Result;
use clap::Parser;
use op_policy_check::{check_workspace, PolicyConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "op-policy-check")]
#[command(about = "Static policy gate for the op-runtime workspace")]
struct Args {
    /// Workspace root
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Runner file allowed to invoke plugins, relative to the root
    #[arg(long)]
    runner_file: Option<PathBuf>,

    /// Directories to scan, relative to the root (repeatable)
    #[arg(long = "source-dir")]
    source_dirs: Vec<PathBuf>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("op_policy_check=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = PolicyConfig::default();
    if let Some(runner_file) = args.runner_file {
        config.runner_file = runner_file;
    }
    if !args.source_dirs.is_empty() {
        config.source_dirs = args.source_dirs;
    }

    let violations = check_workspace(&args.root, &config)?;
    if violations.is_empty() {
        info!("No policy violations");
        println!("ok: no policy violations");
        return Ok(ExitCode::SUCCESS);
    }

    for violation in &violations {
        println!("{}", violation);
    }
    eprintln!("{} policy violation(s)", violations.len());
    Ok(ExitCode::FAILURE)
}
