//! OP Runtime
//!
//! Command line front end for the plugin runtime:
//! - `analyze`: run a plugin synchronously and print the outcome
//! - `submit`: queue a job, run it on a worker task, print the job record
//! - `plugins`: print registry status
//! - `metrics`: print job metrics in Prometheus text format

use anyhow::Result;
use clap::Parser;
use op_core::RuntimeConfig;
use tracing::info;

mod runtime;

use runtime::{parse_payload, Runtime};

#[derive(Parser, Debug)]
#[command(name = "op-runtime")]
#[command(about = "Governed plugin execution runtime")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Per-invocation plugin timeout in milliseconds (0 disables)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Maximum concurrent plugin invocations (0 means unbounded)
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run a plugin and print the outcome
    Analyze {
        /// Plugin name
        #[arg(short, long)]
        plugin: String,

        /// Request payload as a JSON object
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Submit a job, run it in the background and print the finished record
    Submit {
        /// Plugin name
        #[arg(short, long)]
        plugin: String,

        /// Request payload as a JSON object
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Print registered plugins and their execution metrics
    Plugins,
    /// Print job metrics
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from /etc/op-runtime/environment (if exists)
    let env_file = op_core::config::load_environment();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("op_runtime=info".parse()?)
                .add_directive("op_tools=info".parse()?)
                .add_directive("op_execution_tracker=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = env_file {
        info!(path = %path, "Loaded environment file");
    }

    let args = Args::parse();

    let mut config = RuntimeConfig::from_env();
    if let Some(timeout_ms) = args.timeout_ms {
        config = config.with_plugin_timeout_ms(timeout_ms);
    }
    if let Some(max) = args.max_concurrent {
        config = config.with_max_concurrent_plugins(max);
    }

    let runtime = Runtime::new(config)?;

    match args.command {
        Commands::Analyze { plugin, payload } => {
            let payload = parse_payload(&payload)?;
            let outcome = runtime.analysis.analyze(&plugin, payload).await;
            info!(plugin = %plugin, success = outcome.is_success(), "Analysis finished");
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Submit { plugin, payload } => {
            let payload = parse_payload(&payload)?;
            let job = runtime.submit_and_wait(&plugin, payload).await?;
            info!(job_id = %job.id, status = %job.status, "Job finished");
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::Plugins => {
            println!(
                "{}",
                serde_json::to_string_pretty(&runtime.registry.list_status())?
            );
        }
        Commands::Metrics => {
            print!("{}", runtime.jobs.metrics().render()?);
        }
    }

    Ok(())
}
