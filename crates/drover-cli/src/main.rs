mod render;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cliclack::spinner;
use console::style;
use futures::TryStreamExt;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drover::agent::Agent;
use drover::git::{GitRepository, VersionControl};
use drover::providers::factory::provider_from_env;
use drover::tools::default_registry;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// What the agent should accomplish in the repository
    #[arg(short, long)]
    goal: String,

    /// Model backend: anthropic, openai or google
    #[arg(short, long, default_value = "anthropic")]
    provider: String,

    /// File of KEY=VALUE lines loaded into the environment before anything else
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Repository the agent works in, initialized if it is not one yet
    #[arg(short, long, default_value = ".")]
    workdir: PathBuf,

    /// Create and check out this branch before the agent starts
    #[arg(short, long)]
    branch: Option<String>,

    /// Stop with an error after this many model turns, at least one
    #[arg(long)]
    max_turns: Option<NonZeroUsize>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drover=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_env(env_file: Option<&PathBuf>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            // A missing default .env is fine, the variables may already be set
            dotenv::dotenv().ok();
        }
    }
    Ok(())
}

fn log_failure<T>(result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        error!(error = %e, "Run failed");
        e
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // RUST_LOG may come from the env file, so its failure is reported after logging starts
    let env_loaded = load_env(cli.env_file.as_ref());
    init_logging();

    log_failure(match env_loaded {
        Ok(()) => run(cli).await,
        Err(e) => Err(e),
    })
}

async fn run(cli: Cli) -> Result<()> {
    let provider = provider_from_env(&cli.provider)?;

    let repo = Arc::new(
        GitRepository::open_or_init(&cli.workdir)
            .with_context(|| format!("Failed to open repository at {}", cli.workdir.display()))?,
    );
    if let Some(branch) = &cli.branch {
        repo.create_branch(branch)
            .with_context(|| format!("Failed to create branch {}", branch))?;
        info!(%branch, "Checked out new branch");
    }

    let registry = default_registry(repo.path(), repo.clone())?;
    let mut agent = Agent::new(provider, registry);
    if let Some(max_turns) = cli.max_turns {
        agent = agent.with_max_turns(max_turns);
    }

    println!(
        "{} {}",
        style("drover").cyan().bold(),
        style(format!("- {} in {}", cli.provider, repo.path().display())).dim()
    );
    println!("{} {}\n", style("Goal:").bold(), cli.goal);

    let mut spin = spinner();
    spin.start("awaiting reply");

    let mut stream = agent.reply(&cli.goal);
    loop {
        match stream.try_next().await {
            Ok(Some(message)) => {
                spin.stop("");
                render::render(&message)?;
                spin = spinner();
                spin.start("working");
            }
            Ok(None) => {
                spin.stop("done");
                break;
            }
            Err(e) => {
                spin.error("failed");
                return Err(e);
            }
        }
    }

    Ok(())
}
