//! runtime-dist CLI - fetch runtime headers for native addon builds
//!
//! Usage:
//!   runtime-dist fetch --runtime node --version 18.17.0    Download into the cache
//!   runtime-dist path  --runtime node --version 18.17.0    Print the cache directory
//!   runtime-dist check --runtime node --version 18.17.0    Exit 1 if incomplete

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use runtime_dist::{
    BuildConfiguration, Runtime, RuntimeDistribution, Settings, TargetArch, TargetOs, output,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "runtime-dist")]
#[command(about = "Fetch and cache runtime headers for native addon builds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cache root (default ~/.runtime-dist)
    #[arg(short, long, global = true, env = "RUNTIME_DIST_CACHE")]
    cache_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the distribution unless it is already cached
    Fetch(Target),

    /// Print the cache directory of a distribution
    Path(Target),

    /// Report whether a distribution is completely cached
    Check(Target),
}

#[derive(Args)]
struct Target {
    /// Runtime: node, iojs, electron or nw
    #[arg(short, long, default_value = "node")]
    runtime: Runtime,

    /// Runtime version, with or without a leading `v`
    #[arg(short, long)]
    version: String,

    /// Target operating system (defaults to the host)
    #[arg(long)]
    os: Option<TargetOs>,

    /// Target architecture (defaults to the host)
    #[arg(long)]
    arch: Option<TargetArch>,
}

impl Target {
    fn config(&self) -> Result<BuildConfiguration> {
        let os = match self.os {
            Some(os) => os,
            None => TargetOs::host().context("Unsupported host OS, pass --os")?,
        };
        let arch = match self.arch {
            Some(arch) => arch,
            None => TargetArch::host().context("Unsupported host architecture, pass --arch")?,
        };
        Ok(BuildConfiguration::new(
            self.runtime,
            self.version.as_str(),
            os,
            arch,
        ))
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(root) = cli.cache_root {
        settings.cache_root = root;
    }

    match cli.command {
        Commands::Fetch(target) => {
            let config = target.config()?;
            output::action(&format!("Fetching {}", config));

            let dist = open(config, &settings)?;
            dist.ensure_ready()
                .with_context(|| format!("Failed to fetch {}", dist.config()))?;
            let abi = dist
                .resolve_abi()
                .with_context(|| format!("Failed to read ABI of {}", dist.config()))?;

            output::success(&format!("{} ready", dist.config()));
            output::info(&format!("path: {}", dist.internal_path().display()));
            output::info(&format!("NODE_MODULE_VERSION: {}", abi));
        }

        Commands::Path(target) => {
            let dist = open(target.config()?, &settings)?;
            println!("{}", dist.internal_path().display());
        }

        Commands::Check(target) => {
            let dist = open(target.config()?, &settings)?;
            let missing = dist.missing_files()?;
            if dist.is_complete()? {
                output::success(&format!("{} is cached", dist.config()));
            } else {
                output::warning(&format!("{} is incomplete", dist.config()));
                for file in missing {
                    output::detail(&format!("missing {}", file.display()));
                }
                return Ok(1);
            }
        }
    }

    Ok(0)
}

fn open(config: BuildConfiguration, settings: &Settings) -> Result<RuntimeDistribution> {
    let label = config.to_string();
    RuntimeDistribution::new(config, settings)
        .with_context(|| format!("Unknown distribution layout for {}", label))
}
