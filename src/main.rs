mod colors;

use clap::Parser;
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolpin::config::{DEFAULT_BIN_DIR, DEFAULT_TOOLCHAIN, DEFAULT_VERSION_FILE};
use toolpin::{Config, ToolManager};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolpin")]
#[command(author, version, about = "Fetch pinned versions of command-line tools", long_about = None)]
struct Cli {
    /// Tool to fetch, as named in the recipe catalog
    tool: String,

    /// Directory to link the tool into
    #[arg(long = "to", env = "TOOLPIN_BIN_DIR", default_value = DEFAULT_BIN_DIR)]
    bin_dir: PathBuf,

    /// File pinning tool versions
    #[arg(long = "versionfile", env = "TOOLPIN_VERSION_FILE", default_value = DEFAULT_VERSION_FILE)]
    version_file: PathBuf,

    /// Store directory [default: <TO>/.store]
    #[arg(long = "store")]
    store_dir: Option<PathBuf>,

    /// TOML recipe catalog to use instead of the built-in one
    #[arg(long, env = "TOOLPIN_RECIPES")]
    recipes: Option<PathBuf>,

    /// Token for GitHub requests
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Program used for toolchain installs
    #[arg(long, default_value = DEFAULT_TOOLCHAIN)]
    toolchain: String,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    http_timeout: u64,

    /// Print the tool's license after fetching it
    #[arg(long)]
    license: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            bin_dir: self.bin_dir.clone(),
            store_dir: self.store_dir.clone(),
            version_file: self.version_file.clone(),
            recipes: self.recipes.clone(),
            github_token: self.github_token.clone(),
            toolchain: self.toolchain.clone(),
            http_timeout: Duration::from_secs(self.http_timeout),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    colors::init_colors();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    if let Err(e) = run(&cli, &cancel).await {
        eprintln!("{} {}", colors::failure_mark(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, cancel: &CancellationToken) -> anyhow::Result<()> {
    let manager = ToolManager::new(cli.config())?;
    let outcome = manager.fetch(&cli.tool, cancel).await?;

    println!(
        "{} {} {} {}",
        colors::success_mark(),
        outcome.name.bold(),
        outcome.version.cyan(),
        format!("({}, {}ms)", outcome.state, outcome.time_ms).dimmed()
    );

    if cli.license {
        let license = manager.license(&cli.tool, cancel).await?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&license.content)?;
        stdout.flush()?;
    }

    Ok(())
}
