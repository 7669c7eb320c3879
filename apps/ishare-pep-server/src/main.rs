use std::path::PathBuf;

use clap::Parser;
use ishare_pep_server::config::AppConfig;

/// Enforcing reverse proxy for iSHARE delegation evidence.
#[derive(Parser)]
#[command(name = "ishare-pep-server", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref())?;

    ishare_pep_server::logging::init(&cfg.logging)?;
    ishare_pep_server::run(cfg).await
}
