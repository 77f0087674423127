use anyhow::Result;
use clap::Parser;
use gpustats::*;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[derive(Parser)]
#[command(name = "gpustats")]
#[command(about = "Sample per-job GPU/CPU usage and fold it into running averages", long_about = None)]
#[command(version)]
struct Cli {
    /// Don't sleep at the beginning
    #[arg(short = 'n', long)]
    nosleep: bool,

    /// Config file (TOML)
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Read the source report from this JSON file instead of running the snapshot command
    #[arg(long)]
    report: Option<PathBuf>,

    /// JSON file for reading/storing data (overrides state.path)
    fname: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut app_config = config::AppConfig::load_from_path(cli.config.as_deref())?;
    if let Some(fname) = cli.fname {
        app_config.state.path = fname;
    }
    tracing::debug!(version = %version::banner(), path = %app_config.state.path.display(), "starting");

    if !cli.nosleep && app_config.sampling.max_initial_delay_secs > 0 {
        let secs = rand::rng().random_range(0..=app_config.sampling.max_initial_delay_secs);
        tracing::debug!(delay_secs = secs, "initial delay");
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    let repo = state_repo::StateRepo::new(&app_config.state.path)
        .with_stale_temp_max_age(app_config.state.stale_temp_max_age());

    let report = match cli.report {
        Some(path) => {
            let source = snapshot_source::ReportFileSource::new(path);
            cycle::run_cycle(&source, &repo).await?
        }
        None => {
            let source = snapshot_source::CommandSource::new(
                app_config.source.command.clone(),
                app_config.source.timeout(),
            )?;
            cycle::run_cycle(&source, &repo).await?
        }
    };

    if report.previous_state_corrupt {
        tracing::warn!("previous state was discarded this cycle");
    }
    Ok(())
}
