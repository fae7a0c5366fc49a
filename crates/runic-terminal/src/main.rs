// Terminal host for the runic monitor

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use runic_app::{AppCore, EntryId, MonitorConfig, RefetchOutcome};
use tokio::time::{Instant, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

mod render;
mod sim;

use render::Renderer;
use sim::{SimOptions, SimulatedClient};

const RENDER_PERIOD: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "runic-monitor")]
#[command(about = "Runic - load balancer observability monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML); defaults apply when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seed for the simulated load balancer
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every wallet and watch the dashboard
    Run {
        /// Seconds to run before exiting
        #[arg(short, long, default_value = "30")]
        duration: u64,

        /// Show toast notifications
        #[arg(short, long)]
        notifications: bool,

        /// Seconds between refetches once the dashboard is up (0 disables)
        #[arg(short, long, default_value = "10")]
        refetch_after: u64,

        #[command(flatten)]
        sim: SimArgs,
    },

    /// Open the activity view and print every request event
    Activity {
        /// Seconds to run before exiting
        #[arg(short, long, default_value = "15")]
        duration: u64,

        #[command(flatten)]
        sim: SimArgs,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct SimArgs {
    /// Fraction of simulated attempts that fail
    #[arg(long, default_value = "0.1")]
    failure_rate: f64,

    /// Share of failures reported as HTTP 403
    #[arg(long, default_value = "0.5")]
    rate_limit_share: f64,

    /// Share of successful requests reported as cache hits
    #[arg(long, default_value = "0.2")]
    cache_hit_share: f64,
}

impl SimArgs {
    fn options(&self, seed: Option<u64>) -> anyhow::Result<SimOptions> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.failure_rate),
            "--failure-rate must be within 0..=1"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.rate_limit_share),
            "--rate-limit-share must be within 0..=1"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.cache_hit_share),
            "--cache-hit-share must be within 0..=1"
        );
        Ok(SimOptions {
            failure_rate: self.failure_rate,
            rate_limit_share: self.rate_limit_share,
            cache_hit_share: self.cache_hit_share,
            seed,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Run {
            duration,
            notifications,
            refetch_after,
            sim,
        } => {
            run(
                config,
                sim.options(cli.seed)?,
                Duration::from_secs(duration),
                notifications,
                Duration::from_secs(refetch_after),
            )
            .await?;
        }
        Commands::Activity { duration, sim } => {
            activity(config, sim.options(cli.seed)?, Duration::from_secs(duration)).await?;
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<MonitorConfig> {
    let mut config = match path {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("applying environment overrides")?;
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &MonitorConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.client.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn session(config: MonitorConfig, options: SimOptions) -> anyhow::Result<AppCore> {
    let client = Arc::new(SimulatedClient::new(config.client.clone(), options));
    Ok(AppCore::new(config, client)?)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

async fn run(
    config: MonitorConfig,
    options: SimOptions,
    duration: Duration,
    notifications: bool,
    refetch_every: Duration,
) -> anyhow::Result<()> {
    let core = session(config, options)?;
    if notifications {
        core.toggle_notifications();
    }
    let mut renderer = Renderer::new(&core);
    print_lines(renderer.drain());

    let starter = tokio::spawn({
        let core = core.clone();
        async move { core.start().await }
    });

    let deadline = tokio::time::sleep(duration);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(deadline, ctrl_c);

    let mut render_tick = tokio::time::interval(RENDER_PERIOD);
    render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refetch_tick = (!refetch_every.is_zero()).then(|| {
        let mut tick = tokio::time::interval_at(Instant::now() + refetch_every, refetch_every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick
    });

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
            _ = &mut deadline => break,
            _ = render_tick.tick() => print_lines(renderer.drain()),
            _ = next_tick(&mut refetch_tick) => {
                let core = core.clone();
                tokio::spawn(async move {
                    match core.refetch().await {
                        Ok(RefetchOutcome::Completed) => tracing::info!("refetch complete"),
                        Ok(outcome) => tracing::debug!(?outcome, "refetch skipped"),
                        // Already reported to diagnostics by the core.
                        Err(_) => {}
                    }
                });
            }
        }
    }

    starter.abort();
    core.shutdown();
    print_lines(renderer.drain());
    print_lines(render::summary(&core));
    Ok(())
}

async fn next_tick(tick: &mut Option<tokio::time::Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn activity(
    config: MonitorConfig,
    options: SimOptions,
    duration: Duration,
) -> anyhow::Result<()> {
    let pacing = config.timing.pacing();
    let core = session(config, options)?;
    let view = core.open_activity_view();
    let mut entries = view.ledger().watch();
    let mut last: Option<EntryId> = None;

    let traffic = tokio::spawn({
        let core = core.clone();
        async move {
            let addresses = core.balances().addresses();
            for address in addresses.iter().cycle() {
                core.fetch_balance(address).await;
                tokio::time::sleep(pacing).await;
            }
        }
    });

    let deadline = tokio::time::sleep(duration);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(deadline, ctrl_c);
    let mut render_tick = tokio::time::interval(RENDER_PERIOD);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = &mut deadline => break,
            _ = render_tick.tick() => {
                let Some(ledger) = entries.poll() else { continue };
                let fresh: Vec<_> = ledger
                    .iter()
                    .take_while(|e| last.map_or(true, |id| e.id > id))
                    .collect();
                for entry in fresh.into_iter().rev() {
                    println!("{} {} {}", entry.id, entry.category.indicator(), entry.message);
                }
                last = ledger.front().map(|e| e.id).or(last);
            }
        }
    }

    traffic.abort();
    println!(
        "{} entries retained (cap {})",
        view.ledger().len(),
        view.ledger().capacity()
    );
    view.close();
    Ok(())
}
