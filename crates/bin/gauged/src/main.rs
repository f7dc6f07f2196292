use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use gauge_incentives::epochs::EpochInfo;
use gauge_incentives::store::SledStore;
use gauge_incentives::{App, Config, Context, GaugeStatus};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

mod scenario;

use scenario::Scenario;

#[derive(Parser, Debug)]
#[command(name = "gauged")]
#[command(about = "gauge distribution and sponsorship voting over a sled store", long_about = None)]
struct Args {
    /// sled database path
    #[arg(long, default_value = "./gauged.db", env = "GAUGED_DB")]
    db: PathBuf,

    /// JSON config file; defaults apply when omitted
    #[arg(long, env = "GAUGED_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scenario file and print the emitted events as JSON lines
    Run {
        scenario: PathBuf,
    },
    /// List gauges
    Gauges {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Print the sponsorship ledger
    Ledger,
    /// Print a voter's vote
    Vote {
        voter: String,
    },
    /// Run every invariant check
    Check,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    Upcoming,
    Active,
    Finished,
}

impl From<StatusArg> for GaugeStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::Upcoming => GaugeStatus::Upcoming,
            StatusArg::Active => GaugeStatus::Active,
            StatusArg::Finished => GaugeStatus::Finished,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gauged=info,gauge_incentives=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let mut store = SledStore::open(&args.db)?;

    match args.command {
        Command::Run { scenario } => {
            let scenario = Scenario::load(&scenario)?;
            let config = with_default_epoch(config, &scenario);
            let app = App::new(config);
            {
                let mut ctx = Context::new(&mut store, scenario.start);
                let replay = scenario::run(&app, &mut ctx, &scenario)?;
                for event in &replay.events {
                    println!("{}", serde_json::to_string(event)?);
                }
                let violations = app.check_invariants(&ctx)?;
                if !violations.is_empty() {
                    bail!("{} invariant violations after replay", violations.len());
                }
            }
            store.flush()?;
        }
        Command::Gauges { status } => {
            let app = App::new(config);
            let ctx = Context::new(&mut store, Utc::now());
            let gauges = match status {
                Some(s) => app.incentives.gauges_by_status(&ctx, s.into())?,
                None => app.incentives.gauges(&ctx)?,
            };
            println!("{}", serde_json::to_string_pretty(&gauges)?);
        }
        Command::Ledger => {
            let app = App::new(config);
            let ctx = Context::new(&mut store, Utc::now());
            println!("{}", serde_json::to_string_pretty(&app.sponsorship.distribution(&ctx)?)?);
        }
        Command::Vote { voter } => {
            let app = App::new(config);
            let ctx = Context::new(&mut store, Utc::now());
            match app.sponsorship.get_vote(&ctx, &voter)? {
                Some(vote) => println!("{}", serde_json::to_string_pretty(&vote)?),
                None => bail!("{} has not voted", voter),
            }
        }
        Command::Check => {
            let app = App::new(config);
            let ctx = Context::new(&mut store, Utc::now());
            let violations = app.check_invariants(&ctx)?;
            for v in &violations {
                println!("{}", v);
            }
            if !violations.is_empty() {
                bail!("{} invariant violations", violations.len());
            }
            info!("all invariants hold");
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => {
            info!("loading config from {}", p.display());
            Ok(Config::load(p)?)
        }
        None => Ok(Config::default()),
    }
}

/// Daily distribution epoch from the scenario start when none is configured.
fn with_default_epoch(mut config: Config, scenario: &Scenario) -> Config {
    if config.epochs.is_empty() {
        config.epochs.push(EpochInfo::new(
            config.incentives.distr_epoch_identifier.clone(),
            Duration::from_secs(86_400),
            scenario.start,
        ));
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_incentives::coins::Coins;
    use gauge_incentives::collaborators::FundsLedger;

    const DEMO: &str = include_str!("../demos/sponsored.json");

    #[test]
    fn test_demo_scenario_replays_cleanly() {
        let scenario: Scenario = serde_json::from_str(DEMO).unwrap();
        let app = App::new(with_default_epoch(Config::default(), &scenario));
        let dir = tempfile::tempdir().unwrap();
        let mut store = SledStore::open(dir.path().join("db")).unwrap();
        let mut ctx = Context::new(&mut store, scenario.start);

        let replay = scenario::run(&app, &mut ctx, &scenario).unwrap();
        assert_eq!(replay.rejected, 0);
        assert!(app.check_invariants(&ctx).unwrap().is_empty());
        // 1000 from the fixed gauge and the 40% sponsored share of 500
        assert_eq!(
            app.bank.balance(&ctx, "lp_holder").unwrap(),
            Coins::single("adym", 1_200)
        );
        assert_eq!(
            app.bank.balance(&ctx, "rolly_owner").unwrap(),
            Coins::single("adym", 300)
        );
        assert_eq!(app.incentives.gauge_status(&ctx, 1).unwrap(), GaugeStatus::Finished);
        assert_eq!(app.sponsorship.distribution(&ctx).unwrap().voting_power, 5_000);
    }
}
