use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use radar_config::{load_config, AppConfig, RankingPolicy};
use radar_core::TickerId;
use radar_data::{
    CachedUniverse, CodeRangeClassifier, CodeRangeUniverse, CsvDirectorySupplier,
    HistoricalDataSupplier, RateLimiter, StaticUniverse, UniverseSource, YahooChartSupplier,
};
use radar_paper::{AccountStore, Fill, SqliteAccountStore};
use radar_screener::{ScanOutcome, Screener};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::output;
use crate::telemetry::init_tracing;

#[derive(Parser)]
#[command(author, version, about = "Breakout screener and paper-trading desk")]
pub struct Cli {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, global = true, default_value = "config")]
    config: PathBuf,
    /// Configuration environment to layer over the defaults
    #[arg(long, global = true, env = "RADAR_ENV", default_value = "default")]
    env: String,
    /// Access code checked against the configured allow-list
    #[arg(long, global = true, env = "RADAR_ACCESS_CODE", hide_env_values = true)]
    access_code: Option<String>,
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Screen a universe for breakout candidates
    Scan(ScanArgs),
    /// Inspect or trade a paper account
    Account {
        /// Account database, overriding `paper.store_path`
        #[arg(long)]
        store: Option<PathBuf>,
        #[command(subcommand)]
        action: AccountCommand,
    },
}

#[derive(Args)]
pub struct ScanArgs {
    /// Read `<ticker>.csv` files from this directory
    #[arg(long, conflicts_with = "yahoo")]
    data_dir: Option<PathBuf>,
    /// Fetch daily bars from the Yahoo chart endpoint
    #[arg(long)]
    yahoo: bool,
    /// Comma-separated tickers; defaults to the directory listing or configured ranges
    #[arg(long, value_delimiter = ',')]
    tickers: Vec<TickerId>,
    /// Maximum number of candidates returned
    #[arg(long)]
    cap: Option<usize>,
    #[arg(long, value_enum)]
    ranking: Option<RankingArg>,
    /// Seed for `--ranking random`
    #[arg(long)]
    seed: Option<u64>,
    /// Require the long average to be rising
    #[arg(long)]
    trend_gate: bool,
    /// Require the close to be above the weekly average
    #[arg(long)]
    weekly_gate: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RankingArg {
    Volume,
    Unordered,
    Random,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum AccountCommand {
    /// Print balance and holdings
    Show(UserArgs),
    /// Buy round lots at a given price
    Buy(TradeArgs),
    /// Sell round lots at a given price
    Sell(TradeArgs),
    /// Restore starting capital and clear history
    Reset(UserArgs),
    /// Sell every holding at its average cost
    Liquidate(UserArgs),
}

#[derive(Args)]
pub struct UserArgs {
    #[arg(long)]
    user: String,
}

#[derive(Args)]
pub struct TradeArgs {
    #[arg(long)]
    user: String,
    #[arg(long)]
    ticker: TickerId,
    #[arg(long)]
    lots: u64,
    #[arg(long)]
    price: Decimal,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config, Some(cli.env.as_str()))?;
    let _guard = init_tracing(&config.logging, cli.verbose)?;
    if !config.access.is_enabled() {
        warn!("access gate disabled: no codes configured under [access]");
    }
    if !config.access.permits(cli.access_code.as_deref()) {
        warn!("rejected command without a valid access code");
        bail!("access denied: supply a valid --access-code");
    }

    match cli.command {
        Commands::Scan(args) => run_scan(args, config).await,
        Commands::Account { store, action } => {
            let path = store.unwrap_or_else(|| config.paper.store_path.clone());
            let store = SqliteAccountStore::new(&path)
                .with_context(|| format!("failed to open account store {}", path.display()))?;
            run_account(action, &store, config.paper.starting_cash)
        }
    }
}

async fn run_scan(args: ScanArgs, config: AppConfig) -> Result<()> {
    let mut screen = config.screen.clone();
    if let Some(cap) = args.cap {
        screen.result_cap = Some(cap);
    }
    if let Some(ranking) = args.ranking {
        screen.ranking = match ranking {
            RankingArg::Volume => RankingPolicy::VolumeDescending,
            RankingArg::Unordered => RankingPolicy::Unordered,
            RankingArg::Random => RankingPolicy::RandomSample { seed: args.seed },
        };
    }
    screen.use_trend_rising_gate |= args.trend_gate;
    screen.use_weekly_trend_gate |= args.weekly_gate;

    let supplier: Arc<dyn HistoricalDataSupplier>;
    let universe: Box<dyn UniverseSource>;
    match (&args.data_dir, args.yahoo) {
        (Some(dir), _) => {
            let csv = CsvDirectorySupplier::new(dir);
            let tickers = if args.tickers.is_empty() {
                csv.tickers()
                    .with_context(|| format!("failed to list {}", dir.display()))?
            } else {
                args.tickers.clone()
            };
            supplier = Arc::new(csv);
            universe = Box::new(classified(tickers));
        }
        (None, true) => {
            supplier = Arc::new(
                YahooChartSupplier::new(config.fetch.yahoo_base_url.clone())
                    .with_limiter(RateLimiter::per_second(config.fetch.requests_per_second))
                    .with_max_in_flight(config.fetch.max_requests_in_flight),
            );
            universe = if args.tickers.is_empty() {
                Box::new(CachedUniverse::new(
                    CodeRangeUniverse::from_settings(&config.universe),
                    Duration::from_secs(config.universe.cache_ttl_secs),
                ))
            } else {
                Box::new(classified(args.tickers.clone()))
            };
        }
        (None, false) => bail!("choose a data source with --data-dir DIR or --yahoo"),
    }

    let screener = Screener::new(supplier).with_fetch_settings(&config.fetch);
    let token = screener.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling scan");
            token.cancel();
        }
    });
    let mut progress = screener.progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = *progress.borrow();
            debug!(
                completed = snapshot.completed_batches,
                total = snapshot.total_batches,
                candidates = snapshot.candidates_found,
                "scan progress"
            );
            if snapshot.finished {
                break;
            }
        }
    });

    let outcome = screener.scan_universe(universe.as_ref(), &screen).await?;
    report(&outcome, args.format)
}

fn classified(tickers: Vec<TickerId>) -> StaticUniverse {
    StaticUniverse::new(tickers).with_classifier(Arc::new(CodeRangeClassifier))
}

fn report(outcome: &ScanOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print!("{}", output::scan_table(outcome)),
        OutputFormat::Json => println!("{}", output::scan_json(outcome)?),
    }
    Ok(())
}

fn run_account(
    action: AccountCommand,
    store: &dyn AccountStore,
    starting_cash: Decimal,
) -> Result<()> {
    let (user, next) = match action {
        AccountCommand::Show(args) => {
            let account = store.load_or_create(&args.user, starting_cash)?;
            print!("{}", output::account_summary(&account));
            return Ok(());
        }
        AccountCommand::Buy(trade) => {
            let account = store.load_or_create(&trade.user, starting_cash)?;
            let next = account.apply_fill(Fill::buy(trade.ticker.clone(), trade.lots, trade.price))?;
            println!(
                "bought {} lots of {} at {}",
                trade.lots, trade.ticker, trade.price
            );
            (trade.user, next)
        }
        AccountCommand::Sell(trade) => {
            let account = store.load_or_create(&trade.user, starting_cash)?;
            let next =
                account.apply_fill(Fill::sell(trade.ticker.clone(), trade.lots, trade.price))?;
            println!("sold {} lots of {} at {}", trade.lots, trade.ticker, trade.price);
            (trade.user, next)
        }
        AccountCommand::Reset(args) => {
            let account = store.load_or_create(&args.user, starting_cash)?;
            println!("reset account {}", args.user);
            (args.user, account.reset())
        }
        AccountCommand::Liquidate(args) => {
            let account = store.load_or_create(&args.user, starting_cash)?;
            let next = account.liquidate_at_cost()?;
            println!(
                "liquidated {} holdings for {}",
                account.holdings.len(),
                args.user
            );
            (args.user, next)
        }
    };
    store.save(&next)?;
    info!(user = %user, cash = %next.cash, "account updated");
    println!("cash: {}", next.cash);
    Ok(())
}
