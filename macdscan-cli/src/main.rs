//! macdscan CLI: scan, universe and inspect commands.
//!
//! Commands:
//! - `scan` — run the monthly MACD scan over the resolved universe, stream
//!   matches, print the summary and write the CSV
//! - `universe` — list the instruments a scan would cover
//! - `inspect` — print the monthly indicator table and the signal evaluation
//!   for one instrument

use anyhow::{bail, Context, Result};
use chrono::{Months, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use macdscan_core::data::{
    resolve_universe, CircuitBreaker, DataError, DividendSource, PriceSource, ResolvedUniverse,
    StaticUniverse, SyntheticProvider, TwseListing, UniverseSource, YahooProvider,
};
use macdscan_core::dividend::{summarize_dividends, DividendSummary};
use macdscan_core::domain::{InstrumentId, Market};
use macdscan_core::indicators::{IndicatorParams, IndicatorSet};
use macdscan_core::signal::{detect_latest, DetectionMode};
use macdscan_runner::{
    format_summary, format_table, run_scan, save_csv, save_json, ScanConfig, ScanObserver,
    ScanProgress, ScanResult, ScanSources, ScanStats, PRESET_NAMES,
};

#[derive(Parser)]
#[command(
    name = "macdscan",
    about = "macdscan — monthly MACD scanner for Taiwan-listed stocks"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the universe for monthly MACD signals.
    Scan {
        /// Scan the built-in preset list only.
        #[arg(long, default_value_t = false, conflicts_with = "full")]
        quick: bool,

        /// Scan every listed and OTC stock from the exchange listings (default).
        #[arg(long, default_value_t = false)]
        full: bool,

        /// Named preset: first_red, bullish_first_red, green_shrink.
        #[arg(long, conflicts_with = "config")]
        preset: Option<String>,

        /// Path to a TOML scan config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Minimum trailing dividend yield in percent (0 disables).
        #[arg(long)]
        min_yield: Option<f64>,

        /// Minimum number of confirmations.
        #[arg(long)]
        min_strength: Option<u8>,

        /// Keep matches without a dividend in the last 12 months.
        #[arg(long, default_value_t = false)]
        no_dividend_filter: bool,

        /// Worker threads (1 = sequential).
        #[arg(long)]
        workers: Option<usize>,

        /// Evaluation date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Use deterministic synthetic data instead of the network.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Universe TOML file (overrides --quick/--full).
        #[arg(long)]
        universe_file: Option<PathBuf>,

        /// Output directory for the CSV.
        #[arg(long, default_value = "output")]
        output: PathBuf,

        /// Also write the full report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the instruments a scan would cover.
    Universe {
        /// List the built-in preset list only.
        #[arg(long, default_value_t = false, conflicts_with = "full")]
        quick: bool,

        /// Resolve from the exchange listings (default).
        #[arg(long, default_value_t = false)]
        full: bool,

        /// Universe TOML file.
        #[arg(long)]
        universe_file: Option<PathBuf>,
    },
    /// Show the monthly indicators and signal evaluation for one stock.
    Inspect {
        /// Stock code (2330) or ticker (2330.TW, 6488.TWO).
        code: String,

        /// Months of history to show.
        #[arg(long, default_value_t = 24)]
        months: u32,

        /// Evaluation date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Use deterministic synthetic data instead of the network.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan {
            quick,
            full,
            preset,
            config,
            min_yield,
            min_strength,
            no_dividend_filter,
            workers,
            as_of,
            synthetic,
            universe_file,
            output,
            json,
        } => {
            let mut scan_config = load_config(preset.as_deref(), config.as_deref())?;
            if let Some(v) = min_yield {
                scan_config.filters.min_yield = v;
            }
            if let Some(v) = min_strength {
                scan_config.filters.min_strength = v;
            }
            if no_dividend_filter {
                scan_config.filters.require_dividend = false;
                scan_config.filters.min_yield = 0.0;
            }
            if let Some(v) = workers {
                scan_config.workers = v;
            }
            if let Some(date) = parse_date(as_of.as_deref())? {
                scan_config.as_of = Some(date);
            }
            scan_config.validate()?;
            run_scan_cmd(
                &scan_config,
                full_universe(quick, full),
                universe_file.as_deref(),
                synthetic,
                &output,
                json,
            )
        }
        Commands::Universe {
            quick,
            full,
            universe_file,
        } => run_universe_cmd(full_universe(quick, full), universe_file.as_deref()),
        Commands::Inspect {
            code,
            months,
            as_of,
            synthetic,
        } => run_inspect_cmd(&code, months, parse_date(as_of.as_deref())?, synthetic),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
    })
    .transpose()
}

fn load_config(preset: Option<&str>, config: Option<&Path>) -> Result<ScanConfig> {
    match (preset, config) {
        (_, Some(path)) => Ok(ScanConfig::from_file(path)?),
        (Some(name), None) => ScanConfig::preset(name)
            .with_context(|| format!("valid presets: {}", PRESET_NAMES.join(", "))),
        (None, None) => Ok(ScanConfig::default()),
    }
}

// ─── Sources ────────────────────────────────────────────────────────

/// Live or synthetic provider; both serve prices and dividends.
enum Provider {
    Live(YahooProvider),
    Synthetic(SyntheticProvider),
}

impl Provider {
    fn new(synthetic: bool, as_of: NaiveDate) -> Result<Self> {
        if synthetic {
            return Ok(Provider::Synthetic(SyntheticProvider::new(as_of)));
        }
        let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
        Ok(Provider::Live(YahooProvider::new(circuit_breaker)?))
    }

    fn sources(&self) -> ScanSources<'_> {
        match self {
            Provider::Live(p) => ScanSources::new(p, p),
            Provider::Synthetic(p) => ScanSources::new(p, p),
        }
    }
}

/// The full listings are scanned unless `--quick` asks for the preset list.
fn full_universe(quick: bool, full: bool) -> bool {
    full || !quick
}

fn resolve(full: bool, universe_file: Option<&Path>) -> Result<ResolvedUniverse> {
    if let Some(path) = universe_file {
        let file = StaticUniverse::from_file(path)?;
        return Ok(resolve_universe(&[&file], None)?);
    }
    let preset = StaticUniverse::preset();
    if full {
        let listings = vec![
            TwseListing::new(Market::Primary),
            TwseListing::new(Market::Secondary),
        ];
        resolve_listings(listings, &preset)
    } else {
        Ok(resolve_universe(&[&preset], None)?)
    }
}

/// Resolve from the listings that could be built, falling back to `preset`.
fn resolve_listings<S: UniverseSource>(
    builds: Vec<Result<S, DataError>>,
    preset: &StaticUniverse,
) -> Result<ResolvedUniverse> {
    let mut listings = Vec::with_capacity(builds.len());
    for build in builds {
        match build {
            Ok(source) => listings.push(source),
            Err(e) => tracing::warn!(error = %e, "universe source unavailable, skipping"),
        }
    }
    let sources: Vec<&dyn UniverseSource> =
        listings.iter().map(|s| s as &dyn UniverseSource).collect();
    Ok(resolve_universe(&sources, Some(preset))?)
}

// ─── scan ───────────────────────────────────────────────────────────

/// Prints matches as they are found and a progress line every few instruments.
struct ConsoleObserver;

impl ScanObserver for ConsoleObserver {
    fn on_progress(&self, p: &ScanProgress) {
        if p.index % 25 == 0 || p.index == p.total {
            eprintln!(
                "  [{}/{}] {:>5.1}%  found {}",
                p.index,
                p.total,
                p.fraction() * 100.0,
                p.found
            );
        }
    }

    fn on_match(&self, r: &ScanResult, found: usize) {
        println!(
            "  #{found:<3} {:<10} {:<12} strength {}  yield {:.2}%  ({})",
            r.instrument.symbol(),
            r.instrument.display_name(),
            r.strength(),
            r.dividend.yield_pct,
            r.signal.confirmation_summary()
        );
    }

    fn on_complete(&self, stats: &ScanStats) {
        eprintln!("  done: {}/{} processed", stats.processed, stats.total);
    }
}

fn run_scan_cmd(
    config: &ScanConfig,
    full: bool,
    universe_file: Option<&Path>,
    synthetic: bool,
    output: &Path,
    json: bool,
) -> Result<()> {
    let universe = resolve(full, universe_file)?;
    let config = config.pinned();
    let provider = Provider::new(synthetic, config.resolved_as_of())?;

    println!(
        "Scanning {} instruments ({}) for {} as of {}",
        universe.instruments.len(),
        universe.sources.join(" + "),
        config.mode,
        config.resolved_as_of()
    );

    let report = run_scan(
        &config,
        &universe.instruments,
        provider.sources(),
        &ConsoleObserver,
        None,
    )?;

    println!();
    if report.is_empty() {
        println!(
            "No matches for {} ({} instruments, {:.1}s).",
            report.mode,
            report.stats.processed,
            report.elapsed.as_secs_f64()
        );
        return Ok(());
    }

    print!("{}", format_table(&report.results));
    println!();
    println!("{}", format_summary(&report));

    let csv_path = save_csv(&report.results, output)?;
    println!("CSV written to {}", csv_path.display());
    if json {
        let json_path = save_json(&report, output)?;
        println!("JSON written to {}", json_path.display());
    }
    Ok(())
}

// ─── universe ───────────────────────────────────────────────────────

fn run_universe_cmd(full: bool, universe_file: Option<&Path>) -> Result<()> {
    let universe = resolve(full, universe_file)?;
    for id in &universe.instruments {
        println!("{}\t{}\t{}", id.symbol(), id.market.label(), id.name);
    }
    let secondary = universe
        .instruments
        .iter()
        .filter(|id| id.market == Market::Secondary)
        .count();
    eprintln!(
        "{} instruments ({} listed, {} OTC) from {}{}",
        universe.instruments.len(),
        universe.instruments.len() - secondary,
        secondary,
        universe.sources.join(" + "),
        if universe.used_fallback { " (fallback)" } else { "" }
    );
    Ok(())
}

// ─── inspect ────────────────────────────────────────────────────────

fn parse_instrument(code: &str) -> Result<InstrumentId> {
    if code.contains('.') {
        return Ok(InstrumentId::parse(code)?);
    }
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("invalid stock code '{code}'");
    }
    Ok(InstrumentId::new(code, Market::Primary, ""))
}

fn run_inspect_cmd(code: &str, months: u32, as_of: Option<NaiveDate>, synthetic: bool) -> Result<()> {
    let id = parse_instrument(code)?;
    let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
    let start = as_of
        .checked_sub_months(Months::new(months))
        .context("--months reaches before the supported date range")?;
    let provider = Provider::new(synthetic, as_of)?;
    let ScanSources { prices, dividends } = provider.sources();

    let series = prices
        .fetch_monthly(&id, start, as_of)
        .with_context(|| format!("failed to fetch monthly bars for {}", id.symbol()))?;
    let indicators = IndicatorSet::compute(&series, &IndicatorParams::default());

    println!("{} monthly, {} bars to {}", id.symbol(), series.len(), series.latest().date);
    println!(
        "{:<10} {:>9} {:>9} {:>9} {:>9} {:>7} {:>7} {:>7}",
        "period", "close", "macd", "signal", "hist", "K", "D", "RSI"
    );
    for (bar, p) in series.bars().iter().zip(indicators.points()) {
        println!(
            "{:<10} {:>9.2} {:>9.4} {:>9.4} {:>9.4} {:>7.2} {:>7.2} {:>7.2}",
            bar.date.to_string(),
            bar.close,
            p.macd,
            p.signal,
            p.histogram,
            p.k,
            p.d,
            p.rsi
        );
    }
    println!();

    if let Err(e) = series.ensure_min_history() {
        println!("Not evaluated: {e}");
        return Ok(());
    }

    for mode in [DetectionMode::FirstBullishCrossover, DetectionMode::BearishShrink] {
        match detect_latest(mode, &indicators) {
            Some(hit) => {
                let extra = match hit.shrink_percent() {
                    Some(pct) => format!("shrink {pct:.1}%"),
                    None => format!("magnitude {:.4}", hit.sort_magnitude()),
                };
                println!(
                    "{mode:<24} MATCH  strength {}/{}  {extra}  level {}  ({})",
                    hit.strength(),
                    mode.max_strength(),
                    hit.level,
                    hit.confirmation_summary()
                );
            }
            None => println!("{mode:<24} no match"),
        }
    }

    let dividend = match dividends.fetch_dividends(&id) {
        Ok(events) => {
            let close = prices
                .fetch_recent_close(&id, as_of)
                .unwrap_or(series.latest().close);
            summarize_dividends(&events, close, as_of)
        }
        Err(e) => {
            tracing::warn!(error = %e, "dividends unavailable");
            DividendSummary::unavailable()
        }
    };
    println!(
        "dividends (12m): {:.2}  yield {:.2}%",
        dividend.trailing_total, dividend.yield_pct
    );
    Ok(())
}
