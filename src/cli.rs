//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::cached_adapter::CachedDataPort;
use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::aggregate::{aggregate_with, JoinPolicy};
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult, Target};
use crate::domain::compare::{relative_performance, RelativeSeries};
use crate::domain::config_validation::{
    parse_date, portfolio_sections, validate_backtest_config, validate_data_config,
    validate_date_range, validate_portfolios, DEFAULT_END_DATE, DEFAULT_START_DATE, PORTFOLIO_SECTION_PREFIX,
};
use crate::domain::error::EtfHelperError;
use crate::domain::plan::PlanMode;
use crate::domain::portfolio::{PortfolioBuilder, PortfolioLibrary};
use crate::domain::price_series::PriceSeries;
use crate::domain::tickers::parse_tickers;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_TICKER: &str = "SPY";

#[derive(Parser, Debug)]
#[command(name = "etfhelper", about = "ETF investment backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate a lump-sum or monthly investment
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, conflicts_with = "portfolio")]
        ticker: Option<String>,
        #[arg(long)]
        portfolio: Option<String>,
        #[arg(long)]
        mode: Option<PlanMode>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the close of a ticker on one date
    Price {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Compare normalized returns of several tickers
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tickers: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List portfolios defined in the config
    Portfolios {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List tickers available from the data source
    ListTickers {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct BacktestOverrides {
    pub ticker: Option<String>,
    pub portfolio: Option<String>,
    pub mode: Option<PlanMode>,
    pub amount: Option<f64>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            ticker,
            portfolio,
            mode,
            amount,
            output,
            dry_run,
        } => {
            let overrides = BacktestOverrides {
                ticker,
                portfolio,
                mode,
                amount,
            };
            if dry_run {
                run_dry_run(&config, &overrides)
            } else {
                run_backtest(&config, &overrides, output.as_ref())
            }
        }
        Command::Price {
            config,
            ticker,
            date,
        } => run_price(&config, ticker.as_deref(), date),
        Command::Compare {
            config,
            tickers,
            output,
        } => run_compare(&config, tickers.as_deref(), output.as_ref()),
        Command::Portfolios { config } => run_portfolios(&config),
        Command::ListTickers { config } => run_list_tickers(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = EtfHelperError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: EtfHelperError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    overrides: &BacktestOverrides,
) -> Result<BacktestConfig, EtfHelperError> {
    let start_date = parse_date(adapter, "backtest", "start_date", DEFAULT_START_DATE)?;
    let end_date = parse_date(adapter, "backtest", "end_date", DEFAULT_END_DATE)?;

    let mode = match overrides.mode {
        Some(mode) => mode,
        None => match adapter.get_string("backtest", "mode") {
            Some(raw) => raw.parse::<PlanMode>().map_err(|reason| EtfHelperError::ConfigInvalid {
                section: "backtest".into(),
                key: "mode".into(),
                reason,
            })?,
            None => PlanMode::Recurring,
        },
    };
    let amount = overrides
        .amount
        .unwrap_or_else(|| adapter.get_double("backtest", "amount", mode.default_amount()));
    let plan = mode.with_amount(amount);
    plan.validate()?;

    let join = match adapter.get_string("backtest", "join") {
        Some(raw) => raw.parse::<JoinPolicy>().map_err(|reason| EtfHelperError::ConfigInvalid {
            section: "backtest".into(),
            key: "join".into(),
            reason,
        })?,
        None => JoinPolicy::default(),
    };

    Ok(BacktestConfig {
        start_date,
        end_date,
        target: resolve_target(overrides, adapter),
        plan,
        join,
    })
}

pub fn resolve_target(overrides: &BacktestOverrides, config: &dyn ConfigPort) -> Target {
    if let Some(t) = overrides.ticker.as_deref().filter(|t| !t.trim().is_empty()) {
        return Target::Ticker(t.trim().to_uppercase());
    }
    if let Some(p) = overrides.portfolio.as_deref().filter(|p| !p.trim().is_empty()) {
        return Target::Portfolio(p.trim().to_lowercase());
    }
    if let Some(t) = config
        .get_string("backtest", "ticker")
        .filter(|t| !t.trim().is_empty())
    {
        return Target::Ticker(t.trim().to_uppercase());
    }
    if let Some(p) = config
        .get_string("backtest", "portfolio")
        .filter(|p| !p.trim().is_empty())
    {
        return Target::Portfolio(p.trim().to_lowercase());
    }
    Target::Ticker(DEFAULT_TICKER.to_string())
}

/// Builds the library from every `[portfolio.<name>]` section.
pub fn load_portfolios(config: &dyn ConfigPort) -> Result<PortfolioLibrary, EtfHelperError> {
    validate_portfolios(config)?;
    let mut library = PortfolioLibrary::new();
    for section in portfolio_sections(config) {
        let name = &section[PORTFOLIO_SECTION_PREFIX.len()..];
        let mut builder = PortfolioBuilder::new();
        for key in config.keys(&section) {
            let weight = config.get_double(&section, &key, 0.0);
            builder.add(&key, weight)?;
        }
        library.submit(name, &mut builder)?;
    }
    Ok(library)
}

pub fn build_data_port(config: &dyn ConfigPort) -> Result<Box<dyn PriceDataPort>, EtfHelperError> {
    validate_data_config(config)?;
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .trim()
        .to_lowercase();

    if source == "sqlite" {
        #[cfg(feature = "sqlite")]
        {
            use crate::adapters::sqlite_adapter::SqlitePriceAdapter;
            return Ok(Box::new(SqlitePriceAdapter::from_config(config)?));
        }
        #[cfg(not(feature = "sqlite"))]
        {
            return Err(EtfHelperError::ConfigInvalid {
                section: "data".into(),
                key: "source".into(),
                reason: "sqlite feature is not enabled".into(),
            });
        }
    }

    let dir = config.get_string("data", "csv_dir").unwrap_or_default();
    Ok(Box::new(CsvPriceAdapter::new(PathBuf::from(dir.trim()))))
}

/// Price series for the backtest target: the ticker's closes, or the
/// weighted portfolio series.
pub fn fetch_target_series(
    data_port: &dyn PriceDataPort,
    library: &PortfolioLibrary,
    config: &BacktestConfig,
) -> Result<PriceSeries, EtfHelperError> {
    match &config.target {
        Target::Ticker(ticker) => {
            let series = data_port.fetch(ticker, config.start_date, config.end_date)?;
            if series.is_empty() {
                warn!("{ticker}: no data between {} and {}", config.start_date, config.end_date);
            }
            Ok(series)
        }
        Target::Portfolio(name) => {
            let spec = library.get(name)?;
            let mut series_by_ticker = HashMap::new();
            for ticker in spec.tickers() {
                let series = data_port.fetch(ticker, config.start_date, config.end_date)?;
                if series.is_empty() {
                    warn!("{ticker}: no data, contributes nothing to portfolio {name}");
                } else {
                    info!("  {}: {} closes", ticker, series.len());
                }
                series_by_ticker.insert(ticker.to_string(), series);
            }
            aggregate_with(spec, &series_by_ticker, config.join)
        }
    }
}

fn run_backtest(
    config_path: &Path,
    overrides: &BacktestOverrides,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    info!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }

    let bt_config = match build_backtest_config(&adapter, overrides) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let library = match load_portfolios(&adapter) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };
    let data_port = match build_data_port(&adapter) {
        Ok(p) => CachedDataPort::new(p),
        Err(e) => return fail(e),
    };

    let output = output_path
        .map(|p| p.display().to_string())
        .or_else(|| adapter.get_string("report", "output"));

    run_backtest_pipeline(&data_port, &library, &bt_config, output.as_deref())
}

pub fn run_backtest_pipeline(
    data_port: &dyn PriceDataPort,
    library: &PortfolioLibrary,
    bt_config: &BacktestConfig,
    output_path: Option<&str>,
) -> ExitCode {
    let series = match fetch_target_series(data_port, library, bt_config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    info!(
        "Running {} backtest: {} closes, {} to {}",
        bt_config.plan.mode(),
        series.len(),
        bt_config.start_date,
        bt_config.end_date,
    );

    let result = match backtest_engine::run_window(
        &series,
        &bt_config.plan,
        bt_config.start_date,
        bt_config.end_date,
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_summary(&result);

    if let Some(path) = output_path {
        if let Err(e) = CsvReportAdapter.write_backtest(&result, path) {
            return fail(e);
        }
        eprintln!("\nSchedule written to: {}", path);
    }
    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult) {
    eprintln!("\n=== Backtest Results ===");
    match result {
        BacktestResult::LumpSum(o) => {
            eprintln!("Invested:         {:.0}", o.amount);
            eprintln!(
                "Bought:           {:.4} units at {:.2} on {}",
                o.units, o.purchase.close, o.purchase.date
            );
            eprintln!(
                "Valued:           {:.2} on {}",
                o.valuation.close, o.valuation.date
            );
            eprintln!("Final Value:      {:.0}", o.final_value.round());
            eprintln!("Return:           {:.2}%", o.return_pct);
        }
        BacktestResult::Recurring(o) => {
            eprintln!("Months:           {}", o.months());
            eprintln!("Final Value:      {:.0}", o.final_value().round());
            eprintln!("Total Invested:   {:.0}", o.total_contributed().round());
            eprintln!("Return:           {:.2}%", o.return_pct());
            if !o.skipped.is_empty() {
                eprintln!("Skipped Months:   {} (no price data yet)", o.skipped.len());
            }
        }
    }
}

pub fn run_dry_run(config_path: &Path, overrides: &BacktestOverrides) -> ExitCode {
    info!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_data_config(&adapter) {
        return fail(e);
    }
    let bt_config = match build_backtest_config(&adapter, overrides) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let library = match load_portfolios(&adapter) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };

    eprintln!("Config validated successfully");
    eprintln!("\nBacktest:");
    eprintln!("  range:  {} to {}", bt_config.start_date, bt_config.end_date);
    eprintln!(
        "  plan:   {} {}",
        bt_config.plan.mode(),
        bt_config.plan.amount()
    );
    match &bt_config.target {
        Target::Ticker(t) => eprintln!("  target: {}", t),
        Target::Portfolio(name) => {
            let spec = match library.get(name) {
                Ok(s) => s,
                Err(e) => return fail(e),
            };
            eprintln!("  target: portfolio {} (join: {})", name, bt_config.join);
            for (ticker, weight) in spec.weights() {
                eprintln!("    {}: {}", ticker, weight);
            }
        }
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

/// Close of the backtest target on `date` when it was a trading day. A
/// portfolio target is looked up on its weighted series. `date` must lie
/// inside the configured window.
pub fn lookup_close(
    data_port: &dyn PriceDataPort,
    library: &PortfolioLibrary,
    bt_config: &BacktestConfig,
    date: NaiveDate,
) -> Result<Option<f64>, EtfHelperError> {
    let (start, end) = (bt_config.start_date, bt_config.end_date);
    if date < start || date > end {
        return Err(EtfHelperError::ConfigInvalid {
            section: "price".into(),
            key: "date".into(),
            reason: format!("{date} is outside {start} to {end}"),
        });
    }
    let series = fetch_target_series(data_port, library, bt_config)?;
    Ok(series.close_on(date))
}

fn target_label(target: &Target) -> String {
    match target {
        Target::Ticker(t) => t.clone(),
        Target::Portfolio(name) => format!("portfolio {name}"),
    }
}

fn run_price(config_path: &Path, ticker: Option<&str>, date: NaiveDate) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    let bt_config = match build_backtest_config(
        &adapter,
        &BacktestOverrides {
            ticker: ticker.map(str::to_string),
            ..Default::default()
        },
    ) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let library = match load_portfolios(&adapter) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let label = target_label(&bt_config.target);
    match lookup_close(data_port.as_ref(), &library, &bt_config, date) {
        Ok(Some(close)) => {
            println!("{} {}: {:.2}", label, date, close);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!(
                "{} {}: market closed that day, or not listed yet",
                label, date
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn resolve_compare_tickers(
    cli_tickers: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, EtfHelperError> {
    let raw = cli_tickers
        .map(str::to_string)
        .or_else(|| config.get_string("compare", "tickers"))
        .unwrap_or_else(|| DEFAULT_TICKER.to_string());
    parse_tickers(&raw).map_err(|e| EtfHelperError::ConfigInvalid {
        section: "compare".into(),
        key: "tickers".into(),
        reason: e.to_string(),
    })
}

pub fn run_compare_pipeline(
    data_port: &dyn PriceDataPort,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<RelativeSeries>, EtfHelperError> {
    let mut series_by_ticker = HashMap::new();
    for ticker in tickers {
        let series = data_port.fetch(ticker, start, end)?;
        series_by_ticker.insert(ticker.clone(), series);
    }
    relative_performance(&series_by_ticker, start)
}

fn run_compare(config_path: &Path, tickers: Option<&str>, output: Option<&PathBuf>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_date_range(&adapter) {
        return fail(e);
    }
    let (start, end) = match (
        parse_date(&adapter, "backtest", "start_date", DEFAULT_START_DATE),
        parse_date(&adapter, "backtest", "end_date", DEFAULT_END_DATE),
    ) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(e), _) | (_, Err(e)) => return fail(e),
    };
    let tickers = match resolve_compare_tickers(tickers, &adapter) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    info!("Comparing {} from {} to {}", tickers.join(", "), start, end);
    let relative = match run_compare_pipeline(data_port.as_ref(), &tickers, start, end) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    if relative.is_empty() {
        return fail(EtfHelperError::EmptySeries);
    }

    eprintln!("\n=== Relative Performance ===");
    for rel in &relative {
        eprintln!(
            "  {}: base {:.2} on {}, now x{:.3} ({:+.2}%)",
            rel.ticker,
            rel.base_close,
            rel.base_date,
            rel.final_ratio().unwrap_or(1.0),
            rel.return_pct().unwrap_or(0.0),
        );
    }

    let output = output
        .map(|p| p.display().to_string())
        .or_else(|| adapter.get_string("compare", "output"));
    if let Some(path) = output {
        if let Err(e) = CsvReportAdapter.write_comparison(&relative, &path) {
            return fail(e);
        }
        eprintln!("\nComparison written to: {}", path);
    }
    ExitCode::SUCCESS
}

fn run_portfolios(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let library = match load_portfolios(&adapter) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };

    if library.is_empty() {
        eprintln!("No portfolios defined");
        return ExitCode::SUCCESS;
    }
    for (name, spec) in library.iter() {
        println!("{}", name);
        let normalized = match spec.normalized() {
            Ok(n) => n,
            Err(e) => return fail(e),
        };
        for (ticker, share) in normalized {
            println!("  {}: {:.1}%", ticker, share * 100.0);
        }
    }
    eprintln!("{} portfolios found", library.len());
    ExitCode::SUCCESS
}

fn run_list_tickers(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let tickers = match data_port.list_tickers() {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    if tickers.is_empty() {
        eprintln!("No tickers found");
    } else {
        for ticker in &tickers {
            println!("{}", ticker);
        }
        eprintln!("{} tickers found", tickers.len());
    }
    ExitCode::SUCCESS
}
