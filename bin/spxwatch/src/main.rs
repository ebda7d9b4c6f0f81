mod create_levels;

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, MonitorStatus, Notifier, Result};
use discord::DiscordWebhook;
use engine::{IndexPriceClient, LevelWatcher, MarketHours, QuoteClient, Report, TrendBot};
use storage::{GitSync, LevelStore, MarketDataStore};
use strategy::{MonitorFileConfig, SignalEngine, TrendAnalyzer};

#[derive(Parser)]
#[command(name = "spxwatch", version, about = "SPX level alerts and SPY trend monitoring")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch today's levels and serve the health endpoints
    Watch,
    /// Run the moving-average trend bot
    Trend,
    /// Print a one-shot moving-average report
    Report,
    /// Author or inspect the daily levels file
    Levels {
        #[command(subcommand)]
        action: LevelsCommand,
    },
    /// Serve the health endpoints only
    Health,
}

#[derive(Subcommand)]
enum LevelsCommand {
    /// Create today's levels file interactively
    New,
    /// Show the file format and today's levels
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    let rules = MonitorFileConfig::load(&cfg.rules_path)?;
    let hours = MarketHours::from_schedule(&rules.watch)?;

    match cli.command {
        Command::Watch => watch(cfg, rules, hours).await,
        Command::Trend => trend(cfg, rules).await,
        Command::Report => report(cfg, rules).await,
        Command::Levels { action: LevelsCommand::New } => levels_new(cfg, hours),
        Command::Levels { action: LevelsCommand::Show } => levels_show(cfg, hours),
        Command::Health => {
            let status = Arc::new(RwLock::new(MonitorStatus::Stopped));
            api::serve(health_state(&cfg, &hours, status), cfg.port).await
        }
    }
}

async fn watch(cfg: Config, rules: MonitorFileConfig, hours: MarketHours) -> Result<()> {
    info!(symbol = %cfg.index_symbol, "SPX watch starting");

    // ── Shared state ──────────────────────────────────────────────────────────
    let status = Arc::new(RwLock::new(MonitorStatus::Starting));

    // ── Health server ─────────────────────────────────────────────────────────
    let api_state = health_state(&cfg, &hours, status.clone());
    let port = cfg.port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Health server stopped");
        }
    });

    // ── Watcher ───────────────────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = Arc::new(DiscordWebhook::new(
        cfg.require_webhook()?,
        format!("{} Trading Alert", cfg.index_symbol),
    )?);
    let source = Arc::new(IndexPriceClient::new(
        &cfg.index_price_url,
        cfg.index_symbol.to_lowercase(),
    )?);
    let watcher = LevelWatcher::new(
        cfg.index_symbol.clone(),
        source,
        notifier,
        LevelStore::new(&cfg.levels_dir),
        SignalEngine::new(rules.levels.clone(), cfg.index_symbol.clone()),
        hours,
        rules.watch.clone(),
        status,
    );

    watcher.run(shutdown_signal()).await
}

async fn trend(cfg: Config, rules: MonitorFileConfig) -> Result<()> {
    info!(symbol = %cfg.quote_symbol, "Trend bot starting");

    let notifier: Arc<dyn Notifier> = Arc::new(DiscordWebhook::new(
        cfg.require_webhook()?,
        format!("{} EMA/SMA Analysis", cfg.quote_symbol),
    )?);
    let source = Arc::new(QuoteClient::new(
        &cfg.quote_api_url,
        cfg.require_quote_key()?,
        cfg.quote_symbol.clone(),
    )?);
    let store = MarketDataStore::open(&cfg.data_dir)?;
    let stats = store.stats()?;
    info!(dir = %store.dir().display(), %stats, "Data store ready");

    let mut bot = TrendBot::new(
        cfg.quote_symbol.clone(),
        source,
        notifier,
        store,
        TrendAnalyzer::new(rules.trend.clone()),
    );
    if cfg.git_autocommit {
        info!("Git auto-commit enabled");
        bot = bot.with_git(GitSync::new(".", vec![cfg.data_dir.clone()]));
    }

    bot.run(shutdown_signal()).await;
    Ok(())
}

async fn report(cfg: Config, rules: MonitorFileConfig) -> Result<()> {
    let source = QuoteClient::new(
        &cfg.quote_api_url,
        cfg.require_quote_key()?,
        cfg.quote_symbol.clone(),
    )?;
    let analyzer = TrendAnalyzer::new(rules.trend.clone());

    println!("🚀 {} EMA/SMA Strategy Analysis", cfg.quote_symbol);
    println!("{}", "=".repeat(50));
    match engine::trend_bot::report(&source, &analyzer).await? {
        Report::Ready(report) => print!("{}", report.render_text(&cfg.quote_symbol, analyzer.rules())),
        Report::TooFewBars { got } => println!(
            "❌ Need at least {} data points, got {got}",
            rules.trend.min_points
        ),
    }
    Ok(())
}

fn levels_new(cfg: Config, hours: MarketHours) -> Result<()> {
    let store = LevelStore::new(&cfg.levels_dir);
    let today = hours.session_date(&hours.now());
    let path = store.path_for(today);

    println!("📅 Creating levels CSV for {}", today.format("%Y-%m-%d"));
    println!("📁 File will be saved as: {}", path.display());
    if path.exists() {
        warn!(path = %path.display(), "Levels file exists and will be replaced");
    }
    println!("{}", "=".repeat(50));

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let levels = create_levels::prompt_levels(&mut stdin.lock(), &mut stdout)?;
    if levels.is_empty() {
        println!("❌ No levels entered. CSV file not created.");
        return Ok(());
    }

    let path = store.write(today, &levels)?;
    println!("\n✅ Successfully created {}", path.display());
    println!("📊 Total levels: {}", levels.len());
    print!(
        "{}",
        create_levels::summarize(&common::LevelSet::from_levels(levels))
    );
    stdout.flush()?;
    Ok(())
}

fn levels_show(cfg: Config, hours: MarketHours) -> Result<()> {
    let store = LevelStore::new(&cfg.levels_dir);
    let today = hours.session_date(&hours.now());

    println!("📋 CSV Format:\n{}\n", create_levels::FORMAT_HELP);
    match store.load(today)? {
        Some(levels) => {
            println!("📁 {}", store.path_for(today).display());
            print!("{}", create_levels::summarize(&levels));
        }
        None => println!(
            "❌ No levels file for today ({})",
            store.path_for(today).display()
        ),
    }
    Ok(())
}

fn health_state(cfg: &Config, hours: &MarketHours, status: Arc<RwLock<MonitorStatus>>) -> api::AppState {
    api::AppState {
        service: format!("{} Monitor Bot", cfg.index_symbol),
        monitor_status: status,
        tz: hours.tz(),
        market_hours: hours.describe(),
    }
}

fn shutdown_signal() -> impl Future<Output = ()> {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    }
}
