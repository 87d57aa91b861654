//! Operator harness for the `payproof` library.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};

use payproof::config::Config;
use payproof::document::flatten::flatten;
use payproof::document::layout::{JsonLayoutExtractor, Layout};
use payproof::fetch::transport::CapturedMessage;
use payproof::pipeline::{read_notification, Pipeline};

#[derive(Parser)]
#[command(
    name = "payproof",
    version,
    about = "Parse proof-of-payment notifications from extracted document layouts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to $PAYPROOF_CONFIG or the user config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the flattened token stream of a layout JSON file
    Flatten { path: PathBuf },
    /// Parse a layout JSON file as a payment notification
    Parse {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Replay a captured message and parse its PDF attachments
    Message {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => payproof::config::load_config_from(path)?,
        None => payproof::config::load_config(),
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Flatten { path } => cmd_flatten(&path),
        Commands::Parse { path, json } => cmd_parse(&path, json),
        Commands::Message { path, json } => cmd_message(&path, json, &config),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = payproof::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "payproof.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn read_layout(path: &Path) -> anyhow::Result<Layout> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(Layout::from_json(&json)?)
}

fn cmd_flatten(path: &Path) -> anyhow::Result<()> {
    let document = flatten(&read_layout(path)?)?;
    println!("{document}");
    Ok(())
}

fn cmd_parse(path: &Path, json: bool) -> anyhow::Result<()> {
    let report = read_notification(&read_layout(path)?)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let n = &report.notification;
    println!("Title:      {}", n.header.title);
    println!("Trace ID:   {}", n.trace_id);
    println!("Date:       {}", n.date);
    println!("Payer:      {} ({})", n.payer.name, n.payer.kind);
    println!("Account:    {}", n.payer.account);
    println!("Amount:     {}", n.amount);
    println!("Payment:    {}", n.payment);
    println!("Bank:       {} / {}", n.bank, n.branch);
    println!("Reference:  {}", n.reference);
    Ok(())
}

fn cmd_message(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let captured = CapturedMessage::from_json(&text)?;
    let transport = captured.transport();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let processed = runtime.block_on(async {
        Pipeline::new(&transport, &JsonLayoutExtractor, config)
            .process(&captured.structure, captured.internal_date)
            .await
    })?;

    let header = processed.message.header();
    if json {
        let outcomes: Vec<_> = processed
            .notifications
            .iter()
            .map(|o| match &o.result {
                Ok(report) => serde_json::json!({ "index": o.index, "name": o.name, "report": report }),
                Err(e) => serde_json::json!({ "index": o.index, "name": o.name, "error": e.to_string() }),
            })
            .collect();
        let out = serde_json::json!({ "header": header, "notifications": outcomes });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("From:        {}", header.from);
    println!("Subject:     {}", header.subject);
    println!("Attachments: {}", processed.message.attachments().len());
    for outcome in &processed.notifications {
        match &outcome.result {
            Ok(report) => println!(
                "  [{}] {}: trace {} ref {} amount {}",
                outcome.index,
                outcome.name,
                report.notification.trace_id,
                report.notification.reference,
                report.notification.amount
            ),
            Err(e) => println!("  [{}] {}: {e}", outcome.index, outcome.name),
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "payproof", &mut std::io::stdout());
    Ok(())
}
