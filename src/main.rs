use carstore::protocol::EMPTY_ENVELOPE;
use carstore::{Config, FileTransport, Inventory, Response, Service, SortKey, Status};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "carstore")]
#[command(about = "CarStore - Rental car inventory daemon driven through command/result files")]
#[command(version)]
struct Cli {
    /// Path to a YAML config file (default: <config dir>/carstore/carstore.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the command loop until interrupted
    Serve,

    /// Print the inventory
    List {
        /// Order by name, price or rating
        #[arg(short, long)]
        sort: Option<SortKey>,

        /// Descending order
        #[arg(long, requires = "sort")]
        desc: bool,
    },

    /// Submit one command through the command file and print the response
    Send {
        /// Action name, e.g. GET_ALL_CARS
        action: String,

        /// Extra command fields as a JSON object
        #[arg(short, long)]
        body: Option<String>,

        /// Seconds to wait for the response
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => serve(&config),
        Commands::List { sort, desc } => list(&config, sort, !desc),
        Commands::Send { action, body, timeout } => send(&config, &action, body.as_deref(), Duration::from_secs(timeout)),
    }
}

fn serve(config: &Config) -> Result<()> {
    let inventory = Inventory::open(&config.data_file, config.seed_on_first_run)?;

    let mut transport = FileTransport::new(&config.command_file, &config.result_file);
    if config.watch {
        transport = transport.with_watcher();
    }
    transport.initialize()?;

    println!("CarStore is running with {} cars.", inventory.len());
    println!("Waiting for commands in {}. Press Ctrl+C to stop.", config.command_file.display());

    let mut service = Service::new(inventory, transport, config.backoff());
    service.run()
}

fn list(config: &Config, sort: Option<SortKey>, ascending: bool) -> Result<()> {
    let inventory = Inventory::open(&config.data_file, false)?;
    let vehicles = match sort {
        Some(key) => inventory.sort(key, ascending),
        None => inventory.get_all(),
    };

    println!(
        "{:<20} {:<14} {:>6} {:>10}  {}",
        "NAME".bold(),
        "TYPE".bold(),
        "RATING".bold(),
        "PRICE".bold(),
        "STATUS".bold()
    );
    for v in &vehicles {
        let status = if v.available { "available".green() } else { "rented".red() };
        println!("{:<20} {:<14} {:>6.1} {:>10.2}  {}", v.name, v.vehicle_type, v.rating, v.price, status);
    }
    println!("{} cars", vehicles.len());
    Ok(())
}

fn send(config: &Config, action: &str, body: Option<&str>, timeout: Duration) -> Result<()> {
    let mut command = match body {
        Some(text) => match serde_json::from_str(text).context("Invalid --body JSON")? {
            Value::Object(map) => map,
            _ => return Err(eyre!("--body must be a JSON object")),
        },
        None => serde_json::Map::new(),
    };

    let id = uuid::Uuid::now_v7().to_string();
    command.insert("id".into(), Value::String(id.clone()));
    command.insert("action".into(), Value::String(action.to_string()));

    fs::write(&config.command_file, serde_json::to_string(&command)?)
        .with_context(|| format!("Failed to write {}", config.command_file.display()))?;

    let response = wait_for_result(config, &id, timeout)?;
    let status = match response.status {
        Status::Success => "success".green(),
        Status::Error => "error".red(),
    };
    println!("{} {}", status.bold(), response.id);
    println!("{}", response.to_pretty_json()?);
    Ok(())
}

fn wait_for_result(config: &Config, id: &str, timeout: Duration) -> Result<Response> {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        // A stale or half-written result just means "not yet"
        match read_result(config) {
            Some(response) if response.id == id => return Ok(response),
            _ => thread::sleep(Duration::from_millis(100)),
        }
    }

    Err(eyre!("No response for command {} within {:?}", id, timeout))
}

fn read_result(config: &Config) -> Option<Response> {
    let text = fs::read_to_string(&config.result_file).ok()?;
    if text.trim() == EMPTY_ENVELOPE {
        return None;
    }
    serde_json::from_str(&text).ok()
}
