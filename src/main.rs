use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use agenda::client::HttpContactService;
use agenda::config::{self, Config};
use agenda::controller::Controller;
use agenda::search;
use agenda::server;
use agenda::store::Store;
use agenda::ui::app::App;

const LOG_FILE_NAME: &str = "agenda.log";

#[derive(Parser, Debug)]
#[command(name = "agenda", version, about = "Contact book service and terminal client")]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/agenda/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP contact service
    Serve(ServeArgs),
    /// Print the stored contacts, favorites first (tab-separated)
    List(ListArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long)]
    port: Option<u16>,

    /// Store file (overrides `store_path`)
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Filter by first name or surname (case-insensitive)
    query: Option<String>,

    /// Store file (overrides `store_path`)
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(args)) => {
            init_stderr_logging();
            let config = config::load(cli.config.as_deref())?;
            handle_serve(args, config)
        }
        Some(Command::List(args)) => {
            init_stderr_logging();
            let config = config::load(cli.config.as_deref())?;
            handle_list(args, &config)
        }
        None => {
            init_file_logging()?;
            let config = config::load(cli.config.as_deref())?;
            run_ui(&config)
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// The terminal owns stdout and stderr while the UI runs.
fn init_file_logging() -> Result<()> {
    let dir = config::data_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data dir: {}", dir.display()))?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn store_path(override_path: Option<PathBuf>, config: &Config) -> PathBuf {
    override_path
        .map(|p| config::expand_tilde(&p))
        .unwrap_or_else(|| config.store_path.clone())
}

fn handle_serve(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let store = Store::new(store_path(args.store, &config));
    let address = config.server.address();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(server::serve(&address, store))
}

fn handle_list(args: ListArgs, config: &Config) -> Result<()> {
    let store = Store::new(store_path(args.store, config));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let contacts = runtime.block_on(store.load());

    let query = args
        .query
        .as_deref()
        .and_then(search::normalize_query);
    let (favorites, others): (Vec<_>, Vec<_>) = contacts
        .iter()
        .filter(|c| search::matches(c, query.as_deref()))
        .partition(|c| c.favorite);

    // id<TAB>name<TAB>phone<TAB>favorite marker
    for contact in favorites.into_iter().chain(others) {
        println!(
            "{}\t{}\t{}\t{}",
            contact.id,
            contact.display_name(),
            contact.phone,
            if contact.favorite { "*" } else { "" }
        );
    }

    Ok(())
}

fn run_ui(config: &Config) -> Result<()> {
    info!(
        config = %config.config_path.display(),
        service = %config.client.base_url,
        "starting terminal client"
    );
    let service = HttpContactService::new(&config.client.base_url, config.client.timeout)?;
    let mut app = App::new(config, Controller::new(service));
    app.run()
}
