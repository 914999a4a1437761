use anyhow::Result;
use chrono::Utc;
use fedlens_match::alias::MatchConfig;
use fedlens_storage::RecordStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use fedlens_server::app;
use fedlens_server::config::{self, ServerConfig};
use fedlens_server::ingest;
use fedlens_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  fedlens-server [config.toml]                                    Start the server");
    eprintln!("  fedlens-server load-use-cases <config.toml> <inventory.csv>     Load the AI use case inventory");
    eprintln!("  fedlens-server sync-use-case-flags <config.toml> <inventory.csv> Diff/sync capability flags from CSV");
    eprintln!("  fedlens-server import-authorizations <config.toml> <marketplace.csv> Import product authorizations");
    eprintln!("  fedlens-server load-agency-tools <config.toml> <tools.csv>      Load agency AI tool adoption data");
    eprintln!("  fedlens-server link-matches <config.toml> [match-config.json]   Regenerate cross-record matches");
    eprintln!("  fedlens-server link-organizations <config.toml>                 Link agency profiles to the org tree");
    eprintln!("  fedlens-server migrate-db <config.toml> <source.db>             Copy a source database into this one");
}

#[tokio::main]
async fn main() -> Result<()> {
    fedlens_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fedlens=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("load-use-cases") => {
            let (config_path, data_path) = two_args(&args, "load-use-cases")?;
            let store = open_store(config_path).await?;
            ingest::use_cases::run_load(&store, data_path).await
        }
        Some("sync-use-case-flags") => {
            let (config_path, data_path) = two_args(&args, "sync-use-case-flags")?;
            let store = open_store(config_path).await?;
            ingest::use_cases::run_sync(&store, data_path).await.map(|_| ())
        }
        Some("import-authorizations") => {
            let (config_path, data_path) = two_args(&args, "import-authorizations")?;
            let store = open_store(config_path).await?;
            ingest::authorizations::run(&store, data_path).await
        }
        Some("load-agency-tools") => {
            let (config_path, data_path) = two_args(&args, "load-agency-tools")?;
            let store = open_store(config_path).await?;
            ingest::agency_tools::run(&store, data_path).await
        }
        Some("link-matches") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("link-matches requires <config.toml>")
            })?;
            let store = open_store(config_path).await?;
            let match_config = match args.get(3) {
                Some(path) => MatchConfig::from_json_file(Path::new(path))?,
                None => {
                    let config = ServerConfig::load(config_path)?;
                    load_match_config(&config)?
                }
            };
            ingest::match_link::run(&store, &match_config).await
        }
        Some("link-organizations") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("link-organizations requires <config.toml>")
            })?;
            let store = open_store(config_path).await?;
            ingest::org_link::run(&store).await
        }
        Some("migrate-db") => {
            let (config_path, source_db) = two_args(&args, "migrate-db")?;
            let store = open_store(config_path).await?;
            ingest::db_migrate::run(&store, source_db).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

fn two_args<'a>(args: &'a [String], subcommand: &str) -> Result<(&'a str, &'a str)> {
    let first = args.get(2).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("{subcommand} requires <config.toml> and a data path")
    })?;
    let second = args.get(3).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("{subcommand} requires a data path argument")
    })?;
    Ok((first.as_str(), second.as_str()))
}

async fn open_store(config_path: &str) -> Result<RecordStore> {
    let config = config::ServerConfig::load(config_path)?;
    std::fs::create_dir_all(&config.database.data_dir).ok();
    let db_url = config.database.connection_url();
    RecordStore::new(&db_url).await
}

fn load_match_config(config: &ServerConfig) -> Result<MatchConfig> {
    match &config.match_config_path {
        Some(path) => MatchConfig::from_json_file(Path::new(path)),
        None => Ok(MatchConfig::default()),
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        db = %config.database.redacted_url(),
        "fedlens-server starting"
    );

    std::fs::create_dir_all(&config.database.data_dir).ok();
    let db_url = config.database.connection_url();
    let store = Arc::new(RecordStore::new(&db_url).await?);
    let match_config = Arc::new(load_match_config(&config)?);

    let state = AppState {
        store,
        match_config,
        start_time: Utc::now(),
        config: Arc::new(config.clone()),
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        signal::ctrl_c().await.ok();
    })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
