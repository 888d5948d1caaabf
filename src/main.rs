//! Service entry point.

use anyhow::{Context, Result};
use apk_triage::inspector::ApkInspector;
use apk_triage::server::{routes, AppState};
use apk_triage::Config;
use clap::{Arg, ArgAction, Command};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("apk-triage")
        .about("Android package upload, static analysis and risk triage service")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16))
                .help("Port to listen on, overriding the configuration"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .get_matches();

    let default_filter = if matches.get_flag("verbose") {
        "apk_triage=debug,tower_http=debug"
    } else {
        "apk_triage=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let state = AppState::new(config, Arc::new(ApkInspector));
    if !state.reputation.is_enabled() {
        info!("reputation lookups disabled (no API key configured)");
    }
    let app = routes(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind to {addr}"))?;
    info!("listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .context("server error")?;

    Ok(())
}
