use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod error;
mod memo_models;
mod repositories;
mod response;
mod routes;
mod server;
mod services;
mod validator;

use config::Config;
use server::AppState;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config.logging.level);

    // `memo-portal issue-token <user_id>` でローカル検証用のトークンを発行する
    let args: Vec<String> = std::env::args().collect();
    if let [_, command, user_id] = args.as_slice() {
        if command == "issue-token" {
            let token = auth::issue_access_token(user_id, &config.jwt, chrono::Duration::hours(1))?;
            println!("{token}");
            return Ok(());
        }
    }

    tracing::info!(backend = ?config.store.backend, table = %config.store.table_name, "Connecting store");
    let store = repositories::connect(&config.store).await?;
    let state = AppState::new(&config.jwt, store);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Failed to parse SocketAddr")?;

    server::start_server(addr, &config, state).await
}
