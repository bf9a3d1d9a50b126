// ABOUTME: Gatehouse server binary - loads configuration and runs the HTTP listener
// ABOUTME: Command-line overrides for the listen port
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Gatehouse authorization server entry point.

use anyhow::Result;
use clap::Parser;
use gatehouse::config::ServerConfig;
use gatehouse::{logging, server};
use tracing::info;

/// Gatehouse OAuth 2.0 authorization server.
#[derive(Parser)]
#[command(name = "gatehouse-server")]
#[command(about = "OAuth 2.0 authorization server with PKCE and provider federation")]
#[command(version)]
struct Args {
    /// HTTP port override (default from HTTP_PORT, else 8080).
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    info!("{}", config.summary());

    server::run(config).await
}
