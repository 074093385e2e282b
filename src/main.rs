mod config;
mod engine;
mod errors;
mod logging;
mod mcp;
mod pathsafe;
mod response;
mod security;
mod server;
mod tools;

#[cfg(test)]
mod tests;

use crate::config::Config;
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from("qrdock.toml");
    let mut i = 1;
    while i < args.len() {
        if args[i].as_str() == "--config" {
            i += 1;
            if i >= args.len() {
                eprintln!("--config requires a path");
                std::process::exit(2);
            }
            config_path = PathBuf::from(&args[i]);
        }
        i += 1;
    }

    let cfg = Config::load(&config_path).context("loading config")?;
    cfg.validate().context("validating config")?;

    let addr = format!("{}:{}", cfg.server.bind_addr, cfg.server.port);

    // Engine is picked once here; calls never re-probe.
    let engine = engine::probe(&cfg).await;
    let registry = mcp::registry::ToolRegistry::new(&cfg, engine)?;

    info!(
        addr = %addr,
        base_path = %cfg.server.base_path,
        engine = registry.engine_name(),
        tools = ?registry.list_names(),
        "qrdock ready"
    );
    println!(
        "qrdock ready addr={} base_path={} engine={} tools=[{}]",
        addr,
        cfg.server.base_path,
        registry.engine_name(),
        registry.list_names().join(",")
    );

    server::serve(cfg, registry).await
}
