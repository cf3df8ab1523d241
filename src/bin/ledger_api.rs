//! ledger_api - ledger service for the checkout station
//!
//! This daemon:
//! 1. Opens (or creates) the SQLite ledger
//! 2. Serves add_item / items / checkout over HTTP
//! 3. Stops cleanly on Ctrl-C

use anyhow::{anyhow, Result};
use std::sync::mpsc;

use checkout_kernel::{
    api::{ApiConfig, LedgerServer},
    config::LedgerApiConfig,
    SqliteLedgerStore,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = LedgerApiConfig::load()?;
    let store = SqliteLedgerStore::open(&config.db_path)?;

    let api_config = ApiConfig {
        addr: config.addr.clone(),
    };
    let api_handle = LedgerServer::new(api_config, Box::new(store)).spawn()?;
    log::info!("ledger api listening on {}", api_handle.addr);
    log::info!("ledger_api running. writing to {}", config.db_path);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("ledger_api waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping ledger api...");
    api_handle.stop()?;

    Ok(())
}
