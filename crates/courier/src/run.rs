// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier sweep` and `courier run`.

use std::sync::Arc;

use courier_config::model::CourierConfig;
use courier_core::{CourierError, SystemClock};
use courier_storage::Database;
use courier_sync::SelfDestructSweeper;
use tracing::info;

use crate::shutdown::install_signal_handler;

pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

fn sweeper(db: &Database, config: &CourierConfig) -> SelfDestructSweeper {
    SelfDestructSweeper::new(db.clone(), Arc::new(SystemClock), &config.self_destruct)
}

/// One sweep at the current time.
pub async fn run_sweep(config: &CourierConfig) -> Result<(), CourierError> {
    let db = Database::open_with_config(&config.storage).await?;
    let deleted = sweeper(&db, config).sweep().await?;
    println!("deleted {} self-destructed message(s)", deleted.len());
    db.close().await
}

/// Sweep on the configured interval until SIGINT or SIGTERM.
pub async fn run_sweeper(config: CourierConfig) -> Result<(), CourierError> {
    let db = Database::open_with_config(&config.storage).await?;
    info!(
        database = %config.storage.database_path,
        interval_secs = config.self_destruct.sweep_interval_secs,
        "starting self-destruct sweeper"
    );

    let cancel = install_signal_handler();
    sweeper(&db, &config).run(cancel).await;

    info!("sweeper stopped, closing store");
    db.close().await
}
