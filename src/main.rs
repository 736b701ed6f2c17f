use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use sysinfo::System;
use tokio::sync::Mutex;

use crate::lib::catalog::catalog::Catalog;
use crate::lib::jobs::executor::JobExecutor;
use crate::lib::jobs::store::JobStore;
use crate::lib::server::stats::collect_stats;
use crate::lib::server::types::{AppServer, AppState};

mod lib {
    pub mod apps;
    pub mod catalog;
    pub mod engine;
    pub mod jobs;
    pub mod server;
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let data_dir = PathBuf::from(env_or("DOCKHAND_DATA_DIR", "data"));
    let apps_root = data_dir.join("apps");
    std::fs::create_dir_all(&apps_root)?;

    let store = JobStore::open(&data_dir.join("app.db"))?;
    let catalog = Arc::new(Catalog::load(&data_dir.join("catalog.json")));

    let workers: usize = env_or("DOCKHAND_WORKERS", "4").parse().unwrap_or(4);
    let executor = JobExecutor::start(store.clone(), workers);

    let system = Arc::new(Mutex::new(System::new_all()));
    tokio::spawn(collect_stats(system.clone()));

    let state = AppState {
        catalog,
        store,
        executor,
        apps_root,
        system,
    };

    let address = env_or("DOCKHAND_ADDR", "0.0.0.0");
    let port = env_or("DOCKHAND_PORT", "8080");
    println!("Starting dockhand at {}:{}", address, port);

    let server = AppServer::new(&address, &port, state);
    server.start_server().await;

    Ok(())
}
