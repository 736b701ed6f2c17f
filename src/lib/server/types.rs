use std::path::PathBuf;
use std::sync::Arc;

use sysinfo::System;
use tokio::sync::Mutex;

use crate::lib::catalog::catalog::Catalog;
use crate::lib::jobs::executor::JobExecutor;
use crate::lib::jobs::store::JobStore;

/// Shared state behind every API route.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub store: JobStore,
    pub executor: JobExecutor,
    pub apps_root: PathBuf,
    pub system: Arc<Mutex<System>>,
}

pub struct AppServer {
    pub address: String,
    pub port: String,
    pub state: AppState,
}
