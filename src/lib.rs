pub mod types;
pub mod config;
pub mod error;
pub mod model;
pub mod progression;
pub mod bracket;
pub mod store;
pub mod commands;
pub mod server;

use types::*;
use config::*;
use store::JsonFileStore;

use std::{fs, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();
    let config = load_config_inner().unwrap_or_else(|e| {
        eprintln!("{e}; falling back to defaults");
        apply_env_defaults(AppConfig::default())
    });
    let paths = resolve_paths(&config);

    // Initialize tracing with rolling file output
    fs::create_dir_all(&paths.log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str())),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Bracket desk starting");
    log_env_warnings(&config, &paths);

    let store = match JsonFileStore::new(&paths.data_dir) {
        Ok(store) => store,
        Err(e) => {
            error!("cannot open bracket store at {}: {e}", paths.data_dir.display());
            return;
        }
    };
    info!("bracket store at {}", store.dir().display());
    let state = AdminServerState { store: Arc::new(store) };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return;
        }
    };
    let addr = bind_addr(&config);
    runtime.block_on(server::start_admin_server(state, paths.static_dir, &addr));
}
