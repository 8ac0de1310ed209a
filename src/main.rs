use std::path::{Path, PathBuf};
use std::sync::Arc;

use bucket_proxy::config::{self, AppState, Config};
use bucket_proxy::storage::S3Store;
use bucket_proxy::{cache, logger, server};

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILE), PathBuf::from);

    let cfg = match Config::load_from(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[ERROR] {} ({})", e, config_path.display());
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("[ERROR] Failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(async_main(cfg)) {
        eprintln!("[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    logger::init(&cfg)?;

    let addr = cfg.get_socket_addr()?;
    cache::ensure_cache_dir(Path::new(&cfg.cache_dir)).await?;

    let store = S3Store::connect(&cfg.bucket_name, &cfg.region).await;
    let listener = server::create_listener(addr)?;

    logger::log_server_start(&addr, &cfg);

    let state = Arc::new(AppState::new(cfg, Arc::new(store)));
    server::start_server_loop(listener, state, server::shutdown_signal()).await;

    Ok(())
}
