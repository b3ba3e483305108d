use std::process::ExitCode;

use tracing::{error, info};

use folio::{Catalog, Config};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = folio::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        folio::logging::init_console_only(&config.logging.level);
    }

    info!("folio - folder and file catalog");
    info!(
        "Database at {}, assets at {}",
        config.database.path, config.assets.root
    );

    let catalog = match Catalog::open(&config).await {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Failed to open catalog: {e}");
            return ExitCode::FAILURE;
        }
    };

    match catalog.sync_from_disk().await {
        Ok(report) => info!(
            "Sync complete: {} folders and {} files added, {} files skipped",
            report.folders_created, report.files_created, report.files_skipped
        ),
        Err(e) => {
            error!("Sync failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = catalog.verify_structure().await {
        error!("Folder structure is inconsistent: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
