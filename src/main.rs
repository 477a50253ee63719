use biz_sniper::config::{load_config, AppConfig};
use biz_sniper::output::save_result;
use biz_sniper::ScrapeClient;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("😱 Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::var("BIZ_SNIPER_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let config: AppConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    // A URL on the command line overrides the one in the config file
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.target_url.clone());
    if target.trim().is_empty() {
        error!("No target URL: pass one as the first argument or set target_url in {}", config_path);
        return ExitCode::FAILURE;
    }

    let proxy = match config.proxy_config() {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = match ScrapeClient::new(proxy, config.client_options()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available: never cancel
            std::future::pending::<()>().await;
        }
    };

    let result = match client.scrape_until(&target, interrupted).await {
        Ok(r) => r,
        Err(e) => {
            error!("Scrape failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Scraped '{}' | rating: {:?} | {} image(s)",
        result.business_name,
        result.rating,
        result.images.len()
    );

    match save_result(&result, Path::new(&config.output_dir)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
