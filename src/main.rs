use crate::common::config::Config;
use crate::common::logger;
use crate::probe::TlsProbe;

mod checker;
mod common;
mod net;
mod probe;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let config = match Config::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", CONFIG_PATH, e);
            std::process::exit(1);
        }
    };

    logger::init(&config.log);

    log::info!("Starting with config: {:?}", config);

    let probe = match TlsProbe::new(&config.resolver, config.timeout(), config.max_response_bytes)
    {
        Ok(probe) => probe,
        Err(e) => {
            log::error!("Failed to initialize TLS connector: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = checker::run(&config, probe).await {
        log::error!("{}", e);
        std::process::exit(1);
    }

    log::info!("Proxy checking completed.");
}
