use std::sync::Arc;

use clap::Parser;
use gateway::configuration::GatewayConfig;
use gateway::limiter::Limiter;
use gateway::server::Server;
use gateway::usage::UsageStore;
use pingora::server::configuration::Opt;

fn main() {
    // Enable basic logging; set RUST_LOG=info for visibility.
    env_logger::init();

    // Read command line arguments
    let opt = Opt::parse();

    // Pingora reads its own server settings from -c/--conf; the same file
    // carries our gateway section, so read it again for our fields.
    let conf_path = opt.conf.clone().unwrap_or_else(|| "conf.yaml".to_string());
    let config: GatewayConfig = match std::fs::read_to_string(&conf_path) {
        Ok(conf_str) => serde_yaml::from_str(&conf_str).expect("Failed to parse gateway config"),
        Err(_) => {
            log::warn!("{conf_path} not found, using defaults");
            GatewayConfig::default()
        }
    };
    config.validate().expect("Invalid gateway config");

    let registry = Arc::new(config.registry());
    let store = Arc::new(UsageStore::new());
    let limiter = Arc::new(Limiter::new());

    let mut server = Server::new(Some(opt)).expect("Failed to create server");

    log::info!(
        "gateway listening on {}  ->  upstream at {} ({} users registered)",
        config.listen,
        config.upstream,
        registry.len()
    );

    server
        .bootstrap(config, registry, store, limiter)
        .expect("Failed to bootstrap server");

    server.run_forever();
}
