#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Edge process entrypoint (systemd-friendly).
//! Loads a TOML configuration, opens the TAP device, and runs the event
//! loop until a termination signal clears the running flag.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload;

use n2n_edge_core::config::EdgeConfig;
use n2n_edge_core::edge::{self, EdgeState};
use n2n_edge_core::eventloop;
use n2n_edge_core::tap::linux::LinuxTap;
use n2n_edge_core::tap::TapDevice;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn config_path() -> String {
    std::env::args().nth(1).unwrap_or_else(|| env("EDGE_CONFIG", "./edge.toml"))
}

fn init_tracing() -> eventloop::VerbosityHandle {
    let initial = env("EDGE_LOG_LEVEL", "info").parse::<tracing::Level>().map(LevelFilter::from_level).unwrap_or(LevelFilter::INFO);
    let (filter, handle) = reload::Layer::new(initial);
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).compact();
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    handle
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let verbosity = init_tracing();

    let path = config_path();
    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            error!(path = %path, err = %e, "failed to read edge configuration");
            std::process::exit(1);
        }
    };
    let cfg: EdgeConfig = match toml::from_str(&raw) {
        Ok(c) => c,
        Err(e) => {
            error!(path = %path, err = %e, "failed to parse edge configuration");
            std::process::exit(1);
        }
    };
    let validated = match cfg.validate() {
        Ok(v) => v,
        Err(e) => {
            error!(err = %e, "invalid edge configuration");
            std::process::exit(1);
        }
    };

    let tap_cfg = cfg.tap_config();
    let tap = match LinuxTap::open(&tap_cfg) {
        Ok(t) => t,
        Err(e) => {
            error!(err = %e, "failed to open TAP device");
            std::process::exit(1);
        }
    };
    let own_mac = tap.mac();

    let state = match EdgeState::new(&validated, own_mac, Box::new(tap), Instant::now()) {
        Ok(s) => s,
        Err(e) => {
            error!(err = %e, "failed to assemble edge state");
            std::process::exit(1);
        }
    };
    edge::log_startup(&state);
    info!(config = %path, "edge starting");

    let keep_on_running = eventloop::keep_on_running_flag();
    let signal_flag = Arc::clone(&keep_on_running);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        signal_flag.store(false, std::sync::atomic::Ordering::Relaxed);
    });

    if let Err(e) = eventloop::run(state, keep_on_running, verbosity).await {
        error!(err = %e, "event loop exited with an error");
        std::process::exit(1);
    }
}
