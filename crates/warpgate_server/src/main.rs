use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use warpgate_server::config::{PortalConfig, ServerConfig};
use warpgate_server::server;

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut config = ServerConfig::default();
    let mut write_config = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(value) = args.next() else {
                    eprintln!("--config expects a path argument");
                    std::process::exit(2);
                };
                config.config_path = PathBuf::from(value);
            }
            "--world" => {
                let Some(value) = args.next() else {
                    eprintln!("--world expects a name argument");
                    std::process::exit(2);
                };
                config.world_name = value;
            }
            "--write-config" => write_config = true,
            "--help" | "-h" => {
                println!(
                    "Usage: warpgate_server [--config <path>] [--world <name>] [--write-config]"
                );
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let portal_config = match PortalConfig::load_or_default(&config.config_path) {
        Ok(portal_config) => portal_config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    if write_config {
        if let Err(err) = portal_config.save(&config.config_path) {
            eprintln!("{err}");
            std::process::exit(1);
        }
        println!("Wrote {}", config.config_path.display());
        return;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nShutdown signal received, clearing portals...");
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("failed to set Ctrl+C handler: {err}");
        std::process::exit(1);
    }

    if let Err(err) = server::run(config, portal_config, running) {
        eprintln!("server failed: {err}");
        std::process::exit(1);
    }
}
