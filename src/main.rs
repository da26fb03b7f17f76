mod cli;
mod config;
mod device;
mod error;
mod identity;
mod menu;
mod monitor;
mod notify;
mod registry;
mod scanner;
mod vendor;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use log::{info, warn};

use cli::Args;
use config::MonitorConfig;
use error::Result;
use monitor::ChangeDetector;
use notify::{ConsoleNotifier, Notifier};
use registry::DeviceRegistry;
use vendor::MacVendorsClient;

const EXIT_CONFIG_ERROR: i32 = 2;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = Args::parse();
    let list_only = args.connections;
    let config = args.to_config();

    if let Err(e) = run(config, list_only).await {
        eprintln!("lansentry: {e}");
        let code = if e.is_configuration() {
            EXIT_CONFIG_ERROR
        } else {
            1
        };
        std::process::exit(code);
    }
}

async fn run(config: MonitorConfig, list_only: bool) -> Result<()> {
    let identity = identity::resolve()?;
    info!("local identity: {} ({})", identity.ip, identity.mac);

    if !scanner::can_probe() {
        warn!("raw ICMP sockets unavailable; sweeps will find nothing (try running as root)");
    }

    let registry = DeviceRegistry::open(&config.registry_path)?;
    info!(
        "registry {} holds {} known devices",
        config.registry_path.display(),
        registry.all_devices()?.len()
    );
    let vendor = MacVendorsClient::new()?;
    let mut detector = ChangeDetector::new(config.clone(), identity, registry, vendor);

    let devices = detector.discover().await?;
    menu::print_device_table(&devices);

    if list_only {
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst)) {
            warn!("could not install signal handler: {e}");
        }
    }

    if config.rename_enabled {
        menu::run(&mut detector).await?;
    }
    println!("Monitoring LAN for changes... (hit CTRL+C to quit)");

    let notifier = ConsoleNotifier;
    while !shutdown.load(Ordering::SeqCst) {
        let events = detector.run_cycle().await?;
        for event in &events {
            notifier.notify(event, &config.watched_ids);
        }

        if config.rename_enabled && !events.is_empty() {
            menu::run(&mut detector).await?;
        }

        // Interval between cycle completions; poll the flag each second so
        // CTRL+C lands promptly.
        for _ in 0..config.interval_secs {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    Ok(())
}
