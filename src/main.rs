use std::path::PathBuf;

use clap::Parser;
use log::info;

mod beacon;
mod btle;
mod config;
mod configure;
mod controller;
mod error;
mod messages;
mod ranging;
mod ui;

#[derive(Parser, Debug)]
#[command(version, about = "Scan for nearby iBeacons and export the one you pick")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Index of the Bluetooth adapter to use
    #[arg(short, long)]
    adapter: Option<usize>,

    /// Start scanning without waiting for the `start` command
    #[arg(long)]
    scan_on_start: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let config = config::AppConfig::load(&args.config)?;
    let scan = config.scan();
    let region = config.region();
    info!("Ranging region: {:?}", region);

    let adapter_index = args.adapter.or(scan.adapter_index).unwrap_or(0);
    let service = btle::BtleRanging::new(adapter_index, scan.ranging_interval()).await?;

    let (tx, rx) = messages::event_channel();
    let controller = controller::ScanSessionController::new(service, region, tx);
    let exporter = configure::JsonExport::new(config.export.and_then(|e| e.directory));

    ui::Terminal::new(controller, exporter, rx)
        .run(args.scan_on_start || scan.scan_on_start.unwrap_or(false))
        .await
}
