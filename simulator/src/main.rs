use anyhow::Context;
use clap::Parser;
use config::ServerConfig;
use generator::zones::{current_hour, ParkingDataGenerator};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

mod config;
mod generator;
mod server;

#[derive(Parser)]
#[command(author, version, about = "Mock ParkSight detection and analytics backend")]
struct Args {
    /// Load the server config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the listen address
    #[arg(long)]
    bind: Option<SocketAddr>,
    #[arg(long)]
    seed: Option<u64>,
    /// Number of parking spots the fake detector reports per image
    #[arg(long)]
    slots: Option<usize>,
    /// Pin the simulated hour of day
    #[arg(long)]
    hour: Option<u32>,
    /// Start with the detection model unavailable
    #[arg(long, default_value_t = false)]
    no_model: bool,
    /// Print one zone snapshot and exit without serving
    #[arg(long, default_value_t = false)]
    offline: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(slots) = self.slots {
            config.slot_count = slots;
        }
        if self.hour.is_some() {
            config.fixed_hour = self.hour;
        }
        if self.no_model {
            config.model_loaded = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let offline = args.offline;
    let config = args.into_config()?;

    if offline {
        let generator = ParkingDataGenerator::new(config.seed);
        let hour = config.fixed_hour.unwrap_or_else(current_hour);
        println!("Zone snapshot at {:02}:00", hour);
        for zone in generator.zone_data(hour) {
            println!(
                "  {:>2} {:<18} {:>5.1}%  {:>3}/{:<3} free  {}",
                zone.id,
                zone.name,
                zone.occupancy_rate,
                zone.available_slots,
                zone.total_slots,
                zone.congestion.level.label()
            );
        }
        return Ok(());
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime for the mock backend")?;
    runtime.block_on(async {
        let shutdown = async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("awaiting Ctrl+C failed: {}", err);
            }
        };
        server::routes::serve(&config, shutdown).await
    })
}
