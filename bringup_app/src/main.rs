//! Headless Vulkan bring-up
//!
//! Usage: `bringup [settings.toml|settings.ron] [--dump-config <path>]`
//!
//! Creates an instance, device, command buffers, sync objects, a uniform
//! buffer and descriptor sets, submits a few empty frames and tears
//! everything down through the owners' drops.

mod bringup;
mod config;
mod error;
mod settings;

use std::path::{Path, PathBuf};

use crate::bringup::GpuObjects;
use crate::config::{Config, ConfigError};
use crate::error::BringUpResult;
use crate::settings::BringUpConfig;

const DEFAULT_CONFIG_PATH: &str = "bringup.toml";

/// Parsed command line
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    dump_config: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Self {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            if arg == "--dump-config" {
                parsed.dump_config = args.next().map(PathBuf::from);
            } else {
                parsed.config = Some(PathBuf::from(arg));
            }
        }
        parsed
    }
}

/// Settings from `path`, and whether the file existed. Reported once the
/// logger is running.
fn load_settings(path: &Path) -> Result<(BringUpConfig, bool), ConfigError> {
    let found = path.exists();
    Ok((BringUpConfig::load_or_default(path)?, found))
}

fn run(config: &BringUpConfig) -> BringUpResult<()> {
    let mut objects = GpuObjects::create(config)?;
    objects.log_inventory();

    for frame in 0..config.frames as usize {
        objects.submit_empty_frame(frame)?;
    }

    log::info!("Submitted {} frames", config.frames);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1));
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, found) = load_settings(&config_path)?;

    env_logger::Builder::from_default_env()
        .filter_level(config.level_filter())
        .init();

    if found {
        log::info!("Starting bring-up with settings from {}", config_path.display());
    } else {
        log::info!("No config at {}, starting bring-up with defaults", config_path.display());
    }

    if let Some(path) = &args.dump_config {
        config.save_to_file(path)?;
        log::info!("Wrote effective settings to {}", path.display());
    }

    match run(&config) {
        Ok(()) => {
            log::info!("Bring-up finished successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Bring-up failed: {}", e);
            Err(e.into())
        }
    }
}
