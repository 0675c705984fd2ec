use log::{error, LevelFilter};
use std::path::Path;
use std::process;

use geopublish::commands::{cli, CommandFactory, GeopublishCommandFactory};
use geopublish::config::AppConfig;
use geopublish::utils::logger::Logger;

fn main() {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(Path::new);
    let config = match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config.logging.level_filter().unwrap_or(LevelFilter::Info)
    };
    if let Err(e) = Logger::init_global_logger(&config.logging.file, level) {
        eprintln!("Warning: logging to console only, cannot open {}: {}", config.logging.file.display(), e);
    }

    if let Err(e) = config.ensure_directories() {
        error!("Failed to prepare directories: {}", e);
        process::exit(1);
    }

    let factory = GeopublishCommandFactory::new();
    match factory.create_command(&matches, &config) {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Failed to create command: {}", e);
            process::exit(1);
        }
    };
}
