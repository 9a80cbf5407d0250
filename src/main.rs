use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use trekin::config;
use trekin::ofp::{Command, Event, RecordingDatapath, SwitchId};
use trekin::telemetry::init_logging;
use trekin::{Controller, ControllerOptions};

#[derive(Parser)]
#[command(name = "trekin")]
#[command(about = "Learning switch and controller-side DHCP for SDN switches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Bring configured switches up against an in-memory datapath and
    /// print the rules the controller would install
    DryRun {
        /// Path to config.lock file
        #[arg(short, long, default_value = "config.lock")]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate config.lock from config.toml
    Generate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Output path for config.lock
        #[arg(short, long, default_value = "config.lock")]
        output: PathBuf,
    },
    /// Validate config.toml without generating lock file
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => {
            init_logging(None);
            match action {
                ConfigAction::Generate { config, output } => cmd_config_generate(&config, &output),
                ConfigAction::Validate { config } => cmd_config_validate(&config),
            }
        }
        Commands::DryRun { config } => cmd_dry_run(&config),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_config_generate(config_path: &PathBuf, output_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Loading {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }

    let lock = config::generate_lock(&cfg);

    let lock_toml =
        toml::to_string_pretty(&lock).map_err(|e| format!("Failed to serialize lock: {}", e))?;

    let output = format!(
        "# Generated by trekin - DO NOT EDIT\n# Source: {}\n\n{}",
        config_path.display(),
        lock_toml
    );

    std::fs::write(output_path, output).map_err(|e| format!("Failed to write lock file: {}", e))?;

    println!("[INFO] Generated {}", output_path.display());
    Ok(())
}

fn cmd_config_validate(config_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}

fn cmd_dry_run(lock_path: &PathBuf) -> Result<(), String> {
    let lock = config::load_lock(lock_path)
        .map_err(|e| format!("Failed to load {}: {}", lock_path.display(), e))?;
    init_logging(Some(&lock.logging));
    info!("Loaded {}", lock_path.display());

    let mut controller = Controller::new(ControllerOptions::from_lock(&lock), RecordingDatapath::new());
    for switch in &lock.switches {
        controller.handle_event(Event::SwitchJoin(SwitchId(switch.dpid)));
        controller.handle_event(Event::SwitchReady(SwitchId(switch.dpid)));
    }

    for command in controller.datapath_mut().take() {
        if let Command::InstallFlow { switch, rule } = command {
            println!(
                "{} priority={} match={:?} actions={:?}",
                switch, rule.priority, rule.match_, rule.actions
            );
        }
    }

    for (name, value) in controller.metrics().export() {
        println!("{} {}", name, value);
    }
    Ok(())
}
