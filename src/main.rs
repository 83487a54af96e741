//! roodmus-bridge - Main entry point

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use tracing::{debug, info, warn};

use roodmus_bridge::cli::{Cli, Commands, StepName};
use roodmus_bridge::config::{EnvironmentConfig, SimulationConfig};
use roodmus_bridge::logging;
use roodmus_bridge::plugin::Plugin;
use roodmus_bridge::process_guard::{self, ProcessGuard};
use roodmus_bridge::program_runner::run_shell;
use roodmus_bridge::protocol::{SimulateMicrographs, Step};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);
    debug!("CLI arguments parsed: {:?}", cli);

    // Children are terminated on SIGINT/SIGTERM/SIGHUP and on any exit path
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let _guard = ProcessGuard::new();

    match cli.command {
        Commands::Run { config, workdir } => {
            let config = load_config(&config)?;
            let mut protocol = SimulateMicrographs::new(config, &workdir);
            protocol
                .run()
                .with_context(|| format!("{} failed in {:?}", SimulateMicrographs::LABEL, workdir))?;
            for line in protocol.summary() {
                println!("{}", line);
            }
        }
        Commands::Validate { config } => {
            let config = SimulationConfig::load_from_file(&config)?;
            let protocol = SimulateMicrographs::new(config, ".");
            let errors = protocol.validate();
            if errors.is_empty() {
                println!("✓ Parameter file is valid");
            } else {
                for error in &errors {
                    eprintln!("✗ {}", error);
                }
                bail!("{} validation error(s)", errors.len());
            }
        }
        Commands::InitConfig {
            path,
            top_file,
            traj_files,
        } => {
            let mut config = SimulationConfig::new(top_file);
            config.traj_files = traj_files;
            config
                .save_to_file(&path)
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote default parameters to {:?}", path);
        }
        Commands::Install { prefix, config } => {
            let env = match config {
                Some(path) => load_config(&path)?.environment,
                None => EnvironmentConfig::default(),
            };
            install(&Plugin::from_config(&env), &prefix)?;
        }
        Commands::Command {
            step,
            config,
            workdir,
        } => {
            let mut protocol = SimulateMicrographs::new(load_config(&config)?, workdir);
            let step = match step {
                StepName::Sampling => Step::SampleConformations,
                StepName::Simulate => Step::SimulateMicrographs,
            };
            match protocol.step_command(step)? {
                Some(command) => println!("{}", command),
                None => println!("# no trajectory files: the topology is copied as the only conformation"),
            }
        }
        Commands::Summary { config, workdir } => {
            let mut protocol = SimulateMicrographs::new(load_config(&config)?, &workdir);
            let lines = protocol
                .summary_from_disk()
                .with_context(|| format!("No outputs found in {:?}", workdir))?;
            for line in lines {
                println!("{}", line);
            }
            for line in protocol.methods() {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<SimulationConfig> {
    info!("Loading parameters from {:?}", path);
    let config = SimulationConfig::load_from_file(path)?;
    config.validate()?;
    Ok(config)
}

fn install(plugin: &Plugin, prefix: &Path) -> Result<()> {
    if Plugin::is_installed(prefix) {
        println!("✓ roodmus already installed in {:?}", prefix);
        return Ok(());
    }

    std::fs::create_dir_all(prefix)
        .with_context(|| format!("Failed to create install prefix {:?}", prefix))?;
    info!("Installing {} into {:?}", Plugin::env_name(), prefix);

    let output = run_shell("roodmus installation", &plugin.installation_commands(), &[], prefix)?;
    output.write_logs(prefix, "install")?;
    output.ensure_success()?;

    println!("✓ roodmus installed ({})", Plugin::env_name());
    Ok(())
}
