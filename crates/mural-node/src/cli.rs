#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use mural_runtime::net::bind_sockets;
use mural_runtime::{InstallationConfig, Node, UdpOutbound, socket_listeners};
use tracing::info;

use crate::error::Result;
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "mural",
    about = "One node of a multi-screen touch installation",
    version
)]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a node hosting one or more windows of a screen.
    Run(RunArgs),

    /// Load and validate a config file.
    #[command(name = "check-config")]
    CheckConfig {
        /// `.toml` or `.json` installation config.
        path: PathBuf,
    },

    /// Print the default config.
    #[command(name = "default-config")]
    DefaultConfig {
        #[arg(long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Installation config; built-in defaults when omitted.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Screen this process drives.
    #[arg(long)]
    pub screen_index: u32,

    /// Window slot on the screen; repeat to host several windows.
    #[arg(long = "window-index", required = true)]
    pub window_index: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

pub fn run_from_env() -> Result<()> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run_node(&args, cli.log_json),
        Commands::CheckConfig { path } => {
            println!("{}", check_config(&path)?);
            Ok(())
        }
        Commands::DefaultConfig { format } => {
            print!("{}", default_config(format)?);
            Ok(())
        }
    }
}

/// Summary line of a config that loads and validates.
pub fn check_config(path: &Path) -> Result<String> {
    let config = InstallationConfig::load(path)?;
    let layout = config.screen_layout();
    Ok(format!(
        "{}: {} screens x {} windows, coordination port {}",
        path.display(),
        layout.screens,
        layout.windows_per_screen,
        config.network.port
    ))
}

pub fn default_config(format: ConfigFormat) -> Result<String> {
    let config = InstallationConfig::default();
    Ok(match format {
        ConfigFormat::Toml => config.to_toml_string()?,
        ConfigFormat::Json => {
            let mut json = config.to_json_string()?;
            json.push('\n');
            json
        }
    })
}

fn load(args: &RunArgs) -> Result<InstallationConfig> {
    Ok(match &args.config {
        Some(path) => InstallationConfig::load(path)?,
        None => InstallationConfig::default(),
    })
}

fn run_node(args: &RunArgs, log_json: bool) -> Result<()> {
    logging::init(log_json)?;
    let config = load(args)?;
    let (coordination, sensor) = bind_sockets(&config)?;
    let (coordination_addr, sensor_addr) = (coordination.local_addr()?, sensor.local_addr()?);
    info!(coordination = %coordination_addr, sensor = %sensor_addr, "sockets bound");
    let outbound = UdpOutbound::from_config(coordination.clone(), &config)?;
    let node = Node::new(config, args.screen_index, &args.window_index, outbound)?;

    let listeners = socket_listeners(coordination, sensor);
    #[cfg(unix)]
    let shutdown = crate::signals::ShutdownSignals::new()?;
    node.run(move || {
        #[allow(unused_mut)]
        let mut subs = listeners();
        #[cfg(unix)]
        subs.push(shutdown.subscription());
        subs
    });
    info!("node stopped");
    Ok(())
}
