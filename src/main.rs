// colord daemon binary

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use colord_lib::config::Config;
use colord_lib::constants::DEFAULT_CONFIG_PATH;
use colord_lib::RunOptions;

#[derive(Parser)]
#[command(name = "colord")]
#[command(about = "Color management daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Control socket path, overriding the config
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Show debugging information
    #[arg(short, long)]
    verbose: bool,

    /// Create a dummy sensor for testing
    #[arg(long)]
    create_dummy_sensor: bool,

    /// Exit after this many milliseconds
    #[arg(long)]
    timed_exit: Option<u64>,

    /// Exit once startup completes
    #[arg(long)]
    immediate_exit: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut config = Config::load(&cli.config)?;
    if cli.create_dummy_sensor {
        config.daemon.create_dummy_sensor = true;
    }

    let options = RunOptions {
        socket_path: cli.socket,
        timed_exit: cli.timed_exit.map(Duration::from_millis),
        immediate_exit: cli.immediate_exit,
    };

    log::info!("colord {} starting", colord_lib::constants::DAEMON_VERSION);
    colord_lib::run(config, options)
}
