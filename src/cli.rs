// colord admin CLI binary

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;

use colord_lib::commands::{Request, Response};
use colord_lib::config::Config;
use colord_lib::constants::DEFAULT_CONFIG_PATH;
use colord_lib::daemon::Stores;
use colord_lib::db::{self, migrations};
use colord_lib::ipc::IpcClient;
use colord_lib::profile::icc::IccDecoder;
use colord_lib::profile::ProfileDecoder;

#[derive(Parser)]
#[command(name = "cd-util")]
#[command(about = "Inspect and maintain the color daemon's stores", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Database directory, overriding the config
    #[arg(short, long)]
    database_dir: Option<PathBuf>,

    /// Show debugging information
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List device to profile history, tombstones included
    Mappings,

    /// List stored devices and their properties
    Devices,

    /// Delete the history row for a device and profile
    Forget {
        device_id: String,
        profile_id: String,
    },

    /// Delete everything from all stores
    Empty,

    /// Bring the stores up to the current schema
    Migrate,

    /// Decode an ICC profile and print what the daemon would see
    Inspect {
        path: PathBuf,
    },

    /// Parse the config file and print the effective settings
    CheckConfig,

    /// Send one JSON request to the running daemon
    Call {
        /// e.g. '{"method":"GetDevices"}'
        request: String,
        /// File to pass along with the call
        #[arg(long)]
        fd: Option<PathBuf>,
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Print daemon signals as they arrive
    Monitor {
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = Config::load(&cli.config)?;
    let database_dir = cli.database_dir.unwrap_or_else(|| config.database_dir());

    match cli.command {
        Commands::Mappings => cmd_mappings(database_dir),
        Commands::Devices => cmd_devices(database_dir),
        Commands::Forget { device_id, profile_id } => cmd_forget(database_dir, &device_id, &profile_id),
        Commands::Empty => cmd_empty(database_dir),
        Commands::Migrate => cmd_migrate(database_dir),
        Commands::Inspect { path } => cmd_inspect(path),
        Commands::CheckConfig => cmd_check_config(&config),
        Commands::Call { request, fd, socket } => {
            cmd_call(socket.unwrap_or_else(|| config.socket_path()), &request, fd)
        }
        Commands::Monitor { socket } => cmd_monitor(socket.unwrap_or_else(|| config.socket_path())),
    }
}

fn cmd_mappings(database_dir: PathBuf) -> Result<()> {
    let stores = Stores::open(&database_dir)?;
    let rows = stores.mapping.list()?;
    if rows.is_empty() {
        println!("No mappings in {}", database_dir.display());
        return Ok(());
    }

    println!("{:<40} {:<48} {}", "DEVICE", "PROFILE", "TIMESTAMP");
    println!("{}", "-".repeat(100));
    for row in rows {
        let timestamp = if row.timestamp == 0 {
            "removed".to_string()
        } else {
            chrono::DateTime::from_timestamp(row.timestamp / 1_000_000, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| row.timestamp.to_string())
        };
        println!("{:<40} {:<48} {}", row.device, row.profile, timestamp);
    }
    Ok(())
}

fn cmd_devices(database_dir: PathBuf) -> Result<()> {
    let stores = Stores::open(&database_dir)?;
    let devices = stores.device_db.get_devices()?;
    if devices.is_empty() {
        println!("No stored devices in {}", database_dir.display());
        return Ok(());
    }

    for device_id in devices {
        println!("{}", device_id);
        for key in stores.device_db.get_properties(&device_id)? {
            let value = stores.device_db.get_property(&device_id, &key)?.unwrap_or_default();
            println!("  {:<20} {}", key, value);
        }
    }
    Ok(())
}

fn cmd_forget(database_dir: PathBuf, device_id: &str, profile_id: &str) -> Result<()> {
    let stores = Stores::open(&database_dir)?;
    if stores.mapping.get_timestamp(device_id, profile_id).is_err() {
        anyhow::bail!("No mapping for {} and {}", device_id, profile_id);
    }
    stores.mapping.remove(device_id, profile_id)?;
    println!("Forgot {} for {}", profile_id, device_id);
    Ok(())
}

fn cmd_empty(database_dir: PathBuf) -> Result<()> {
    let stores = Stores::open(&database_dir)?;
    stores.mapping.empty()?;
    stores.device_db.empty()?;
    stores.profile_db.empty()?;
    println!("Emptied stores in {}", database_dir.display());
    Ok(())
}

fn cmd_migrate(database_dir: PathBuf) -> Result<()> {
    Stores::open(&database_dir)?;
    for path in [
        db::get_mapping_db_path(&database_dir),
        db::get_storage_db_path(&database_dir),
    ] {
        let conn = db::open_store(&path)?;
        println!("{}: schema version {}", path.display(), migrations::get_schema_version(&conn)?);
    }
    Ok(())
}

fn cmd_inspect(path: PathBuf) -> Result<()> {
    let data = std::fs::read(&path)?;
    let parsed = IccDecoder.decode(&data)?;

    println!("File:        {}", path.display());
    println!("Title:       {}", parsed.title.as_deref().unwrap_or("-"));
    println!("Kind:        {}", parsed.kind);
    println!("Colorspace:  {}", parsed.colorspace);
    println!("Profile id:  {}", parsed.checksum.as_deref().unwrap_or("-"));
    println!("Has vcgt:    {}", parsed.has_vcgt);
    if let Some(created) = chrono::DateTime::from_timestamp(parsed.created, 0) {
        println!("Created:     {}", created.format("%Y-%m-%d %H:%M:%S"));
    }
    if !parsed.warnings.is_empty() {
        let warnings: Vec<&str> = parsed.warnings.iter().map(|w| w.as_str()).collect();
        println!("Warnings:    {}", warnings.join(", "));
    }
    for (key, value) in &parsed.metadata {
        println!("  {} = {}", key, value);
    }
    Ok(())
}

fn cmd_check_config(config: &Config) -> Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    println!("# database dir: {}", config.database_dir().display());
    println!("# socket:       {}", config.socket_path().display());
    Ok(())
}

fn cmd_call(socket: PathBuf, request: &str, fd: Option<PathBuf>) -> Result<()> {
    let request: Request = serde_json::from_str(request)?;
    let file = fd.map(File::open).transpose()?;
    let mut client = IpcClient::connect(&socket)?;
    match client.call(request, file.as_ref())? {
        Response::Ok { value } => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Response::Error { name, message } => anyhow::bail!("{}: {}", name, message),
    }
}

fn cmd_monitor(socket: PathBuf) -> Result<()> {
    let mut client = IpcClient::connect(&socket)?;
    if let Response::Error { name, message } = client.call(Request::Subscribe, None)? {
        anyhow::bail!("{}: {}", name, message);
    }
    loop {
        let signal = client.next_signal()?;
        println!("{}", serde_json::to_string(&signal)?);
    }
}
