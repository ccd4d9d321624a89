// Spatial Home CLI binary

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use spatial_home_lib::{
    AppConfig, Device, HomeController, MockGateway, MockGatewayConfig, PlacementStore, Vec3,
};

#[derive(Parser)]
#[command(name = "spatialhome")]
#[command(about = "Spatial Home - smart-home devices placed in 3D space", long_about = None)]
#[command(version)]
struct Cli {
    /// Placement file (defaults to the config value or ~/.spatialhome/device_placements.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Simulated backend latency in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List rooms and their devices
    Rooms,

    /// Search devices by name or room
    Search {
        text: String,
        /// Only this room
        #[arg(short, long)]
        room: Option<String>,
    },

    /// Toggle a device's power
    Toggle { device: String },

    /// Set a device's power
    Power { device: String, state: PowerState },

    /// Place a device at a position
    #[command(allow_negative_numbers = true)]
    Place { device: String, x: f32, y: f32, z: f32 },

    /// Move a placed device
    #[command(allow_negative_numbers = true)]
    Move { device: String, x: f32, y: f32, z: f32 },

    /// Remove a device's placement
    Remove { device: String },

    /// List stored placements
    Placements,

    /// Delete every placement
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum PowerState {
    On,
    Off,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = AppConfig::read();
    let config = &loaded.config;

    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    loaded.log_warnings();

    let store_path = cli
        .store
        .clone()
        .or_else(|| config.resolved_store_path())
        .context("Could not determine placement file location")?;
    let delay = Duration::from_millis(cli.delay_ms.unwrap_or(config.mock_delay_ms));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(cli.command, store_path, delay))
}

async fn run(command: Commands, store_path: PathBuf, delay: Duration) -> Result<()> {
    let gateway = Arc::new(MockGateway::new(MockGatewayConfig {
        delay,
        ..MockGatewayConfig::default()
    }));
    let mut controller = HomeController::new(gateway, PlacementStore::new(store_path));

    if !controller.fetch().await {
        report(&controller)?;
    }

    match command {
        Commands::Rooms => cmd_rooms(&controller),
        Commands::Search { text, room } => cmd_search(&mut controller, text, room),
        Commands::Toggle { device } => cmd_toggle(&mut controller, &device).await,
        Commands::Power { device, state } => cmd_power(&mut controller, &device, state).await,
        Commands::Place { device, x, y, z } => cmd_place(&mut controller, &device, Vec3::new(x, y, z)),
        Commands::Move { device, x, y, z } => cmd_move(&mut controller, &device, Vec3::new(x, y, z)),
        Commands::Remove { device } => cmd_remove(&mut controller, &device),
        Commands::Placements => cmd_placements(&controller),
        Commands::Clear => cmd_clear(&mut controller),
    }
}

fn cmd_rooms(controller: &HomeController) -> Result<()> {
    println!(
        "{} rooms, {} devices ({} on)",
        controller.rooms().len(),
        controller.total_device_count(),
        controller.on_device_count()
    );

    for room in controller.rooms() {
        println!();
        println!("{} [{}] {}/{} on", room.name, room.id, room.on_device_count(), room.device_count());
        println!("{}", "-".repeat(60));
        for device in &room.devices {
            print_device(controller, device);
        }
    }
    Ok(())
}

fn cmd_search(controller: &mut HomeController, text: String, room: Option<String>) -> Result<()> {
    controller.select_room(room);
    controller.search(text);

    let devices = controller.filtered_devices();
    if devices.is_empty() {
        println!("No devices match '{}'", controller.search_text());
        return Ok(());
    }
    for device in devices {
        print_device(controller, device);
    }
    Ok(())
}

async fn cmd_toggle(controller: &mut HomeController, device_id: &str) -> Result<()> {
    let device = find_device(controller, device_id)?;
    match controller.toggle(&device).await {
        Some(is_on) => {
            println!("{} is now {}", device.name, on_off(is_on));
            Ok(())
        }
        None => report(controller),
    }
}

async fn cmd_power(controller: &mut HomeController, device_id: &str, state: PowerState) -> Result<()> {
    let device = find_device(controller, device_id)?;
    let is_on = matches!(state, PowerState::On);
    if controller.set_power(&device, is_on).await {
        println!("{} is now {}", device.name, on_off(is_on));
        Ok(())
    } else {
        report(controller)
    }
}

fn cmd_place(controller: &mut HomeController, device_id: &str, position: Vec3) -> Result<()> {
    let device = find_device(controller, device_id)?;
    match controller.place(&device, position, None) {
        Some(placement) => {
            println!("Placed {} at {} (placement {})", device.name, format_position(position), placement.id);
            Ok(())
        }
        None => report(controller),
    }
}

fn cmd_move(controller: &mut HomeController, device_id: &str, position: Vec3) -> Result<()> {
    match controller.update_position(device_id, position) {
        Some(_) => {
            println!("Moved {} to {}", device_id, format_position(position));
            Ok(())
        }
        None => report(controller),
    }
}

fn cmd_remove(controller: &mut HomeController, device_id: &str) -> Result<()> {
    if controller.remove_placement(device_id) {
        println!("Removed placement for {}", device_id);
        Ok(())
    } else {
        report(controller)
    }
}

fn cmd_placements(controller: &HomeController) -> Result<()> {
    let placements = controller.placements();
    if placements.is_empty() {
        println!("No placements. Use 'spatialhome place <device> x y z' to add one.");
        return Ok(());
    }

    println!("{:<24}  {:<24}  {:>20}", "Device", "Position", "Updated");
    println!("{}", "-".repeat(72));
    for placement in placements {
        let name = controller
            .device(&placement.device_id)
            .map(|d| d.name.as_str())
            .unwrap_or(placement.device_id.as_str());
        println!(
            "{:<24}  {:<24}  {:>20}",
            name,
            format_position(placement.position()),
            placement.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let unplaced = controller.unplaced_devices().len();
    if unplaced > 0 {
        println!();
        println!("{} devices not placed", unplaced);
    }
    Ok(())
}

fn cmd_clear(controller: &mut HomeController) -> Result<()> {
    let count = controller.placements().len();
    if controller.clear_all() {
        println!("Cleared {} placements", count);
        Ok(())
    } else {
        report(controller)
    }
}

// Helpers

fn find_device(controller: &HomeController, device_id: &str) -> Result<Device> {
    controller
        .device(device_id)
        .cloned()
        .with_context(|| format!("Unknown device '{}'. Use 'spatialhome rooms' to list devices.", device_id))
}

/// Turn the controller's last error into a command failure.
fn report(controller: &HomeController) -> Result<()> {
    controller.check()?;
    Ok(())
}

fn print_device(controller: &HomeController, device: &Device) {
    let placed = if controller.is_placed(&device.id) { "placed" } else { "" };
    println!(
        "  {:<28} {:<10} {:<4} {:<6} {}",
        device.name,
        device.class.label(),
        on_off(device.is_on),
        placed,
        device.id
    );
}

fn on_off(is_on: bool) -> &'static str {
    if is_on {
        "on"
    } else {
        "off"
    }
}

fn format_position(p: Vec3) -> String {
    format!("({:.2}, {:.2}, {:.2})", p.x, p.y, p.z)
}
