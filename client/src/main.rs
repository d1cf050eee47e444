mod network;
mod store;

use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Stable device identifier
    #[arg(short = 'd', long, default_value = "d1")]
    device_id: String,

    /// Human-readable device name
    #[arg(short = 'n', long, default_value = "Judge Phone")]
    device_name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting judging client...");
    info!("Connecting to: {}", args.server);
    info!("Device: {} (\"{}\")", args.device_id, args.device_name);

    let mut client =
        network::Client::new(&args.server, &args.device_id, &args.device_name).await?;

    client.run().await?;

    Ok(())
}
