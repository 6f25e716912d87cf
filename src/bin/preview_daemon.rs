use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mindustry_preview::config::PreviewConfig;
use mindustry_preview::daemon;

#[derive(Parser)]
#[command(name = "preview-daemon")]
#[command(about = "Mindustry preview daemon - renders maps and schematics sent over a Unix socket")]
struct Args {
    /// Directory holding content.json and images/
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Content definitions file (default: <assets>/content.json)
    #[arg(long)]
    content: Option<PathBuf>,

    /// Socket path (default: ~/.mindustry-preview/daemon.sock)
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = PreviewConfig::new(args.assets)
        .with_content(args.content)
        .with_socket(args.socket);
    let service = Arc::new(config.build_service()?);

    eprintln!("Daemon running on {:?}", config.socket_path);

    let result = daemon::run_daemon(service, config.socket_path.clone()).await;

    let _ = std::fs::remove_file(&config.socket_path);

    result?;
    Ok(())
}
