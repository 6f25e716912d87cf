use std::path::PathBuf;

use base64::Engine;
use clap::Parser;
use mindustry_preview::codec::SCHEMATIC_HEADER;
use mindustry_preview::config::PreviewConfig;

#[derive(Parser)]
#[command(name = "render-preview")]
#[command(about = "Decode a Mindustry map (.msav) or schematic (.msch) and write its preview PNG")]
struct Args {
    /// Map or schematic file
    input: PathBuf,

    /// Output PNG (default: input with a .png extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory holding content.json and images/
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Content definitions file (default: <assets>/content.json)
    #[arg(long)]
    content: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = PreviewConfig::new(&args.assets).with_content(args.content);
    let service = config.build_service()?;
    let data = std::fs::read(&args.input)?;

    // Schematics carry their magic outside the compressed body; maps do not.
    let (metadata, image) = if data.starts_with(SCHEMATIC_HEADER) {
        let mut preview = service.preview_schematic(&data)?;
        let image = std::mem::take(&mut preview.image);
        (serde_json::to_value(&preview)?, image)
    } else {
        let mut preview = service.preview_map(&data)?;
        let image = std::mem::take(&mut preview.image);
        (serde_json::to_value(&preview)?, image)
    };

    let output = args.output.unwrap_or_else(|| args.input.with_extension("png"));
    std::fs::write(&output, base64::engine::general_purpose::STANDARD.decode(image)?)?;

    println!("{}", serde_json::to_string_pretty(&metadata)?);
    eprintln!("Wrote {}", output.display());
    Ok(())
}
