use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mindreader_core::{CaptionBank, EmotionLabel, ModelProvider, OnnxModelLoader, Tracker};
use mindreader_hw::V4l2Capture;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod overlay;

use config::Config;
use overlay::TerminalOverlay;

#[derive(Parser)]
#[command(name = "mindreader", about = "Webcam emotion thought bubbles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a face on the camera and print its thoughts until Ctrl-C
    Watch {
        /// V4L2 device path (overrides MINDREADER_CAMERA_DEVICE)
        #[arg(short, long)]
        device: Option<String>,
        /// Caption bank JSON (overrides MINDREADER_CAPTIONS)
        #[arg(short, long)]
        captions: Option<PathBuf>,
    },
    /// List V4L2 capture devices
    Devices,
    /// Show emotion labels and their caption counts
    Labels {
        /// Caption bank JSON (overrides MINDREADER_CAPTIONS)
        #[arg(short, long)]
        captions: Option<PathBuf>,
    },
}

fn caption_bank(path: Option<PathBuf>) -> Result<CaptionBank> {
    match path {
        Some(path) => CaptionBank::load_with_overrides(&path)
            .with_context(|| format!("loading captions from {}", path.display())),
        None => Ok(CaptionBank::default()),
    }
}

async fn watch(config: Config, device: Option<String>, captions: Option<PathBuf>) -> Result<()> {
    let captions = caption_bank(captions.or(config.captions_path))?;
    let device = device.unwrap_or(config.camera_device);
    tracing::info!(device = %device, model_dir = %config.model_dir.display(), "starting watch");

    let provider = Arc::new(ModelProvider::new(OnnxModelLoader::in_dir(&config.model_dir)));
    let camera = V4l2Capture::new(device, config.warmup_frames);
    let mut tracker = Tracker::new(provider, camera, TerminalOverlay::default(), captions);

    // The overlay has already shown the failure status.
    if let Err(e) = tracker.start().await {
        tracing::warn!(error = %e, "session not started");
        return Ok(());
    }

    let stop = tracker.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            stop.request_stop();
        }
    });

    tracker.run(config.tick).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Watch { device, captions } => watch(config, device, captions).await?,
        Commands::Devices => {
            let devices = V4l2Capture::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
        Commands::Labels { captions } => {
            let bank = caption_bank(captions.or(config.captions_path))?;
            for label in EmotionLabel::ALL {
                println!("{} {:<8} {} captions", label.emoji(), label, bank.get(label).len());
            }
        }
    }

    Ok(())
}
