//! Monodepth CLI - monocular depth prediction from the command line

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::models::ModelsCommand;
use commands::predict::PredictCommand;

#[derive(Parser)]
#[command(
    name = "monodepth",
    version,
    about = "Monocular depth prediction with pretrained encoder/decoder networks",
    after_help = "EXAMPLES:\n  \
                  # Predict disparity for one image (outputs next to the image)\n  \
                  monodepth predict assets/test_image.jpg\n\n  \
                  # Predict for every PNG in a folder with the high-resolution model\n  \
                  monodepth predict --ext png --model-name mono_1024x320 frames/\n\n  \
                  # Metric depth from a stereo-trained model, CPU only\n  \
                  monodepth predict --model-name stereo_640x192 --pred-metric-depth --no-cuda img.jpg\n\n  \
                  # Show which checkpoints are installed\n  \
                  monodepth models"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict disparity for an image or a folder of images
    Predict(PredictCommand),

    /// List known checkpoints and whether they are installed
    Models(ModelsCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Predict(cmd) => cmd.execute(),
        Commands::Models(cmd) => cmd.execute(),
    }
}
