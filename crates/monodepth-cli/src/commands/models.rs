//! `monodepth models` - list checkpoints and their install status

use anyhow::Result;
use clap::Args;
use monodepth_core::models::{ModelStatus, ModelStore, Supervision};
use monodepth_core::EstimatorConfig;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ModelsCommand {
    /// Directory holding the model checkpoints
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Print the listing as JSON
    #[arg(long)]
    pub json: bool,
}

fn supervision_label(supervision: Supervision) -> &'static str {
    match supervision {
        Supervision::Mono => "mono",
        Supervision::Stereo => "stereo",
        Supervision::MonoStereo => "mono+stereo",
    }
}

fn format_row(status: &ModelStatus) -> String {
    format!(
        "{:<28} {:>9}  {:<12} {:<10} {}",
        status.spec.name,
        status.spec.feed_size.to_string(),
        supervision_label(status.spec.supervision),
        if status.spec.imagenet_pretrained {
            "imagenet"
        } else {
            "scratch"
        },
        if status.installed {
            "installed"
        } else {
            "-"
        }
    )
}

impl ModelsCommand {
    pub fn execute(self) -> Result<()> {
        let config = EstimatorConfig::default().apply_env()?;
        let models_dir = self.models_dir.unwrap_or(config.models_dir);
        let statuses = ModelStore::new(&models_dir).status();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            return Ok(());
        }

        println!("Models in {}:", models_dir.display());
        println!(
            "{:<28} {:>9}  {:<12} {:<10} STATUS",
            "NAME", "FEED SIZE", "SUPERVISION", "ENCODER"
        );
        for status in &statuses {
            println!("{}", format_row(status));
        }
        Ok(())
    }
}
