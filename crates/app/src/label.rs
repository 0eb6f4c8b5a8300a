//! `render-label`: write a label billboard texture to disk.

use anyhow::{Context, Result};
use ml_core::canonical_label;
use scene::rasterize_label;
use tracing::info;
use vision::LabelStyle;

use crate::cli::RenderLabelArgs;

pub fn run(args: RenderLabelArgs) -> Result<()> {
    let text = canonical_label(&args.text).unwrap_or(args.text);
    let texture = rasterize_label(&text, &LabelStyle::default());
    texture
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Label '{text}' written to {}", args.output.display());
    Ok(())
}
